pub mod capstone_backend;
pub mod unicorn;
