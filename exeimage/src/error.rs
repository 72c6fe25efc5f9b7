use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("failed to parse executable image: {0}")]
    Parse(#[source] object::read::Error),

    #[error("failed to read segment data: {0}")]
    SegmentData(String),

    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
}
