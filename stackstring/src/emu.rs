/// Memory protection flags for `Emulator::mem_map`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perms {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Perms {
    pub const ALL: Perms = Perms {
        read: true,
        write: true,
        exec: true,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum EmuError {
    #[error("emulator error: {0}")]
    Backend(String),
}

/// The slice of a CPU emulator's API this driver needs. Kept deliberately
/// small and trait-object-free of any particular backend so that the hook
/// logic in `hooks.rs` can be driven by a scripted mock in tests instead of
/// a real CPU (spec §8's end-to-end scenarios are unit tests against this
/// trait; see `hooks.rs` tests and the `tests` integration crate for the
/// real-backend wiring).
pub trait Emulator {
    fn mem_map(&mut self, addr: u64, size: u64, perms: Perms) -> Result<(), EmuError>;
    fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<(), EmuError>;
    fn mem_read(&mut self, addr: u64, size: u64) -> Result<Vec<u8>, EmuError>;
    fn reg_write(&mut self, reg: i32, value: u64) -> Result<(), EmuError>;
    fn reg_read(&mut self, reg: i32) -> Result<u64, EmuError>;
}

/// What a hook wants the emulator to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    Stop,
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::BTreeMap;

    /// A minimal in-memory `Emulator` used to drive hook logic in tests
    /// without a real CPU backend.
    #[derive(Default)]
    pub struct MockEmulator {
        pub mem: BTreeMap<u64, u8>,
        pub regs: BTreeMap<i32, u64>,
    }

    impl Emulator for MockEmulator {
        fn mem_map(&mut self, _addr: u64, _size: u64, _perms: Perms) -> Result<(), EmuError> {
            Ok(())
        }

        fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<(), EmuError> {
            for (i, b) in data.iter().enumerate() {
                self.mem.insert(addr + i as u64, *b);
            }
            Ok(())
        }

        fn mem_read(&mut self, addr: u64, size: u64) -> Result<Vec<u8>, EmuError> {
            Ok((0..size)
                .map(|i| *self.mem.get(&(addr + i)).unwrap_or(&0))
                .collect())
        }

        fn reg_write(&mut self, reg: i32, value: u64) -> Result<(), EmuError> {
            self.regs.insert(reg, value);
            Ok(())
        }

        fn reg_read(&mut self, reg: i32) -> Result<u64, EmuError> {
            Ok(*self.regs.get(&reg).unwrap_or(&0))
        }
    }
}
