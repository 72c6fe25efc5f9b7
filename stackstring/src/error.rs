use thiserror::Error as ThisError;

/// Fatal errors for one extraction run. Per spec §7, most emulator-level
/// failures (runtime errors, invalid instructions, invalid memory) are
/// *not* represented here: they halt emulation for the current entry point
/// cleanly and the interval set is still harvested. Only the handful of
/// conditions spec §7 marks genuinely fatal appear as `Error` values.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("cannot place stack: no {size:#x}-byte-aligned region of size {need:#x} is disjoint from the image")]
    StackPlacement { size: u64, need: u64 },

    #[error("unknown architecture for entry point {address:#x}: {arch:?}")]
    UnknownArchitecture {
        address: u64,
        arch: exeimage::Arch,
    },

    #[error("failed to map entry segment for entry point {address:#x}: {source}")]
    EntrySegmentMap {
        address: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Image(#[from] exeimage::Error),
}
