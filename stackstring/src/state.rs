use crate::writes::WriteTracker;

/// Per-entry-point bookkeeping (spec §3). Created immediately before the
/// emulator starts, lives for exactly one entry point, discarded once its
/// intervals are harvested.
pub struct EmuState {
    pub writes: WriteTracker,
    /// Address the driver expects to execute next; seeded to the entry
    /// point. Used to detect branches and "push then fall-through".
    pub address: u64,
    /// Last address actually executed, for log formatting only.
    pub previous_address: u64,
    /// Consecutive executed instructions with no qualifying write.
    pub waiting: u32,
    /// Shadow stack of observed return-address pushes.
    pub callstack: Vec<u64>,
    /// Most recent value written that equals `address`, or `None`.
    pub retaddr: Option<u64>,
    /// Top of the outermost tracked call's frame; `0` when not inside a
    /// tracked call. The 0x200 bytes below it are ceiling-suppressed.
    pub stack_ceiling: u64,
    /// Optional halt address.
    pub stop: Option<u64>,
    /// Architecture-specific stack-pointer register identifier.
    pub sp_register: i32,
}

impl EmuState {
    pub fn new(entry: u64, stop: Option<u64>, sp_register: i32) -> Self {
        Self {
            writes: WriteTracker::new(),
            address: entry,
            previous_address: entry,
            waiting: 0,
            callstack: Vec::new(),
            retaddr: None,
            stack_ceiling: 0,
            stop,
            sp_register,
        }
    }

    pub fn depth(&self) -> usize {
        self.callstack.len()
    }
}
