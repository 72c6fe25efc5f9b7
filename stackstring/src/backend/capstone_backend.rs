use capstone::prelude::*;
use capstone::{Capstone, NO_EXTRA_MODE};

use crate::arch::ArchInfo;
use crate::disasm::Disassembler;
use crate::error::Error;

/// Builds a `Capstone` instance from an architecture-table row. Used only
/// to format the debug-log line in the code hook (spec §4.5 step 7) — a
/// decode failure there is treated the same as an invalid instruction, it
/// never changes what gets recorded.
pub fn build(info: &ArchInfo, entry: u64) -> Result<Capstone, Error> {
    Capstone::new_raw(info.disasm_arch, info.disasm_mode, NO_EXTRA_MODE, None).map_err(|e| {
        Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to build disassembler: {e}"),
        }
    })
}

impl Disassembler for Capstone {
    fn decode_one(&self, bytes: &[u8], va: u64) -> Option<(String, String)> {
        let insns = self.disasm_count(bytes, va, 1).ok()?;
        let insn = insns.iter().next()?;
        Some((
            insn.mnemonic().unwrap_or_default().to_string(),
            insn.op_str().unwrap_or_default().to_string(),
        ))
    }
}
