use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use exeimage::{Arch, Executable};

use crate::arch::{self, ArchInfo};
use crate::config::Config;
use crate::emu::{Emulator, Perms};
use crate::error::Error;
use crate::mapper;
use crate::stack;
use crate::state::EmuState;

/// Backend-agnostic part of spec §4.4 steps 2-5: places the synthetic
/// stack, seeds registers, and maps every segment. Building `EmuState`
/// (step 6) is a one-liner callers do themselves, because on the real
/// backend the state has to live inside the emulator's hook user-data from
/// the moment the emulator is constructed (see
/// `backend::unicorn::run_entry_point`); installing hooks and running is
/// backend-specific, since this crate's `Emulator` trait intentionally
/// stops at map/write/reg access (spec §5/§9: hooks need a real backend's
/// callback mechanism, not this trait).
pub fn prime(
    emu: &mut impl Emulator,
    exe: &Executable,
    entry: u64,
    config: &Config,
    arch_info: &ArchInfo,
) -> Result<(), Error> {
    let space = exe.image_defined_address_space();
    let need = config.stack_size.saturating_mul(3);
    let stack_base = stack::place_stack(space, config.stack_size, exe.pointer_size())
        .ok_or(Error::StackPlacement {
            size: config.stack_size,
            need,
        })?;

    emu.mem_map(stack_base, need, Perms::ALL).map_err(|e| {
        Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to map synthetic stack: {e}"),
        }
    })?;

    let sp = stack_base + 2 * config.stack_size;
    if let Some(sp_reg) = arch_info.sp_register {
        emu.reg_write(sp_reg, sp).map_err(|e| Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to initialise stack pointer: {e}"),
        })?;
    }

    if matches!(exe.arch(), Arch::X8632 | Arch::X8664) {
        let mid = stack_base + config.stack_size;
        for &reg in arch::x86_gp_registers(exe.arch()) {
            emu.reg_write(reg, mid).map_err(|e| Error::EntrySegmentMap {
                address: entry,
                source: anyhow::anyhow!("failed to seed register {reg}: {e}"),
            })?;
        }
    }

    mapper::map_image(emu, exe, entry, config.block_size).map_err(|source| {
        Error::EntrySegmentMap {
            address: entry,
            source,
        }
    })?;

    Ok(())
}

/// Harvests recovered regions from a finished entry point's `EmuState`,
/// filtering by `patch_range` and reading their final bytes back from the
/// emulator (spec §4.4 step 7).
pub fn harvest(
    emu: &mut impl Emulator,
    state: &EmuState,
    config: &Config,
) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for (begin, len) in state.writes.iter() {
        if !config.patch_range.contains(len) {
            continue;
        }
        match emu.mem_read(begin, len) {
            Ok(bytes) => out.push(bytes),
            Err(e) => log::warn!("failed to read back recovered region at {begin:#x}: {e}"),
        }
    }
    out
}

/// Orchestrates every entry point in `config` against one loaded image.
///
/// Per spec §7: a stack-placement failure is fatal for the whole run (it
/// will recur identically for every later entry point, since placement
/// depends only on the image and architecture); an unknown architecture or
/// a failed entry-segment mapping is fatal only for that entry point and
/// the run continues with the next one.
pub struct Extractor {
    config: Config,
    stop_flag: Arc<AtomicBool>,
}

impl Extractor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle a caller can use to request cancellation from another
    /// thread; checked at the top of the code hook for the in-flight entry
    /// point (see `SPEC_FULL.md`'s supplemented cancellation behaviour).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn extract(&self, image: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
        let exe = Executable::load(image, self.config.base)?;
        let mut results = Vec::new();

        for &entry in &self.config.addresses {
            if self.stop_flag.load(Ordering::Relaxed) {
                log::info!("cancellation requested, stopping before entry point {entry:#x}");
                break;
            }

            let arch_info = match arch::lookup(exe.arch()) {
                Ok(info) => info,
                Err(_) => {
                    log::warn!(
                        "skipping entry point {entry:#x}: unsupported architecture {:?}",
                        exe.arch()
                    );
                    continue;
                }
            };

            log::info!("starting emulation at entry point {entry:#x}");
            match crate::backend::unicorn::run_entry_point(
                &exe,
                entry,
                &self.config,
                &arch_info,
                &self.stop_flag,
            ) {
                Ok(regions) => {
                    log::info!(
                        "finished entry point {entry:#x}: {} region(s) recovered",
                        regions.len()
                    );
                    results.extend(regions);
                }
                Err(Error::StackPlacement { size, need }) => {
                    return Err(Error::StackPlacement { size, need });
                }
                Err(e) => {
                    log::warn!("skipping entry point {entry:#x}: {e}");
                }
            }
        }

        Ok(results)
    }
}
