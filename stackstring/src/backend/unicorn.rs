use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use exeimage::Executable;
use unicorn_engine::unicorn_const::{HookType, MemType, Permission};
use unicorn_engine::Unicorn;

use crate::arch::ArchInfo;
use crate::backend::capstone_backend;
use crate::config::Config;
use crate::driver;
use crate::emu::{EmuError, Emulator, HookAction, Perms};
use crate::error::Error;
use crate::hooks;
use crate::state::EmuState;

impl From<Perms> for Permission {
    fn from(p: Perms) -> Self {
        let mut perm = Permission::NONE;
        if p.read {
            perm |= Permission::READ;
        }
        if p.write {
            perm |= Permission::WRITE;
        }
        if p.exec {
            perm |= Permission::EXEC;
        }
        perm
    }
}

/// The real `Emulator` impl: thin delegation to Unicorn's own methods. The
/// generic `D` is the hook user-data type (`HookData` below); this impl
/// doesn't care what it is.
impl<D> Emulator for Unicorn<'_, D> {
    fn mem_map(&mut self, addr: u64, size: u64, perms: Perms) -> Result<(), EmuError> {
        Unicorn::mem_map(self, addr, size as usize, perms.into())
            .map_err(|e| EmuError::Backend(format!("{e:?}")))
    }

    fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<(), EmuError> {
        Unicorn::mem_write(self, addr, data).map_err(|e| EmuError::Backend(format!("{e:?}")))
    }

    fn mem_read(&mut self, addr: u64, size: u64) -> Result<Vec<u8>, EmuError> {
        let mut buf = vec![0u8; size as usize];
        Unicorn::mem_read(self, addr, &mut buf)
            .map_err(|e| EmuError::Backend(format!("{e:?}")))?;
        Ok(buf)
    }

    fn reg_write(&mut self, reg: i32, value: u64) -> Result<(), EmuError> {
        Unicorn::reg_write(self, reg, value).map_err(|e| EmuError::Backend(format!("{e:?}")))
    }

    fn reg_read(&mut self, reg: i32) -> Result<u64, EmuError> {
        Unicorn::reg_read(self, reg).map_err(|e| EmuError::Backend(format!("{e:?}")))
    }
}

/// Everything the hook closures need, stored as Unicorn's user-data so
/// they can reach it through the `&mut Unicorn` they're handed (spec §9:
/// "pass an opaque user-data pointer through the emulator's hook API").
struct HookData {
    state: EmuState,
    disasm: capstone::Capstone,
    wait: u32,
    calls_wait: bool,
    write_range: crate::config::Bounds,
    block_size: u64,
    stop_flag: Arc<AtomicBool>,
    /// Set once a host-initiated cancellation is observed. Distinct from
    /// `state.stop`-triggered or wait-heuristic halts: per spec §5, a
    /// cancelled entry point's partial results are discarded rather than
    /// harvested.
    cancelled: bool,
}

fn code_callback(uc: &mut Unicorn<'_, HookData>, address: u64, size: u32) {
    if uc.get_data().stop_flag.load(Ordering::Relaxed) {
        uc.get_data_mut().cancelled = true;
        let _ = uc.emu_stop();
        return;
    }

    let len = (size as u64).max(1).min(16);
    let instr_bytes = Emulator::mem_read(uc, address, len).unwrap_or_default();

    let data = uc.get_data_mut();
    let action = hooks::code_hook(
        &mut data.state,
        &data.disasm,
        address,
        size,
        &instr_bytes,
        data.wait,
        data.calls_wait,
    );
    if action == HookAction::Stop {
        let _ = uc.emu_stop();
    }
}

fn mem_write_callback(
    uc: &mut Unicorn<'_, HookData>,
    _mem_type: MemType,
    address: u64,
    size: usize,
    value: i64,
) -> bool {
    let write_range = uc.get_data().write_range;
    let sp_register = uc.get_data().state.sp_register;

    // Read SP before borrowing the hook data mutably: the state this hook
    // mutates lives inside `uc`'s own user-data, so `uc` and `&mut
    // data.state` can't be borrowed at once (see `hooks::mem_write_hook`'s
    // doc comment).
    let current_sp = Unicorn::reg_read(uc, sp_register).ok();

    let data = uc.get_data_mut();
    hooks::mem_write_hook(
        &mut data.state,
        address,
        size as u32,
        value as u64,
        write_range,
        current_sp,
    );
    true
}

/// Returns `true` to tell Unicorn execution may continue, `false` to halt.
/// `hooks::invalid_instruction_hook` always signals `Stop` (spec §4.7), so
/// this always returns `false`.
fn insn_invalid_callback(_uc: &mut Unicorn<'_, HookData>) -> bool {
    hooks::invalid_instruction_hook() == HookAction::Continue
}

fn mem_invalid_callback(
    uc: &mut Unicorn<'_, HookData>,
    _mem_type: MemType,
    address: u64,
    _size: usize,
    _value: i64,
) -> bool {
    let block_size = uc.get_data().block_size;
    hooks::invalid_memory_hook(uc, address, block_size)
}

/// Runs one entry point to completion on the real Unicorn/Capstone backend
/// and harvests its recovered regions (spec §4.4).
pub fn run_entry_point(
    exe: &Executable,
    entry: u64,
    config: &Config,
    arch_info: &ArchInfo,
    stop_flag: &Arc<AtomicBool>,
) -> Result<Vec<Vec<u8>>, Error> {
    let disasm = capstone_backend::build(arch_info, entry)?;
    let sp_register = arch_info.sp_register.unwrap_or(-1);

    let data = HookData {
        state: EmuState::new(entry, config.stop, sp_register),
        disasm,
        wait: config.wait,
        calls_wait: config.calls_wait,
        write_range: config.write_range,
        block_size: config.block_size,
        stop_flag: Arc::clone(stop_flag),
        cancelled: false,
    };

    let mut uc = Unicorn::new_with_data(arch_info.emu_arch, arch_info.emu_mode, data).map_err(|e| {
        Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to create emulator: {e:?}"),
        }
    })?;

    driver::prime(&mut uc, exe, entry, config, arch_info)?;

    uc.add_code_hook(0, u64::MAX, code_callback).map_err(|e| {
        Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to install code hook: {e:?}"),
        }
    })?;
    uc.add_mem_hook(HookType::MEM_WRITE, 0, u64::MAX, mem_write_callback)
        .map_err(|e| Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to install write hook: {e:?}"),
        })?;
    uc.add_mem_hook(HookType::MEM_INVALID, 0, u64::MAX, mem_invalid_callback)
        .map_err(|e| Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to install page-fault hook: {e:?}"),
        })?;
    uc.add_insn_invalid_hook(insn_invalid_callback)
        .map_err(|e| Error::EntrySegmentMap {
            address: entry,
            source: anyhow::anyhow!("failed to install invalid-instruction hook: {e:?}"),
        })?;

    let upper = exe
        .location_from_address(entry)
        .map(|loc| loc.segment_virtual.upper)
        .unwrap_or(u64::MAX);

    // Emulator errors (including invalid-instruction faults the CPU itself
    // detects) are swallowed per spec §7: whatever was recorded is still
    // harvested below.
    if let Err(e) = uc.emu_start(entry, upper, 0, 0) {
        log::debug!("emulation for entry point {entry:#x} ended: {e:?}");
    }

    if uc.get_data().cancelled {
        log::info!("entry point {entry:#x} cancelled, discarding its partial results");
        return Ok(Vec::new());
    }

    let writes = uc.get_data().state.writes.clone();
    let mut harvested = EmuState::new(entry, config.stop, sp_register);
    harvested.writes = writes;

    Ok(driver::harvest(&mut uc, &harvested, config))
}
