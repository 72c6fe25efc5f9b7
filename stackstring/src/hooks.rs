use crate::config::Bounds;
use crate::disasm::Disassembler;
use crate::emu::{EmuError, Emulator, HookAction, Perms};
use crate::state::EmuState;

/// Code hook (spec §4.5), runs before each instruction executes.
///
/// `instr_bytes` is the raw encoding of the instruction at `pc`, passed in
/// by the caller (read from the loaded image) purely so it can be handed
/// to the disassembler for the debug log (spec §4.5 step 7); the hook
/// itself never touches the live emulator.
pub fn code_hook(
    state: &mut EmuState,
    disasm: &impl Disassembler,
    pc: u64,
    size: u32,
    instr_bytes: &[u8],
    wait_threshold: u32,
    calls_wait: bool,
) -> HookAction {
    if state.stop == Some(pc) {
        log::debug!("halting at stop address {pc:#x}");
        return HookAction::Stop;
    }

    // `depth` is captured once, then adjusted in place if this instruction
    // turns out to be a return (pop below) — but NOT adjusted for the
    // "false call" pop in the `else` arm. This mirrors the original unit's
    // behaviour exactly: a local `depth` is decremented only on the
    // call-stack-pop branch, and that adjusted value is what later decides
    // whether the wait counter advances.
    let mut depth = state.depth();
    state.previous_address = state.address;

    if pc != state.address {
        if depth > 0 && Some(&pc) == state.callstack.last() {
            depth -= 1;
            state.callstack.pop();
            if depth == 0 {
                state.stack_ceiling = 0;
            }
        }
        state.address = pc;
    } else if state.retaddr.is_some() {
        // The fall-through address was pushed to the stack, but we didn't
        // branch away: this wasn't really a call (e.g. a "get current IP"
        // idiom), so the tentative call-stack entry is retracted.
        state.callstack.pop();
        state.retaddr = None;
    }

    if state.waiting > wait_threshold {
        log::debug!("halting: {} instructions without a qualifying write", state.waiting);
        return HookAction::Stop;
    }

    if depth == 0 || !calls_wait {
        state.waiting += 1;
    }

    state.address += size as u64;

    match disasm.decode_one(instr_bytes, pc) {
        Some((mnemonic, ops)) => {
            log::debug!(
                "emulating [wait={:02}] {}{pc:#x}: {mnemonic} {ops}",
                state.waiting,
                "    ".repeat(depth),
            );
            HookAction::Continue
        }
        None => {
            log::debug!("unrecognized instruction at {pc:#x}, aborting");
            HookAction::Stop
        }
    }
}

/// Memory-write hook (spec §4.6). Never halts emulation.
///
/// `current_sp` is the live stack-pointer value, read by the caller before
/// this hook runs. It would be more natural for this function to read it
/// itself via an `&mut impl Emulator`, but on the real backend the state
/// this hook mutates lives inside the emulator's own hook user-data, so
/// holding a mutable borrow of the emulator and of that state at the same
/// time isn't possible in safe Rust — the caller reads SP first instead
/// (spec's "read live from the emulator" still holds: it's read fresh on
/// every call, just outside this function).
pub fn mem_write_hook(
    state: &mut EmuState,
    addr: u64,
    size: u32,
    value: u64,
    write_range: Bounds,
    current_sp: Option<u64>,
) -> HookAction {
    let mask: u64 = if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    };
    let unsigned_value = value & mask;
    let depth = state.depth();

    if unsigned_value == state.address {
        if state.callstack.is_empty() {
            if let Some(sp) = current_sp {
                state.stack_ceiling = sp;
            }
        }
        state.retaddr = Some(unsigned_value);
        state.callstack.push(unsigned_value);
    } else {
        state.retaddr = None;
    }

    if state.stack_ceiling > 0
        && addr >= state.stack_ceiling.saturating_sub(0x200)
        && addr < state.stack_ceiling
    {
        log::trace!("suppressing ceiling write at {addr:#x}");
        return HookAction::Continue;
    }

    state.waiting = 0;

    if !write_range.contains(size as u64) {
        return HookAction::Continue;
    }

    state.writes.add(addr, size as u64);
    log::debug!(
        "emulating [wait=00] {}{addr:#x} <- {:0width$x}",
        "    ".repeat(depth),
        unsigned_value,
        width = size as usize * 2,
    );
    HookAction::Continue
}

/// Invalid-instruction hook (spec §4.7): always halts.
pub fn invalid_instruction_hook() -> HookAction {
    log::debug!("aborting emulation: invalid instruction");
    HookAction::Stop
}

/// Invalid-memory hook (spec §4.8): best-effort on-demand paging. Returns
/// `true` to tell the emulator to retry the faulting access, `false` if
/// the recovery mapping itself failed.
pub fn invalid_memory_hook(emu: &mut impl Emulator, addr: u64, block_size: u64) -> bool {
    let base = (addr / block_size) * block_size;
    match emu.mem_map(base, block_size * 2, Perms::ALL) {
        Ok(()) => true,
        Err(EmuError::Backend(msg)) => {
            log::warn!("failed to page in memory around {addr:#x}: {msg}");
            false
        }
    }
}
