//! Architecture dispatch table (spec §4/§9). Kept as a single flat match
//! rather than a per-architecture type, because entries here are data, not
//! behaviour: architecture support is adding a row, not a new trait impl.

use crate::error::Error;
use exeimage::Arch;
use unicorn_engine::unicorn_const::{Arch as UcArch, Mode as UcMode};
use unicorn_engine::{RegisterARM, RegisterARM64, RegisterMIPS, RegisterSPARC, RegisterX86};

/// Everything the driver and the disassembler backend need to stand up an
/// architecture: the Unicorn arch/mode pair, the stack-pointer register (if
/// the architecture gets one initialised at all — PowerPC does not, per
/// spec §6), and the matching Capstone arch/mode pair.
#[derive(Debug, Clone, Copy)]
pub struct ArchInfo {
    pub emu_arch: UcArch,
    pub emu_mode: UcMode,
    pub sp_register: Option<i32>,
    pub disasm_arch: capstone::Arch,
    pub disasm_mode: capstone::Mode,
}

/// Look up the dispatch row for a loader-reported architecture. An
/// architecture the loader can name but this table has no row for is fatal
/// (spec §6: "Any architecture the loader reports but the architecture
/// table does not know is fatal").
pub fn lookup(arch: Arch) -> Result<ArchInfo, Error> {
    use capstone::{Arch as CsArch, Mode as CsMode};

    let info = match arch {
        Arch::X8632 => ArchInfo {
            emu_arch: UcArch::X86,
            emu_mode: UcMode::MODE_32,
            sp_register: Some(RegisterX86::ESP as i32),
            disasm_arch: CsArch::X86,
            disasm_mode: CsMode::Mode32,
        },
        Arch::X8664 => ArchInfo {
            emu_arch: UcArch::X86,
            emu_mode: UcMode::MODE_64,
            sp_register: Some(RegisterX86::RSP as i32),
            disasm_arch: CsArch::X86,
            disasm_mode: CsMode::Mode64,
        },
        Arch::Arm32 => ArchInfo {
            emu_arch: UcArch::ARM,
            emu_mode: UcMode::ARM,
            sp_register: Some(RegisterARM::SP as i32),
            disasm_arch: CsArch::ARM,
            disasm_mode: CsMode::Arm,
        },
        // Preserved as observed, not corrected: the source tables pair
        // ARM-64 with THUMB mode (on both the emulator and disassembler
        // side), which is a 32-bit mode. Plausibly wrong upstream, kept
        // verbatim (spec §9).
        Arch::Arm64 => ArchInfo {
            emu_arch: UcArch::ARM64,
            emu_mode: UcMode::THUMB,
            sp_register: Some(RegisterARM64::SP as i32),
            disasm_arch: CsArch::ARM64,
            disasm_mode: CsMode::Thumb,
        },
        Arch::Mips16 => ArchInfo {
            emu_arch: UcArch::MIPS,
            emu_mode: UcMode::MODE_16,
            sp_register: Some(RegisterMIPS::SP as i32),
            disasm_arch: CsArch::MIPS,
            disasm_mode: CsMode::Mode16,
        },
        Arch::Mips32 => ArchInfo {
            emu_arch: UcArch::MIPS,
            emu_mode: UcMode::MIPS32,
            sp_register: Some(RegisterMIPS::SP as i32),
            disasm_arch: CsArch::MIPS,
            disasm_mode: CsMode::Mips32,
        },
        Arch::Mips64 => ArchInfo {
            emu_arch: UcArch::MIPS,
            emu_mode: UcMode::MIPS64,
            sp_register: Some(RegisterMIPS::SP as i32),
            disasm_arch: CsArch::MIPS,
            disasm_mode: CsMode::Mips64,
        },
        // PowerPC gets no SP register initialised (spec §6); the emulator
        // relies on its own zero-initialised register state.
        Arch::Ppc32 => ArchInfo {
            emu_arch: UcArch::PPC,
            emu_mode: UcMode::MODE_32,
            sp_register: None,
            disasm_arch: CsArch::PPC,
            disasm_mode: CsMode::Mode32,
        },
        Arch::Ppc64 => ArchInfo {
            emu_arch: UcArch::PPC,
            emu_mode: UcMode::MODE_64,
            sp_register: None,
            disasm_arch: CsArch::PPC,
            disasm_mode: CsMode::Mode64,
        },
        Arch::Sparc32 => ArchInfo {
            emu_arch: UcArch::SPARC,
            emu_mode: UcMode::MODE_32,
            sp_register: Some(RegisterSPARC::SP as i32),
            disasm_arch: CsArch::SPARC,
            disasm_mode: CsMode::Default,
        },
        Arch::Sparc64 => ArchInfo {
            emu_arch: UcArch::SPARC,
            emu_mode: UcMode::SPARC64,
            sp_register: Some(RegisterSPARC::SP as i32),
            disasm_arch: CsArch::SPARC,
            disasm_mode: CsMode::V9,
        },
    };
    Ok(info)
}

/// General-purpose registers (excluding SP and IP) seeded to mid-stack for
/// x86-32/x86-64 entry points (spec §4.4 step 4, §9: "by design" — other
/// architectures are left at the emulator's zero-initialised state).
pub fn x86_gp_registers(arch: Arch) -> &'static [i32] {
    use unicorn_engine::RegisterX86 as R;
    static X86_32: [i32; 7] = [
        R::EAX as i32,
        R::EBX as i32,
        R::ECX as i32,
        R::EDX as i32,
        R::ESI as i32,
        R::EDI as i32,
        R::EBP as i32,
    ];
    static X86_64: [i32; 15] = [
        R::RAX as i32,
        R::RBX as i32,
        R::RCX as i32,
        R::RDX as i32,
        R::RSI as i32,
        R::RDI as i32,
        R::RBP as i32,
        R::R8 as i32,
        R::R9 as i32,
        R::R10 as i32,
        R::R11 as i32,
        R::R12 as i32,
        R::R13 as i32,
        R::R14 as i32,
        R::R15 as i32,
    ];
    match arch {
        Arch::X8632 => &X86_32,
        Arch::X8664 => &X86_64,
        _ => &[],
    }
}
