use crate::error::Error;
use object::elf::EF_MIPS_ARCH_ASE_M16;
use object::{Architecture, FileFlags, Object};

/// The coarse architecture tag the loader assigns to an image.
///
/// This is deliberately a flat enum rather than a richer type: downstream,
/// `stackstring::arch` maps each tag to an `(emulator-arch, emulator-mode,
/// sp-register)` triple and a `(disasm-arch, disasm-mode)` pair via a dense
/// constant table, not a class hierarchy (see spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X8632,
    X8664,
    Arm32,
    Arm64,
    Mips16,
    Mips32,
    Mips64,
    Ppc32,
    Ppc64,
    Sparc32,
    Sparc64,
}

impl Arch {
    pub(crate) fn from_object(arch: Architecture) -> Result<Self, Error> {
        match arch {
            Architecture::I386 => Ok(Arch::X8632),
            Architecture::X86_64 | Architecture::X86_64_X32 => Ok(Arch::X8664),
            Architecture::Arm => Ok(Arch::Arm32),
            Architecture::Aarch64 | Architecture::Aarch64_Ilp32 => Ok(Arch::Arm64),
            Architecture::Mips => Ok(Arch::Mips32),
            Architecture::Mips64 => Ok(Arch::Mips64),
            Architecture::PowerPc => Ok(Arch::Ppc32),
            Architecture::PowerPc64 => Ok(Arch::Ppc64),
            Architecture::Sparc | Architecture::Sparc32Plus => Ok(Arch::Sparc32),
            Architecture::Sparc64 => Ok(Arch::Sparc64),
            other => Err(Error::UnsupportedArchitecture(format!("{other:?}"))),
        }
    }

    /// Refine a MIPS-32 tag to MIPS-16 when the ELF flags advertise the
    /// MIPS16 application-specific extension.
    pub(crate) fn refine_mips(self, flags: FileFlags) -> Self {
        if self != Arch::Mips32 {
            return self;
        }
        if let FileFlags::Elf { e_flags, .. } = flags {
            if e_flags & EF_MIPS_ARCH_ASE_M16 != 0 {
                return Arch::Mips16;
            }
        }
        self
    }
}

pub(crate) fn refine(arch: Arch, file: &impl Object) -> Arch {
    arch.refine_mips(file.flags())
}
