//! End-to-end tests against the real Unicorn/Capstone backend, built on
//! synthetic x86-32 ELF images assembled by hand in this file. Only the
//! scenarios that need a real image are covered here (S1, S2, S3, S6);
//! S4 and S5 are pure hook-logic and already covered by unit tests in
//! `stackstring::hooks`.

use stackstring::{Bounds, Config};

const BASE: u64 = 0x10000;

/// Builds a minimal ELF32 executable with a single `PT_LOAD` segment
/// mapping `code` at virtual address `BASE`, file offset 0.
fn build_elf32(code: &[u8]) -> Vec<u8> {
    const EHDR_SIZE: u32 = 52;
    const PHDR_SIZE: u32 = 32;
    let total = EHDR_SIZE + PHDR_SIZE + code.len() as u32;

    let mut out = Vec::with_capacity(total as usize);

    // e_ident
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    out.push(1); // ELFCLASS32
    out.push(1); // ELFDATA2LSB
    out.push(1); // EV_CURRENT
    out.extend_from_slice(&[0u8; 9]); // padding

    out.extend_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
    out.extend_from_slice(&3u16.to_le_bytes()); // e_machine = EM_386
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&(BASE as u32).to_le_bytes()); // e_entry
    out.extend_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    assert_eq!(out.len() as u32, EHDR_SIZE);

    // program header: one PT_LOAD, RWX, covering the whole file.
    out.extend_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
    out.extend_from_slice(&0u32.to_le_bytes()); // p_offset
    out.extend_from_slice(&(BASE as u32).to_le_bytes()); // p_vaddr
    out.extend_from_slice(&(BASE as u32).to_le_bytes()); // p_paddr
    out.extend_from_slice(&total.to_le_bytes()); // p_filesz
    out.extend_from_slice(&total.to_le_bytes()); // p_memsz
    out.extend_from_slice(&7u32.to_le_bytes()); // p_flags = RWX
    out.extend_from_slice(&0x1000u32.to_le_bytes()); // p_align
    assert_eq!(out.len() as u32, EHDR_SIZE + PHDR_SIZE);

    out.extend_from_slice(code);
    out
}

mod asm {
    /// `mov dword [esp+disp8], imm32`
    pub fn mov_dword_esp(disp8: i8, imm32: u32) -> Vec<u8> {
        let mut v = vec![0xC7, 0x44, 0x24, disp8 as u8];
        v.extend_from_slice(&imm32.to_le_bytes());
        v
    }

    /// `mov word [esp+disp8], imm16`
    pub fn mov_word_esp(disp8: i8, imm16: u16) -> Vec<u8> {
        let mut v = vec![0x66, 0xC7, 0x44, 0x24, disp8 as u8];
        v.extend_from_slice(&imm16.to_le_bytes());
        v
    }

    /// `mov byte [esp+disp8], imm8`
    pub fn mov_byte_esp(disp8: i8, imm8: u8) -> Vec<u8> {
        vec![0xC6, 0x44, 0x24, disp8 as u8, imm8]
    }

    /// `mov dword [esp+disp32], imm32` — needed wherever the offset from
    /// ESP doesn't fit in a signed byte.
    pub fn mov_dword_esp32(disp32: i32, imm32: u32) -> Vec<u8> {
        let mut v = vec![0xC7, 0x84, 0x24];
        v.extend_from_slice(&disp32.to_le_bytes());
        v.extend_from_slice(&imm32.to_le_bytes());
        v
    }

    /// `mov word [esp+disp32], imm16`
    pub fn mov_word_esp32(disp32: i32, imm16: u16) -> Vec<u8> {
        let mut v = vec![0x66, 0xC7, 0x84, 0x24];
        v.extend_from_slice(&disp32.to_le_bytes());
        v.extend_from_slice(&imm16.to_le_bytes());
        v
    }

    /// `nop`
    pub fn nop() -> Vec<u8> {
        vec![0x90]
    }

    /// `push <reg>` for eax=0,ecx=1,edx=2,ebx=3,esp=4,ebp=5,esi=6,edi=7.
    pub fn push_reg(reg: u8) -> Vec<u8> {
        vec![0x50 + reg]
    }

    /// `ret`
    pub fn ret() -> Vec<u8> {
        vec![0xC3]
    }

    /// `call rel32` — caller patches the 4 displacement bytes once the
    /// target's offset is known, via the returned index into the buffer.
    pub fn call_rel32_placeholder() -> Vec<u8> {
        vec![0xE8, 0, 0, 0, 0]
    }
}

/// S1 — three adjacent writes below ESP coalesce into one 10-byte region
/// recovered in ascending-address order.
#[test]
fn classic_stack_string() {
    let mut code = Vec::new();
    code.extend(asm::mov_dword_esp(-10, 0x6c6c6548)); // "Hell" at [esp-10, esp-6)
    code.extend(asm::mov_dword_esp(-6, 0x6f57206f)); // "o Wo" at [esp-6, esp-2)
    code.extend(asm::mov_word_esp(-2, 0x6c72)); // "rl" at [esp-2, esp)
    for _ in 0..14 {
        code.extend(asm::nop());
    }
    code.extend(asm::ret());

    let image = build_elf32(&code);
    let config = Config::new(vec![BASE]);
    let regions = stackstring::extract(&image, config).expect("extraction should not error");

    assert!(
        regions.iter().any(|r| r == b"Hello Worl"),
        "expected a recovered \"Hello Worl\" region, got {regions:?}"
    );
}

/// S2 — a single 4-byte write is below the default `patch_range` (`[5,
/// inf)`) and is dropped; widening `patch_range` to include it recovers it.
#[test]
fn below_patch_range_is_dropped_then_recovered() {
    let mut code = Vec::new();
    code.extend(asm::mov_dword_esp(-4, 0x6c6c6548)); // "Hell"
    for _ in 0..14 {
        code.extend(asm::nop());
    }
    code.extend(asm::ret());
    let image = build_elf32(&code);

    let default_config = Config::new(vec![BASE]);
    let regions = stackstring::extract(&image, default_config).unwrap();
    assert!(
        regions.iter().all(|r| r != b"Hell"),
        "a 4-byte region should not pass the default patch_range"
    );

    let mut widened = Config::new(vec![BASE]);
    widened.patch_range = Bounds::at_least(4);
    let regions = stackstring::extract(&image, widened).unwrap();
    assert!(regions.iter().any(|r| r == b"Hell"));
}

/// S3 — a call's own return-address push (and whatever it spills into the
/// frame just below it) is ceiling-suppressed; a write further down the
/// stack, past the 0x200-byte suppressed band, is still recovered.
#[test]
fn ceiling_suppresses_call_prologue_spills() {
    let mut code = Vec::new();
    code.extend(asm::call_rel32_placeholder());
    let call_end = code.len();

    for _ in 0..14 {
        code.extend(asm::nop());
    }
    code.extend(asm::ret());

    let sub_start = code.len();
    code.extend(asm::push_reg(5)); // push ebp
    code.extend(asm::push_reg(3)); // push ebx
    code.extend(asm::push_reg(6)); // push esi
    code.extend(asm::mov_dword_esp32(-0x300, 0x44434241)); // "ABCD", well past the 0x200 suppression band
    code.extend(asm::mov_word_esp32(-0x2fc, 0x4645)); // "EF"
    code.extend(asm::ret());

    let rel32 = (sub_start as i64 - call_end as i64) as i32;
    code[1..5].copy_from_slice(&rel32.to_le_bytes());

    let image = build_elf32(&code);
    let config = Config::new(vec![BASE]);
    let regions = stackstring::extract(&image, config).unwrap();

    assert!(
        regions.iter().any(|r| r == b"ABCDEF"),
        "expected the post-prologue write to be recovered, got {regions:?}"
    );
    assert!(
        regions.iter().all(|r| r.len() != 4),
        "the three register-spill pushes must not produce recovered regions"
    );
}

/// S6 — a `stop` address prevents a second write from ever executing; the
/// first write's region is still harvested.
#[test]
fn stop_address_prevents_the_second_write() {
    let mut code = Vec::new();
    code.extend(asm::mov_dword_esp(-5, 0x44434241)); // "ABCD"
    code.extend(asm::mov_byte_esp(-1, 0x45)); // "E" -- merges into "ABCDE"
    let stop_at = BASE + code.len() as u64;
    code.extend(asm::mov_dword_esp(-0x100, 0x48474645)); // "FGHI", must never execute
    code.extend(asm::mov_byte_esp(-0xfc, 0x4a)); // "J"
    code.extend(asm::ret());

    let image = build_elf32(&code);
    let mut config = Config::new(vec![BASE]);
    config.stop = Some(stop_at);
    let regions = stackstring::extract(&image, config).unwrap();

    assert_eq!(regions, vec![b"ABCDE".to_vec()]);
}
