/// The slice of a disassembler's API the code hook needs for debug logging
/// (spec §4.5 step 7). Decoding failure is reported as `None`, which the
/// code hook treats the same as an invalid instruction.
pub trait Disassembler {
    /// Decode one instruction from `bytes` assumed to start at virtual
    /// address `va`, returning `(mnemonic, operands)`.
    fn decode_one(&self, bytes: &[u8], va: u64) -> Option<(String, String)>;
}
