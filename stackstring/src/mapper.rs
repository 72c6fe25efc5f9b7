use crate::emu::{Emulator, Perms};
use exeimage::Executable;

fn align_up(align: u64, value: u64) -> u64 {
    if align == 0 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Maps every segment of `exe` into `emu` (spec §4.2). A segment whose
/// mapping or write fails is fatal only if `entry` lies within it;
/// otherwise the failure is logged and the segment is skipped, since
/// overlapping or malformed auxiliary segments shouldn't block emulation
/// of a perfectly good entry point.
pub fn map_image(
    emu: &mut impl Emulator,
    exe: &Executable,
    entry: u64,
    block_size: u64,
) -> Result<(), anyhow::Error> {
    for seg in exe.segments() {
        let vlower = seg.virtual_range.lower;
        let size = align_up(block_size, seg.virtual_range.len());
        let result = emu
            .mem_map(vlower, size, Perms::ALL)
            .and_then(|()| emu.mem_write(vlower, &seg.data));

        if let Err(e) = result {
            if seg.virtual_range.contains(entry) {
                anyhow::bail!(
                    "failed to map entry segment [{:#x}-{:#x}): {e}",
                    seg.virtual_range.lower,
                    seg.virtual_range.upper
                );
            }
            log::warn!(
                "error mapping segment [{:#x}-{:#x}): {e}",
                seg.virtual_range.lower,
                seg.virtual_range.upper
            );
        }
    }
    Ok(())
}
