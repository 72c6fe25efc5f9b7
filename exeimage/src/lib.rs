//! Loads a PE/ELF/Mach-O image and exposes just enough of it for an
//! emulation driver to build an address space from: pointer width, byte
//! order, declared architecture, segments, and virtual-address lookups.
//!
//! This crate is the "external collaborator" the core driver depends on; it
//! knows nothing about emulation, hooks, or stack strings.

mod arch;
mod error;

pub use arch::Arch;
pub use error::Error;

use object::{Object, ObjectSegment};

/// A half-open virtual (or file) address interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lower: u64,
    pub upper: u64,
}

impl Range {
    pub fn new(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    pub fn len(&self) -> u64 {
        self.upper.saturating_sub(self.lower)
    }

    pub fn is_empty(&self) -> bool {
        self.upper <= self.lower
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.lower && addr < self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// One loadable segment of the image.
#[derive(Debug, Clone)]
pub struct Segment {
    pub virtual_range: Range,
    pub physical_range: Range,
    pub data: Vec<u8>,
}

/// The result of mapping a virtual address back to a file position.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    /// Offset into the original file bytes.
    pub physical_position: u64,
    /// The virtual-address range of the segment that contains `address`.
    pub segment_virtual: Range,
}

/// A loaded executable image.
pub struct Executable {
    pointer_size: u32,
    byte_order: ByteOrder,
    arch: Arch,
    segments: Vec<Segment>,
    base_delta: i64,
}

impl Executable {
    /// Parse `data` as a PE, ELF, or Mach-O image.
    ///
    /// `base` optionally overrides the image's declared preferred load
    /// address; every virtual address this `Executable` reports (segment
    /// ranges, `location_from_address`) is shifted by the same amount.
    pub fn load(data: &[u8], base: Option<u64>) -> Result<Self, Error> {
        let file = object::File::parse(data).map_err(Error::Parse)?;

        let arch = arch::refine(Arch::from_object(file.architecture())?, &file);
        let byte_order = if file.is_little_endian() {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        let pointer_size = if file.is_64() { 64 } else { 32 };

        let default_base = file
            .segments()
            .map(|s| s.address())
            .min()
            .unwrap_or(0);
        let base_delta = base
            .map(|b| b as i64 - default_base as i64)
            .unwrap_or(0);

        let mut segments = Vec::new();
        for seg in file.segments() {
            let (file_off, file_len) = seg.file_range();
            let data_slice = seg
                .data()
                .map_err(|e| Error::SegmentData(format!("{e}")))?;
            let vlower = (seg.address() as i64 + base_delta) as u64;
            let vupper = vlower + seg.size();
            segments.push(Segment {
                virtual_range: Range::new(vlower, vupper),
                physical_range: Range::new(file_off, file_off + file_len),
                data: data_slice.to_vec(),
            });
        }

        Ok(Self {
            pointer_size,
            byte_order,
            arch,
            segments,
            base_delta,
        })
    }

    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The single range spanning every mapped virtual address.
    pub fn image_defined_address_space(&self) -> Range {
        let lower = self
            .segments
            .iter()
            .map(|s| s.virtual_range.lower)
            .min()
            .unwrap_or(0);
        let upper = self
            .segments
            .iter()
            .map(|s| s.virtual_range.upper)
            .max()
            .unwrap_or(0);
        Range::new(lower, upper)
    }

    /// Maps a virtual address to a file position and the enclosing
    /// segment's virtual range. `None` if no segment contains `address`.
    pub fn location_from_address(&self, address: u64) -> Option<Location> {
        let seg = self
            .segments
            .iter()
            .find(|s| s.virtual_range.contains(address))?;
        let offset = address - seg.virtual_range.lower;
        Some(Location {
            physical_position: seg.physical_range.lower + offset,
            segment_virtual: seg.virtual_range,
        })
    }

    /// The amount every reported virtual address has been shifted by,
    /// relative to the image's own declared preferred base.
    pub fn base_delta(&self) -> i64 {
        self.base_delta
    }
}
