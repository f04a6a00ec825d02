//! Serialization and traversal of the Multiboot memory map.

use types::mem::{MemoryRegion, MemoryRegionType};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Represents an entry in the multiboot memory map. The buffer consists of one or more of the
/// following size/structure pairs (`size` is really just used for skipping to the next pair):
///
/// ```text
///         +-------------------+  <-- Start of struct MemoryMapEntry
/// -4      | size              |
///         +-------------------+  <-- `size` is from here to next entry
/// 0       | base_addr         |
/// 8       | length            |
/// 16      | type              |
///         +-------------------+  <-- End of struct MemoryMapEntry
/// ```
///
/// where `size` is the size of the associated structure in bytes, which can be greater than the
/// minimum of 20 bytes. The 64-bit fields are not naturally aligned, hence `packed`.
#[derive(Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct MemoryMapEntry {
    /// When 4 is added to `size`, the result can be used as an offset to skip to the next memory
    /// map entry in the mmap buffer.
    size: u32,

    /// The start address of the memory region described by this entry.
    base_addr: u64,

    /// The size in bytes of the memory region described by this entry.
    length: u64,

    /// The type of the memory described by this entry.
    ///
    /// * 1: "available RAM"
    /// * 3: "usable memory holding ACPI information"
    /// * 4: "reserved memory which needs to be preserved on hibernation"
    /// * 5: "memory which is occupied by defective RAM modules"
    ///
    /// Any other value indicates a reserved area.
    r#type: u32,
}

const _: [(); 24] = [(); core::mem::size_of::<MemoryMapEntry>()];

impl MemoryMapEntry {
    /// Value of the `size` field for entries written by this crate.
    pub const SIZE: u32 = (core::mem::size_of::<Self>() - 4) as u32;

    /// Returns the offset from the start address of this memory map entry to the next entry in the
    /// buffer.
    pub fn offset_to_next(&self) -> usize {
        self.size as usize + 4
    }
}

impl From<&MemoryRegion> for MemoryMapEntry {
    fn from(region: &MemoryRegion) -> Self {
        Self {
            size: Self::SIZE,
            base_addr: region.base_addr,
            length: region.length,
            r#type: match region.class {
                MemoryRegionType::Available => 1,
                MemoryRegionType::Reserved => 2,
                MemoryRegionType::AcpiReclaimable => 3,
                MemoryRegionType::AcpiNvs => 4,
                MemoryRegionType::Defective => 5,
            },
        }
    }
}

impl From<&MemoryMapEntry> for MemoryRegion {
    fn from(entry: &MemoryMapEntry) -> Self {
        Self {
            base_addr: entry.base_addr,
            length: entry.length,
            class: match entry.r#type {
                1 => MemoryRegionType::Available,
                3 => MemoryRegionType::AcpiReclaimable,
                4 => MemoryRegionType::AcpiNvs,
                5 => MemoryRegionType::Defective,
                _ => MemoryRegionType::Reserved,
            },
        }
    }
}

/// Provides an iterator over a serialized multiboot memory map. The `'mmap` lifetime parameter
/// describes the lifetime of the underlying memory buffer containing the memory map.
#[derive(Clone)]
pub struct MemoryMapIter<'mmap> {
    buffer: &'mmap [u8],
}

impl<'mmap> From<&'mmap [u8]> for MemoryMapIter<'mmap> {
    fn from(buffer: &'mmap [u8]) -> Self {
        Self { buffer }
    }
}

impl Iterator for MemoryMapIter<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = MemoryMapEntry::read_from_prefix(self.buffer)?;
        self.buffer = self
            .buffer
            .get(entry.offset_to_next()..)
            .unwrap_or_default();
        Some((&entry).into())
    }
}

impl core::fmt::Debug for MemoryMapIter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
