use core::cmp::{max, min};
use core::fmt::{Display, Formatter, Result};
use core::ops::Range;

use crate::fmt::Fmt;

/// A contiguous range of physical memory of the target machine, as reported by its firmware.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base_addr: u64,
    pub length: u64,
    pub class: MemoryRegionType,
}

impl MemoryRegion {
    pub const fn new(base_addr: u64, length: u64, class: MemoryRegionType) -> Self {
        Self {
            base_addr,
            length,
            class,
        }
    }

    pub fn with_end_addr(self, end_addr: u64) -> Self {
        Self {
            length: end_addr - self.base_addr,
            ..self
        }
    }

    pub fn end_addr(&self) -> u64 {
        self.base_addr + self.length
    }

    pub fn range(&self) -> Range<u64> {
        self.base_addr..self.end_addr()
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.range().contains(&addr)
    }

    /// Whether `range` lies completely inside this region.
    pub fn covers(&self, range: &Range<u64>) -> bool {
        self.base_addr <= range.start && range.end <= self.end_addr()
    }

    pub fn is_usable(&self) -> bool {
        self.class == MemoryRegionType::Available
    }
}

impl core::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "(@ 0x{:x}, len: {} KiB, {})",
            self.base_addr,
            self.length / 1024,
            self.class,
        )
    }
}

impl Display for MemoryRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "@ 0x{:x}: {} ({})",
            self.base_addr,
            Fmt::<u64>::from(self.length),
            self.class
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegionType {
    Available,
    Reserved,
    AcpiReclaimable,
    AcpiNvs,
    Defective,
}

impl Display for MemoryRegionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(match self {
            Self::Available => "usable",
            Self::Reserved => "reserved",
            Self::AcpiReclaimable => "acpi reclaimable",
            Self::AcpiNvs => "acpi nvs",
            Self::Defective => "defective",
        })
    }
}

/// Clips the regions of a memory map to an address window.
pub trait RangeFilterExt: Iterator<Item = MemoryRegion> + Sized {
    /// Restrict every region to `window`, dropping regions that end up empty.
    fn filter_range(self, window: Range<u64>) -> RangeFilter<Self> {
        RangeFilter { iter: self, window }
    }
}

impl<T: Iterator<Item = MemoryRegion>> RangeFilterExt for T {}

#[derive(Debug, Clone)]
pub struct RangeFilter<T> {
    iter: T,
    window: Range<u64>,
}

impl<T> Iterator for RangeFilter<T>
where
    T: Iterator<Item = MemoryRegion>,
{
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        let window = &self.window;
        self.iter.by_ref().find_map(|region| {
            let base_addr = max(window.start, region.base_addr);
            let end_addr = min(window.end, region.end_addr());
            (base_addr < end_addr).then(|| {
                MemoryRegion {
                    base_addr,
                    ..region
                }
                .with_end_addr(end_addr)
            })
        })
    }
}
