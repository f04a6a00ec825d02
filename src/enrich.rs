//! Optional parts of the information structure: the memory map, the APM table and the boot loader
//! name. A kernel can boot without any of them, so a missing source or a failed placement only
//! costs the corresponding field and flag.

use alloc::vec::Vec;
use core::cmp::min;

use log::{debug, warn};
use multiboot::{BootInfo, MemoryMapEntry};
use types::mem::MemoryRegion;
use zerocopy::AsBytes;

use crate::platform::{AddressMapper, Firmware};

/// Alignment of the firmware tables placed in target memory.
pub const TABLE_ALIGN: u32 = 4;

/// Lower memory is everything below 640 KiB.
const LOWER_MEMORY_LIMIT: u64 = 640 * 1024;

/// Upper memory starts at 1 MiB.
const UPPER_MEMORY_START: u64 = 0x10_0000;

pub(crate) fn memory_map<P>(platform: &mut P, info: &mut BootInfo)
where
    P: AddressMapper + Firmware + ?Sized,
{
    let Some(regions) = platform.memory_map().filter(|regions| !regions.is_empty()) else {
        warn!("No memory map available");
        return;
    };

    if let Some((mem_lower, mem_upper)) = memory_bounds(&regions) {
        debug!("Lower memory: {mem_lower} KiB, upper memory: {mem_upper} KiB");
        info.set_memory_bounds(mem_lower, mem_upper);
    }

    let mut buffer = Vec::new();
    if buffer
        .try_reserve_exact(regions.len() * core::mem::size_of::<MemoryMapEntry>())
        .is_err()
    {
        warn!("Out of memory while building the memory map");
        return;
    }
    for region in &regions {
        buffer.extend_from_slice(MemoryMapEntry::from(region).as_bytes());
    }

    let Ok(length) = u32::try_from(buffer.len()) else {
        warn!("Memory map too large ({} entries)", regions.len());
        return;
    };
    match platform.map_data(&buffer, TABLE_ALIGN, false) {
        Some(addr) => {
            debug!("Memory map ({} entries) @ {addr}", regions.len());
            info.set_memory_map(addr, length);
        }
        None => warn!("Failed to map the memory map"),
    }
}

pub(crate) fn apm_table<P>(platform: &mut P, info: &mut BootInfo)
where
    P: AddressMapper + Firmware + ?Sized,
{
    let Some(table) = platform.apm_table() else {
        return;
    };

    match platform.map_data(table.as_bytes(), TABLE_ALIGN, false) {
        Some(addr) => {
            debug!("APM table (version {:#06x}) @ {addr}", table.version);
            info.set_apm_table(addr);
        }
        None => warn!("Failed to map the APM table"),
    }
}

pub(crate) fn boot_loader_name<M>(mapper: &mut M, name: Option<&str>, info: &mut BootInfo)
where
    M: AddressMapper + ?Sized,
{
    let Some(name) = name else {
        return;
    };

    match mapper.map_string(name) {
        Some(addr) => info.set_boot_loader_name(addr),
        None => warn!("Failed to map the boot loader name"),
    }
}

/// Amount of available memory in KiB starting at 0 (capped at 640 KiB) and at 1 MiB, as expected
/// in `mem_lower` and `mem_upper`. `None` if neither address is backed by available memory.
pub fn memory_bounds(regions: &[MemoryRegion]) -> Option<(u32, u32)> {
    let lower = available_from(regions, 0).map(|length| min(length, LOWER_MEMORY_LIMIT) >> 10);
    let upper = available_from(regions, UPPER_MEMORY_START).map(|length| length >> 10);
    if lower.is_none() && upper.is_none() {
        return None;
    }

    let kib = |length: Option<u64>| u32::try_from(length.unwrap_or(0)).unwrap_or(u32::MAX);
    Some((kib(lower), kib(upper)))
}

/// Length of the run of available memory starting at `start`, following adjacent or overlapping
/// available regions.
fn available_from(regions: &[MemoryRegion], start: u64) -> Option<u64> {
    let usable = || regions.iter().filter(|region| region.is_usable());

    let mut end = usable()
        .filter(|region| region.contains(start))
        .map(MemoryRegion::end_addr)
        .max()?;
    while let Some(next) = usable()
        .filter(|region| region.base_addr <= end && region.end_addr() > end)
        .map(MemoryRegion::end_addr)
        .max()
    {
        end = next;
    }

    Some(end - start)
}
