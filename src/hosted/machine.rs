use std::convert::Infallible;
use std::ops::Range;

use log::{debug, info, trace};
use mboot::{AddressMapper, Firmware, Handoff, HandoffFlags, Registers, TargetAddress};
use multiboot::mmap::MemoryMapIter;
use multiboot::{BootInfo, Header, LoadAddressRequest, Module};
use thiserror::Error;
use types::fmt::Fmt;
use types::mem::{MemoryRegion, MemoryRegionType, RangeFilterExt};
use zerocopy::FromBytes;

/// Nothing is placed in the first page, so no placement ever ends up at address zero.
const LOWEST_ADDRESS: u64 = 0x1000;

/// Primary images without load address fields go above the first megabyte.
const IMAGE_MIN_ADDRESS: u64 = 0x10_0000;

/// Everything must stay below 4 GiB.
const ADDRESS_LIMIT: u64 = 1 << 32;

/// A PC with 128 MiB of memory: conventional memory, the EBDA, the BIOS area and extended memory.
const DEFAULT_MEMORY_MAP: [MemoryRegion; 4] = [
    MemoryRegion::new(0, 0x9_fc00, MemoryRegionType::Available),
    MemoryRegion::new(0x9_fc00, 0x400, MemoryRegionType::Reserved),
    MemoryRegion::new(0xf_0000, 0x1_0000, MemoryRegionType::Reserved),
    MemoryRegion::new(0x10_0000, 0x7f0_0000, MemoryRegionType::Available),
];

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("cannot transfer control to {entry:#010x} from a hosted environment")]
    Hosted { entry: u32 },
}

/// A block of simulated target memory and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub addr: TargetAddress,
    pub data: Vec<u8>,
}

impl Placement {
    fn range(&self) -> Range<u64> {
        let start = u64::from(self.addr);
        start..start + self.data.len() as u64
    }
}

/// Target memory described by a firmware memory map. Blocks are handed out first-fit from a cursor
/// that only ever moves up; the final jump is only logged.
#[derive(Debug)]
pub struct SimulatedMachine {
    regions: Vec<MemoryRegion>,
    cursor: u64,
    placements: Vec<Placement>,
    entry: Option<u32>,
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_MAP.to_vec())
    }
}

impl SimulatedMachine {
    pub fn new(regions: Vec<MemoryRegion>) -> Self {
        Self {
            regions,
            cursor: LOWEST_ADDRESS,
            placements: Vec::new(),
            entry: None,
        }
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Where the kernel would start running, once the primary image is placed.
    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    /// Simulated memory from `addr` to the end of the block containing it.
    pub fn read(&self, addr: TargetAddress) -> Option<&[u8]> {
        let addr = u64::from(addr);
        self.placements
            .iter()
            .find(|placement| placement.range().contains(&addr))
            .map(|placement| &placement.data[(addr - placement.range().start) as usize..])
    }

    pub fn read_string(&self, addr: TargetAddress) -> Option<String> {
        let bytes = self.read(addr)?;
        let len = bytes.iter().position(|&byte| byte == 0)?;
        Some(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }

    /// Reserve `len` bytes at the lowest `align`-ed free address at or above `min_addr`.
    fn allocate(&mut self, len: usize, align: u32, min_addr: u64) -> Option<TargetAddress> {
        let len = (len as u64).max(1);
        let start = self
            .regions
            .iter()
            .copied()
            .filter(MemoryRegion::is_usable)
            .filter_range(min_addr.max(self.cursor)..ADDRESS_LIMIT)
            .map(|region| (region.base_addr.next_multiple_of(u64::from(align)), region))
            .find(|(start, region)| region.covers(&(*start..start + len)))
            .map(|(start, _)| start)?;

        self.cursor = start + len;
        TargetAddress::new(u32::try_from(start).ok()?)
    }

    fn allocate_copy(&mut self, data: &[u8], align: u32, min_addr: u64) -> Option<Placement> {
        let addr = self.allocate(data.len(), align, min_addr)?;
        Some(Placement {
            addr,
            data: data.to_vec(),
        })
    }

    /// Place the image the way its a.out kludge fields ask for: the bytes from `load_addr` up to
    /// `load_end_addr`, followed by zeroes up to `bss_end_addr`.
    fn place_fixed(
        &mut self,
        image: &[u8],
        header_offset: usize,
        request: &LoadAddressRequest,
    ) -> Option<Placement> {
        let header_addr = request.header_addr();
        let load_addr = request.load_addr();
        let skip = header_addr.checked_sub(load_addr)? as usize;
        let file_start = header_offset.checked_sub(skip)?;

        let load_len = match request.load_end_addr() {
            0 => image.len() - file_start,
            end => end.checked_sub(load_addr)? as usize,
        };
        let file_end = file_start.checked_add(load_len)?;
        let load_end = u64::from(load_addr) + load_len as u64;
        let mem_end = load_end.max(u64::from(request.bss_end_addr()));
        let range = u64::from(load_addr)..mem_end;

        if file_end > image.len() || range.start < self.cursor || range.end > ADDRESS_LIMIT {
            return None;
        }
        if !self
            .regions
            .iter()
            .any(|region| region.is_usable() && region.covers(&range))
        {
            return None;
        }

        let mut data = image[file_start..file_end].to_vec();
        data.resize((mem_end - range.start) as usize, 0);

        self.cursor = mem_end;
        self.entry = Some(request.entry_addr());
        Some(Placement {
            addr: TargetAddress::new(load_addr)?,
            data,
        })
    }

    fn dump_info(&self, addr: TargetAddress) {
        let Some(info) = self.read(addr).and_then(BootInfo::read_from_prefix) else {
            debug!("No information structure @ {addr}");
            return;
        };
        debug!("{info:?}");

        if let Some(cmdline) = info.command_line().and_then(|addr| self.read_string(addr)) {
            info!("Kernel command line: {cmdline}");
        }

        if let Some((count, list)) = info.modules() {
            let entries = self.read(list).unwrap_or_default();
            for (index, module) in entries
                .chunks_exact(core::mem::size_of::<Module>())
                .take(count as usize)
                .filter_map(Module::read_from)
                .enumerate()
            {
                let cmdline = module
                    .string()
                    .and_then(|addr| self.read_string(addr))
                    .unwrap_or_default();
                info!(
                    "Module {index}: {:#010x}-{:#010x} {cmdline}",
                    module.start(),
                    module.end()
                );
            }
        }

        if let Some((mmap, len)) = info.memory_map() {
            let bytes = self.read(mmap).unwrap_or_default();
            for region in MemoryMapIter::from(&bytes[..bytes.len().min(len as usize)]) {
                trace!("{region}");
            }
        }
    }
}

impl AddressMapper for SimulatedMachine {
    fn map_data(&mut self, data: &[u8], align: u32, fixed: bool) -> Option<TargetAddress> {
        let header = if fixed { Header::find(data) } else { None };
        let request = header
            .as_ref()
            .and_then(|(offset, header)| Some((*offset, header.load_addresses()?)));

        let placement = match request {
            Some((offset, request)) => self.place_fixed(data, offset, request)?,
            None if fixed => self.allocate_copy(data, align, IMAGE_MIN_ADDRESS)?,
            None => self.allocate_copy(data, align, LOWEST_ADDRESS)?,
        };

        let addr = placement.addr;
        trace!(
            "{} placed @ {addr}, cursor now {:#x}",
            Fmt::<u8>::from(placement.data.len()),
            self.cursor
        );
        self.placements.push(placement);
        Some(addr)
    }
}

impl Firmware for SimulatedMachine {
    fn memory_map(&mut self) -> Option<Vec<MemoryRegion>> {
        Some(self.regions.clone())
    }
}

impl Handoff for SimulatedMachine {
    type Error = HandoffError;

    fn transfer_control(
        &mut self,
        registers: Registers,
        flags: HandoffFlags,
    ) -> Result<Infallible, Self::Error> {
        info!(
            "eax = {:#010x}, ebx = {}, flags = {flags:?}",
            registers.eax, registers.ebx
        );
        debug!("{} blocks of target memory in use", self.placements().len());
        self.dump_info(registers.ebx);

        Err(HandoffError::Hosted {
            entry: self.entry().unwrap_or_default(),
        })
    }
}
