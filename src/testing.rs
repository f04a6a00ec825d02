//! Collaborators for unit tests: an in-memory file store and a platform that hands out addresses
//! from a bump pointer and records every call, so tests can check placement order and decode what
//! ended up in "target memory".

use std::collections::BTreeMap;
use std::convert::Infallible;

use multiboot::{ApmTable, BootInfo, Module};
use types::{mem::MemoryRegion, TargetAddress};
use zerocopy::FromBytes;

use crate::platform::{AddressMapper, FileLoader, Firmware, Handoff, HandoffFlags, Registers};

#[derive(Default)]
pub struct MemFiles {
    files: BTreeMap<String, Vec<u8>>,
    /// Every path passed to `load`, in order.
    pub loaded: Vec<String>,
}

impl MemFiles {
    pub fn with(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(path.into(), data.to_vec());
        self
    }
}

impl FileLoader for MemFiles {
    type Error = &'static str;

    fn load(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        self.loaded.push(path.into());
        self.files.get(path).cloned().ok_or("file not found")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapCall {
    pub data: Vec<u8>,
    pub align: u32,
    pub fixed: bool,
    pub addr: Option<TargetAddress>,
}

type FailurePredicate = Box<dyn Fn(usize, &[u8], bool) -> bool>;

pub struct MockPlatform {
    next: u32,
    fail: Option<FailurePredicate>,
    pub calls: Vec<MapCall>,
    regions: Option<Vec<MemoryRegion>>,
    apm: Option<ApmTable>,
    pub handoffs: Vec<(Registers, HandoffFlags)>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            next: 0x0010_0000,
            fail: None,
            calls: Vec::new(),
            regions: None,
            apm: None,
            handoffs: Vec::new(),
        }
    }
}

impl MockPlatform {
    /// Make `map_data` fail whenever `predicate(call_index, data, fixed)` holds.
    pub fn failing(mut self, predicate: impl Fn(usize, &[u8], bool) -> bool + 'static) -> Self {
        self.fail = Some(Box::new(predicate));
        self
    }

    pub fn with_memory_map(mut self, regions: &[MemoryRegion]) -> Self {
        self.regions = Some(regions.to_vec());
        self
    }

    pub fn with_apm(mut self, apm: ApmTable) -> Self {
        self.apm = Some(apm);
        self
    }

    pub fn read(&self, addr: TargetAddress) -> &[u8] {
        &self
            .calls
            .iter()
            .find(|call| call.addr == Some(addr))
            .unwrap_or_else(|| panic!("nothing mapped at {addr}"))
            .data
    }

    pub fn string_at(&self, addr: TargetAddress) -> String {
        let bytes = self.read(addr);
        assert_eq!(bytes.last(), Some(&0), "strings are NUL-terminated");
        String::from_utf8(bytes[..bytes.len() - 1].to_vec()).unwrap()
    }

    /// The information structure passed to the (only) handoff.
    pub fn info(&self) -> BootInfo {
        let (registers, _) = self.handoffs.last().expect("no handoff attempted");
        BootInfo::read_from(self.read(registers.ebx)).unwrap()
    }

    pub fn module_list(&self) -> Vec<Module> {
        let Some((count, addr)) = self.info().modules() else {
            return Vec::new();
        };
        let entries = self
            .read(addr)
            .chunks_exact(16)
            .map(|entry| Module::read_from(entry).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), count as usize);
        entries
    }
}

impl AddressMapper for MockPlatform {
    fn map_data(&mut self, data: &[u8], align: u32, fixed: bool) -> Option<TargetAddress> {
        let failed = self
            .fail
            .as_ref()
            .is_some_and(|fail| fail(self.calls.len(), data, fixed));

        let addr = (!failed).then(|| {
            let start = self.next.next_multiple_of(align);
            self.next = start + (data.len() as u32).max(1);
            TargetAddress::new(start).unwrap()
        });

        self.calls.push(MapCall {
            data: data.to_vec(),
            align,
            fixed,
            addr,
        });
        addr
    }
}

impl Firmware for MockPlatform {
    fn memory_map(&mut self) -> Option<Vec<MemoryRegion>> {
        self.regions.clone()
    }

    fn apm_table(&mut self) -> Option<ApmTable> {
        self.apm
    }
}

impl Handoff for MockPlatform {
    type Error = &'static str;

    fn transfer_control(
        &mut self,
        registers: Registers,
        flags: HandoffFlags,
    ) -> Result<Infallible, Self::Error> {
        self.handoffs.push((registers, flags));
        Err("kernel returned")
    }
}
