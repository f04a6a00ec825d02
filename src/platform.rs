//! Collaborators of the loader. The loader decides *what* goes where and in which order; these
//! traits are how it gets files, target memory, firmware tables and, finally, the kernel running.

use alloc::vec::Vec;
use core::convert::Infallible;
use core::fmt::Display;

use bitflags::bitflags;
use multiboot::ApmTable;
use types::{mem::MemoryRegion, TargetAddress};

/// Alignment used for NUL-terminated strings placed in target memory.
pub const STRING_ALIGN: u32 = 1;

/// Turns a path into the raw (already decompressed) bytes of the named resource.
pub trait FileLoader {
    type Error: Display;

    fn load(&mut self, path: &str) -> Result<Vec<u8>, Self::Error>;
}

/// Reserves memory in the target address space and copies a buffer into it.
///
/// Placement is monotonic: there is no way to give memory back. `fixed` is only ever set for the
/// primary image; it allows the mapper to honour the image's own load address directives instead
/// of picking a free block.
pub trait AddressMapper {
    /// Copy `data` into target memory at an address aligned to `align` (a power of two) and return
    /// that address, or `None` if no suitable block could be reserved.
    fn map_data(&mut self, data: &[u8], align: u32, fixed: bool) -> Option<TargetAddress>;

    /// Copy `text` into target memory as a C string.
    fn map_string(&mut self, text: &str) -> Option<TargetAddress> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(text.len() + 1).ok()?;
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.map_data(&bytes, STRING_ALIGN, false)
    }
}

/// Firmware tables handed on to the kernel. Both sources are optional; a platform that cannot
/// provide them simply leaves the corresponding multiboot fields unset.
pub trait Firmware {
    /// The physical memory map of the machine.
    fn memory_map(&mut self) -> Option<Vec<MemoryRegion>> {
        None
    }

    /// The APM BIOS interface, if there is one.
    fn apm_table(&mut self) -> Option<ApmTable> {
        None
    }
}

/// Register state the kernel expects when it starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Always [`multiboot::BOOTLOADER_MAGIC`].
    pub eax: u32,
    /// Target address of the multiboot information structure.
    pub ebx: TargetAddress,
}

impl Registers {
    pub fn new(info: TargetAddress) -> Self {
        Self {
            eax: multiboot::BOOTLOADER_MAGIC,
            ebx: info,
        }
    }
}

bitflags! {
    /// Parts of the network boot environment to leave alive for the kernel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HandoffFlags: u32 {
        const KEEP_PXE = 1 << 0;
        const KEEP_UNDI = 1 << 1;
    }
}

/// Switches the processor into the state required by multiboot and jumps into the kernel.
pub trait Handoff {
    type Error: Display;

    /// Never returns on success, which `Infallible` encodes: the only value this can produce is
    /// the reason why the kernel could not be started.
    fn transfer_control(
        &mut self,
        registers: Registers,
        flags: HandoffFlags,
    ) -> Result<Infallible, Self::Error>;
}

/// Everything the loader needs from the machine it boots.
pub trait Platform: AddressMapper + Firmware + Handoff {}

impl<T: AddressMapper + Firmware + Handoff> Platform for T {}

impl<T: FileLoader + ?Sized> FileLoader for &mut T {
    type Error = T::Error;

    fn load(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        (**self).load(path)
    }
}

impl<T: AddressMapper + ?Sized> AddressMapper for &mut T {
    fn map_data(&mut self, data: &[u8], align: u32, fixed: bool) -> Option<TargetAddress> {
        (**self).map_data(data, align, fixed)
    }

    fn map_string(&mut self, text: &str) -> Option<TargetAddress> {
        (**self).map_string(text)
    }
}
