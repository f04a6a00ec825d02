//! This crate contains the structures used to implement the multiboot boot protocol as defined in
//! the corresponding specification:
//!
//! https://www.gnu.org/software/grub/manual/multiboot/multiboot.html (version 0.6.96)
//!
//! It is written from the bootloader's point of view: the OS image [`Header`] is located and
//! validated inside a kernel image, and the [`BootInfo`] structure, the [`Module`] list, the memory
//! map and the [`ApmTable`] are built in loader memory and serialized bit-exact (little-endian,
//! `repr(C)`) before they are copied into the address space of the machine being booted.

#![no_std]

mod apm;
mod header;
mod info;
pub mod mmap;
mod module;

pub use apm::*;
pub use header::*;
pub use info::*;
pub use mmap::MemoryMapEntry;
pub use module::*;

/// Value the bootloader must leave in `eax` when it jumps into a multiboot kernel.
pub const BOOTLOADER_MAGIC: u32 = 0x2bad_b002;
