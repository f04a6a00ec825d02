//! Small value types shared between the loader and the multiboot wire format: target-space
//! addresses, physical memory regions and human readable byte sizes.

#![no_std]

pub mod addr;
pub mod fmt;
pub mod mem;

pub use addr::TargetAddress;
