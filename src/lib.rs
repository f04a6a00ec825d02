//! Multiboot kernel and module loader.
//!
//! Given a primary kernel image and any number of auxiliary modules, each optionally followed by
//! its own command line, the loader copies everything into the physical address space of the
//! machine being booted, describes it to the kernel through the multiboot information structure
//! and finally hands control to the kernel:
//!
//! ```text
//! mboot <kernel> [args...] [--- <module> [args...]]...
//! ```
//!
//! The loader itself never touches target memory. Everything that depends on the environment it
//! runs in (reading files, reserving and filling target memory, querying the firmware, jumping
//! into the kernel) is reached through the traits in [`platform`]. Placement is strictly ordered:
//! the primary image may demand fixed addresses, so it is placed before anything else.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod args;
pub mod boot;
mod enrich;
pub mod error;
pub mod image;
pub mod info;
pub mod modules;
pub mod platform;

#[cfg(test)]
mod testing;

pub use boot::{Fatal, Loader, LoaderOptions, Stage, Step};
pub use error::{Error, MappingCause};
pub use platform::{AddressMapper, FileLoader, Firmware, Handoff, HandoffFlags, Platform, Registers};
pub use types::TargetAddress;
