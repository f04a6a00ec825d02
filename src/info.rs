//! Assembly of the multiboot information structure.
//!
//! The structure is built in loader memory, filled in by every stage that places something the
//! kernel needs to find, and mapped into target memory last, once nothing about it can change
//! anymore. Its target address is what the kernel receives in `ebx`.

use alloc::format;

use log::debug;
use multiboot::BootInfo;
use types::TargetAddress;
use zerocopy::AsBytes;

use crate::args::ModuleDescriptor;
use crate::boot::LoaderOptions;
use crate::enrich;
use crate::error::{Error, MappingCause};
use crate::platform::{AddressMapper, Firmware};

pub const INFO_ALIGN: u32 = 4;

/// Map the primary image's command line, if it has one, and record it in `info`.
pub fn map_command_line<M>(
    primary: &ModuleDescriptor,
    mapper: &mut M,
    info: &mut BootInfo,
) -> Result<(), Error>
where
    M: AddressMapper + ?Sized,
{
    let Some(cmdline) = primary.cmdline.as_deref() else {
        return Ok(());
    };

    let addr = mapper.map_string(cmdline).ok_or_else(|| {
        Error::mapping(
            format!("command line of {}", primary.path),
            MappingCause::Fragmentation,
        )
    })?;
    debug!("Command line \"{cmdline}\" @ {addr}");
    info.set_command_line(addr);
    Ok(())
}

/// Copy the finished structure into target memory.
pub fn map_info<M>(info: &BootInfo, mapper: &mut M) -> Result<TargetAddress, Error>
where
    M: AddressMapper + ?Sized,
{
    let addr = mapper
        .map_data(info.as_bytes(), INFO_ALIGN, false)
        .ok_or_else(|| Error::mapping("info structure", MappingCause::Fragmentation))?;
    debug!("Multiboot info @ {addr}: {info:?}");
    Ok(addr)
}

/// Fill in everything that is not about modules (command line, memory map, APM table, boot
/// loader name) and map the structure. Returns the address to hand to the kernel.
pub fn assemble_info<P>(
    primary: &ModuleDescriptor,
    platform: &mut P,
    options: &LoaderOptions,
    info: &mut BootInfo,
) -> Result<TargetAddress, Error>
where
    P: AddressMapper + Firmware + ?Sized,
{
    map_command_line(primary, platform, info)?;

    enrich::memory_map(platform, info);
    enrich::apm_table(platform, info);
    enrich::boot_loader_name(platform, options.boot_loader_name, info);

    map_info(info, platform)
}
