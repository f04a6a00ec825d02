//! Placement of the primary (kernel) image.
//!
//! The primary image may carry its own load address directives (the address fields of its
//! multiboot header, or its ELF program headers), which the mapper interprets. Because those are
//! fixed addresses, this must be the very first placement: anything mapped before it could end up
//! where the kernel has to go.

use alloc::format;

use log::{debug, info, warn};
use multiboot::Header;
use types::{fmt::Fmt, TargetAddress};

use crate::args::ModuleDescriptor;
use crate::error::{Error, MappingCause};
use crate::platform::AddressMapper;

/// Alignment requested for the primary image when it does not ask for a fixed address.
pub const IMAGE_ALIGN: u32 = 4096;

/// Map the primary image, allowing the mapper to place it at the addresses it asks for. No module
/// list entry is produced: the kernel is not one of its own modules.
pub fn place_primary_image<M>(
    image: &ModuleDescriptor,
    mapper: &mut M,
) -> Result<TargetAddress, Error>
where
    M: AddressMapper + ?Sized,
{
    inspect_header(image);

    let addr = mapper
        .map_data(&image.data, IMAGE_ALIGN, true)
        .ok_or_else(|| {
            Error::mapping(
                format!("primary image {}", image.path),
                MappingCause::FixedAddress,
            )
        })?;

    info!(
        "{}: {} mapped @ {addr}",
        image.path,
        Fmt::<u8>::from(image.len())
    );
    Ok(addr)
}

/// Report what the image's multiboot header asks of us. Nothing here is fatal: the mapper has the
/// final word on whether the image can be placed.
fn inspect_header(image: &ModuleDescriptor) {
    let Some((offset, header)) = Header::find(&image.data) else {
        warn!("{}: no multiboot header in the first 8 KiB", image.path);
        return;
    };

    debug!(
        "{}: multiboot header @ {offset:#x}, flags {:?}",
        image.path,
        header.flags()
    );

    let unsupported = header.flags().unsupported_requirements();
    if !unsupported.is_empty() {
        warn!(
            "{}: kernel requires unsupported features {unsupported:?}",
            image.path
        );
    }

    if let Some(graphics) = header.graphics() {
        let mode = if graphics.is_text_mode() {
            "text mode"
        } else {
            "linear framebuffer"
        };
        warn!("{}: requested {mode} is not set up", image.path);
    }

    if let Some(addresses) = header.load_addresses() {
        debug!(
            "{}: requests load @ {:#x}..{:#x}, bss end {:#x}, entry {:#x}",
            image.path,
            addresses.load_addr(),
            addresses.load_end_addr(),
            addresses.bss_end_addr(),
            addresses.entry_addr()
        );
    }
}
