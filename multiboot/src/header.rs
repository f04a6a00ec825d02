//! Every multiboot-compliant kernel needs to have the multiboot header structure within the first
//! 8K of its binary, aligned on a 32-bit boundary. The bootloader searches for it to find out which
//! features the kernel requires and, optionally, where the image wants to be loaded.
//!
//! Example (kernel side):
//!
//! ```
//! # use multiboot::HeaderBuilder;
//! static MULTIBOOT_HEADER: multiboot::Header = HeaderBuilder::new()
//!     .request_aligned_modules()
//!     .request_memory_map()
//!     .build();
//! ```

use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// The magic number identifying the header.
pub const HEADER_MAGIC: u32 = 0x1bad_b002;

/// The header must be contained completely within the first 8192 bytes of the OS image.
pub const HEADER_SEARCH_LIMIT: usize = 8192;

bitflags! {
    /// Features that the OS image requests or requires of a boot loader. Bits 0-15 indicate
    /// requirements; if the boot loader sees any of these bits set but doesn't understand the flag
    /// or can't fulfill the requirements it indicates for some reason, it must notify the user and
    /// fail to load the OS image. Bits 16-31 indicate optional features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        /// All boot modules must be aligned on page (4KB) boundaries.
        const PAGE_ALIGN_MODULES = 1 << 0;
        /// The `mem_*` fields and the memory map must be provided.
        const MEMORY_INFO = 1 << 1;
        /// Information about the video mode table must be available to the kernel.
        const VIDEO_MODE = 1 << 2;
        /// The load address fields of the header are valid.
        const ADDRESS_FIELDS = 1 << 16;
    }
}

impl HeaderFlags {
    /// Requirement bits (0-15) this loader honours.
    pub const SUPPORTED_REQUIREMENTS: Self = Self::PAGE_ALIGN_MODULES.union(Self::MEMORY_INFO);

    /// Requirement bits (0-15) that are set but not honoured by this loader.
    pub fn unsupported_requirements(self) -> Self {
        Self::from_bits_retain(self.bits() & 0xffff).difference(Self::SUPPORTED_REQUIREMENTS)
    }
}

/// The multiboot header must be present in the first 8KB of every multiboot-compliant kernel image.
/// It is used to indicate to the bootloader which features and information the kernel requires.
#[derive(Debug, Clone, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Header {
    /// The magic number identifying the header, which must be the hexadecimal value 0x1BADB002.
    magic: u32,

    /// The field specifies features that the OS image requests or requires of a boot loader. See
    /// [`HeaderFlags`] for the meaning of the individual bits. All as-yet-undefined bits in the
    /// `flags` word must be set to zero in OS images.
    flags: u32,

    /// The field `checksum` is a 32-bit unsigned value which, when added to the other magic fields
    /// (i.e. `magic` and `flags`), must have a 32-bit unsigned sum of zero.
    checksum: u32,

    /// The load address request fields enabled by flag bit 16 are physical addresses.
    addresses: LoadAddressRequest,

    /// All of the graphics fields are enabled by flag bit 2. They specify the preferred graphics
    /// mode. Note that that is only a recommended mode by the OS image. Boot loader may choose a
    /// different mode if it sees fit.
    graphics: GraphicsRequest,
}

/// Compile time check that Header is of size 48. If the following line throws a size mismatch
/// compile error, then you know that sizeof `Header` is messed up!
const _: [(); 48] = [(); core::mem::size_of::<Header>()];

/// `magic`, `flags` and `checksum`: the part of the header every image has.
#[derive(FromBytes, FromZeroes)]
#[repr(C)]
struct MagicFields {
    magic: u32,
    flags: u32,
    checksum: u32,
}

impl MagicFields {
    fn is_valid(&self) -> bool {
        self.magic == HEADER_MAGIC
            && self
                .magic
                .wrapping_add(self.flags)
                .wrapping_add(self.checksum)
                == 0
    }
}

impl Header {
    /// Search the OS image for a valid multiboot header and return its offset within the image
    /// together with the decoded header. Fields that would extend past the end of the image read
    /// as zero.
    pub fn find(image: &[u8]) -> Option<(usize, Header)> {
        let window = &image[..image.len().min(HEADER_SEARCH_LIMIT)];
        let offset = (0..window.len())
            .step_by(4)
            .find(|&offset| {
                MagicFields::read_from_prefix(&window[offset..])
                    .is_some_and(|fields| fields.is_valid())
            })?;

        let mut raw = [0u8; core::mem::size_of::<Header>()];
        let available = &image[offset..image.len().min(offset + raw.len())];
        raw[..available.len()].copy_from_slice(available);
        Some((offset, Header::read_from(&raw[..])?))
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.flags)
    }

    /// The load address request, if the image asks to be loaded at a fixed address.
    pub fn load_addresses(&self) -> Option<&LoadAddressRequest> {
        self.flags()
            .contains(HeaderFlags::ADDRESS_FIELDS)
            .then_some(&self.addresses)
    }

    /// The preferred graphics mode, if the image requests one.
    pub fn graphics(&self) -> Option<&GraphicsRequest> {
        self.flags()
            .contains(HeaderFlags::VIDEO_MODE)
            .then_some(&self.graphics)
    }
}

/// Optional part of the Multiboot header which includes load and entry addresses that override the
/// values from the ELF header.
#[derive(Debug, Clone, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct LoadAddressRequest {
    /// Contains the address corresponding to the beginning of the Multiboot header, the physical
    /// memory location at which the magic value is supposed to be loaded. This field serves to
    /// synchronize the mapping between OS image offsets and physical memory addresses.
    header_addr: u32,

    /// Contains the physical address of the beginning of the text segment. The offset in the OS
    /// image file at which to start loading is defined by the offset at which the header was
    /// found, minus (header_addr - load_addr). load_addr must be less than or equal to
    /// header_addr.
    load_addr: u32,

    /// Contains the physical address of the end of the data segment. (load_end_addr - load_addr)
    /// specifies how much data to load. If this field is zero, the boot loader assumes that the
    /// text and data segments occupy the whole OS image file.
    load_end_addr: u32,

    /// Contains the physical address of the end of the bss segment. The boot loader initializes
    /// this area to zero, and reserves the memory it occupies to avoid placing boot modules and
    /// other data relevant to the operating system in that area. If this field is zero, the boot
    /// loader assumes that no bss segment is present.
    bss_end_addr: u32,

    /// The physical address to which the boot loader should jump in order to start running the
    /// operating system.
    entry_addr: u32,
}

impl LoadAddressRequest {
    pub const fn new(
        header_addr: u32,
        load_addr: u32,
        load_end_addr: u32,
        bss_end_addr: u32,
        entry_addr: u32,
    ) -> Self {
        Self {
            header_addr,
            load_addr,
            load_end_addr,
            bss_end_addr,
            entry_addr,
        }
    }

    pub fn header_addr(&self) -> u32 {
        self.header_addr
    }

    pub fn load_addr(&self) -> u32 {
        self.load_addr
    }

    pub fn load_end_addr(&self) -> u32 {
        self.load_end_addr
    }

    pub fn bss_end_addr(&self) -> u32 {
        self.bss_end_addr
    }

    pub fn entry_addr(&self) -> u32 {
        self.entry_addr
    }
}

/// Optional part of the Multiboot header which requests either a graphical framebuffer or a text
/// mode console from the bootloader.
#[derive(Debug, Clone, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct GraphicsRequest {
    /// Contains 0 for linear graphics mode or 1 for EGA-standard text mode. Everything else is
    /// reserved for future expansion.
    mode: u32,

    /// Contains the number of the columns. The value zero indicates that the OS image has no
    /// preference.
    width: u32,

    /// Contains the number of the lines. The value zero indicates that the OS image has no
    /// preference.
    height: u32,

    /// Contains the number of bits per pixel in a graphics mode, and zero in a text mode.
    depth: u32,
}

impl GraphicsRequest {
    /// EGA text mode, no preference on the dimensions.
    pub const fn text_mode() -> Self {
        Self {
            mode: 1,
            width: 0,
            height: 0,
            depth: 0,
        }
    }

    pub fn is_text_mode(&self) -> bool {
        self.mode == 1
    }
}

/// Builder struct to construct a valid multiboot header. Used by kernels to embed the header and
/// by this crate's users to produce test images.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeaderBuilder {
    flags: u32,
    addresses: Option<LoadAddressRequest>,
}

impl HeaderBuilder {
    /// Create a new header builder with default flags. This could be replaced with
    /// Default::default() if it was const. But it isn't so please use new() if you want a const
    /// object.
    pub const fn new() -> Self {
        Self {
            flags: 0,
            addresses: None,
        }
    }

    /// Requests that any modules loaded by the bootloader be aligned on page boundaries (4K).
    pub const fn request_aligned_modules(self) -> Self {
        Self {
            flags: self.flags | HeaderFlags::PAGE_ALIGN_MODULES.bits(),
            ..self
        }
    }

    /// Requests a memory map from the bootloader by setting the corresponding header flag.
    pub const fn request_memory_map(self) -> Self {
        Self {
            flags: self.flags | HeaderFlags::MEMORY_INFO.bits(),
            ..self
        }
    }

    /// Ask the bootloader to load the image at the given physical addresses instead of the ones
    /// found in the ELF header.
    pub const fn request_load_addresses(self, addresses: LoadAddressRequest) -> Self {
        Self {
            flags: self.flags | HeaderFlags::ADDRESS_FIELDS.bits(),
            addresses: Some(addresses),
        }
    }

    /// Build a valid multiboot header using the selected flags and compute the header checksum.
    pub const fn build(self) -> Header {
        // The `magic`, `flags` and `checksum` fields must have an unsigned sum of zero.
        Header {
            magic: HEADER_MAGIC,
            flags: self.flags,
            checksum: HEADER_MAGIC.wrapping_add(self.flags).wrapping_neg(),
            addresses: match self.addresses {
                Some(addresses) => addresses,
                None => LoadAddressRequest::new(0, 0, 0, 0, 0),
            },
            graphics: GraphicsRequest::text_mode(),
        }
    }
}
