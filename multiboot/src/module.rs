use types::TargetAddress;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// An entry in the bootloader-provided module list. The kernel finds the list through the
/// `mods_addr` field of the information structure and parses it by offset, so the field order and
/// size (16 bytes) are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Module {
    /// Start address of the module.
    mod_start: u32,

    /// End address of the module.
    mod_end: u32,

    /// The `string` field provides an arbitrary zero-terminated ASCII string to be associated with
    /// that particular module. It may also be null if there is no associated string.
    string: u32,

    /// Must be ignored by the OS.
    reserved: u32,
}

const _: [(); 16] = [(); core::mem::size_of::<Module>()];

impl Module {
    pub fn new(start: TargetAddress, end: TargetAddress, string: Option<TargetAddress>) -> Self {
        debug_assert!(start <= end);
        Self {
            mod_start: start.as_u32(),
            mod_end: end.as_u32(),
            string: TargetAddress::to_wire(string),
            reserved: 0,
        }
    }

    pub fn start(&self) -> u32 {
        self.mod_start
    }

    pub fn end(&self) -> u32 {
        self.mod_end
    }

    /// Size of the module payload in bytes.
    pub fn len(&self) -> u32 {
        self.mod_end - self.mod_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the module's command line, if it has one.
    pub fn string(&self) -> Option<TargetAddress> {
        TargetAddress::new(self.string)
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }
}
