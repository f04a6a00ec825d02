use core::fmt::{Debug, Display, Formatter, Result};
use core::num::NonZeroU32;

/// An address in the physical address space of the machine being booted.
///
/// The loader never dereferences these: they are handed out by the address mapper, recorded in
/// the multiboot structures and forwarded to the kernel. Multiboot is a 32-bit protocol, so every
/// address fits in a `u32`. Zero is not a valid target address; it is the wire encoding of "no
/// address", which lets `Option<TargetAddress>` map onto the wire format one to one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TargetAddress(NonZeroU32);

impl TargetAddress {
    /// Returns `None` for the null address.
    pub const fn new(addr: u32) -> Option<Self> {
        match NonZeroU32::new(addr) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }

    /// Offset this address by `len` bytes, failing if the result leaves the 32-bit address space.
    pub fn checked_add(self, len: u32) -> Option<Self> {
        self.0.checked_add(len).map(Self)
    }

    pub fn is_aligned(self, align: u32) -> bool {
        debug_assert!(align.is_power_of_two());
        self.as_u32() & (align - 1) == 0
    }

    /// Wire encoding of an optional address.
    pub fn to_wire(addr: Option<Self>) -> u32 {
        addr.map_or(0, Self::as_u32)
    }
}

impl From<TargetAddress> for u32 {
    fn from(addr: TargetAddress) -> Self {
        addr.as_u32()
    }
}

impl From<TargetAddress> for u64 {
    fn from(addr: TargetAddress) -> Self {
        addr.as_u32().into()
    }
}

impl Display for TargetAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:#010x}", self.as_u32())
    }
}

impl Debug for TargetAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "TargetAddress({self})")
    }
}
