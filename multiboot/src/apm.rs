use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// The APM BIOS interface description referenced by the `apm_table` field of the information
/// structure (flag bit 10). The values are the ones returned by the APM BIOS connect calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct ApmTable {
    /// APM version number.
    pub version: u16,
    /// Protected mode 32-bit code segment.
    pub cseg: u16,
    /// Offset of the entry point.
    pub offset: u32,
    /// Protected mode 16-bit code segment.
    pub cseg_16: u16,
    /// Protected mode 16-bit data segment.
    pub dseg: u16,
    /// Flags as returned by the APM BIOS.
    pub flags: u16,
    /// Length of the 32-bit code segment.
    pub cseg_len: u16,
    /// Length of the 16-bit code segment.
    pub cseg_16_len: u16,
    /// Length of the data segment.
    pub dseg_len: u16,
}

const _: [(); 20] = [(); core::mem::size_of::<ApmTable>()];
