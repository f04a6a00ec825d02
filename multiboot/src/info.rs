use bitflags::bitflags;
use types::TargetAddress;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

bitflags! {
    /// Indicates the presence and validity of the other fields in the Multiboot information
    /// structure. All as-yet-undefined bits must be set to zero by the boot loader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InfoFlags: u32 {
        const MEMORY = 1 << 0;
        const BOOT_DEVICE = 1 << 1;
        const CMDLINE = 1 << 2;
        const MODS = 1 << 3;
        const AOUT_SYMS = 1 << 4;
        const ELF_SHDR = 1 << 5;
        const MEM_MAP = 1 << 6;
        const DRIVE_INFO = 1 << 7;
        const CONFIG_TABLE = 1 << 8;
        const BOOT_LOADER_NAME = 1 << 9;
        const APM_TABLE = 1 << 10;
        const VBE_INFO = 1 << 11;
        const FRAMEBUFFER_INFO = 1 << 12;
    }
}

/// When the bootloader transfers control to the kernel, the physical address of an instance of
/// this struct is passed along in `ebx`. It contains information vital to the kernel startup
/// procedure. The loader builds it in its own memory, fills it field by field through the setters
/// below (each of which also sets the corresponding flag bit) and copies it into target memory as
/// a whole.
#[derive(Clone, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct BootInfo {
    /// Indicates the presence and validity of other fields in the Multiboot information structure.
    /// Any set bits that the operating system does not understand should be ignored.
    flags: u32,

    /// If bit 0 in the `flags` word is set, then the `mem_lower` field is valid. `mem_lower`
    /// indicates the amount of lower memory available in kilobytes. Lower memory starts at
    /// address 0. The maximum possible value for lower memory is 640 kilobytes.
    mem_lower: u32,

    /// If bit 0 in the `flags` word is set, then the `mem_upper` field is valid. `mem_upper`
    /// indicates the amount of upper memory in kilobytes. Upper memory starts at address 1
    /// megabyte. The value returned for upper memory is maximally the address of the first
    /// upper memory hole minus 1 megabyte. It is not guaranteed to be this value.
    mem_upper: u32,

    /// If bit 1 in the `flags` word is set, then the `boot_device` field is valid, and indicates
    /// which BIOS disk device the boot loader loaded the OS image from. Never set by this loader.
    boot_device: u32,

    /// If bit 2 of the `flags` word is set, the `cmdline` field is valid, and contains the
    /// physical address of the command line to be passed to the kernel. The command line is a
    /// normal C-style zero-terminated string.
    cmdline: u32,

    /// If bit 3 of `flags` is set, then the `mods` fields indicate to the kernel what boot
    /// modules were loaded along with the kernel image, and where they can be found. `mods_count`
    /// contains the number of modules loaded, it may be zero, indicating no boot modules were
    /// loaded, even if bit 3 of `flags` is set.
    mods_count: u32,

    /// If bit 3 of `flags` is set, `mods_addr` contains the physical address of the first module
    /// structure. For details on each module's structure see the [`Module`](crate::Module)
    /// structure.
    mods_addr: u32,

    /// Symbol table information (bits 4 and 5). Never set by this loader.
    syms: [u32; 4],

    /// If bit 6 in the `flags` word is set, then the `mmap_length` field is valid and contains the
    /// total size of the memory map buffer.
    mmap_length: u32,

    /// If bit 6 in the `flags` word is set, `mmap_addr` holds the start of a buffer containing a
    /// memory map of the machine. The buffer consists of one or more
    /// [`MemoryMapEntry`](crate::MemoryMapEntry) size/structure pairs.
    mmap_addr: u32,

    drives_length: u32,
    drives_addr: u32,
    config_table: u32,

    /// If bit 9 in the `flags` is set, the `boot_loader_name` field is valid, and contains the
    /// physical address of the name of a boot loader booting the kernel.
    boot_loader_name: u32,

    /// If bit 10 in the `flags` word is set, the `apm_table` field is valid, and contains the
    /// physical address of an [`ApmTable`](crate::ApmTable).
    apm_table: u32,

    vbe_control_info: u32,
    vbe_mode_info: u32,
    vbe_mode: u16,
    vbe_interface_seg: u16,
    vbe_interface_off: u16,
    vbe_interface_len: u16,
}

/// Compile time check of the wire size; kernels locate every field by offset.
const _: [(); 88] = [(); core::mem::size_of::<BootInfo>()];

impl Default for BootInfo {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl BootInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> InfoFlags {
        InfoFlags::from_bits_retain(self.flags)
    }

    fn insert_flag(&mut self, flag: InfoFlags) {
        self.flags |= flag.bits();
    }

    /// Amount of lower and upper memory in KiB (flag bit 0).
    pub fn set_memory_bounds(&mut self, mem_lower: u32, mem_upper: u32) {
        self.mem_lower = mem_lower;
        self.mem_upper = mem_upper;
        self.insert_flag(InfoFlags::MEMORY);
    }

    pub fn memory_bounds(&self) -> Option<(u32, u32)> {
        self.flags()
            .contains(InfoFlags::MEMORY)
            .then_some((self.mem_lower, self.mem_upper))
    }

    /// Address of the kernel command line (flag bit 2).
    pub fn set_command_line(&mut self, cmdline: TargetAddress) {
        self.cmdline = cmdline.as_u32();
        self.insert_flag(InfoFlags::CMDLINE);
    }

    pub fn command_line(&self) -> Option<TargetAddress> {
        self.flags()
            .contains(InfoFlags::CMDLINE)
            .then(|| TargetAddress::new(self.cmdline))
            .flatten()
    }

    /// Number and address of the module list entries (flag bit 3).
    pub fn set_modules(&mut self, count: u32, mods_addr: TargetAddress) {
        self.mods_count = count;
        self.mods_addr = mods_addr.as_u32();
        self.insert_flag(InfoFlags::MODS);
    }

    pub fn mods_count(&self) -> u32 {
        self.mods_count
    }

    pub fn modules(&self) -> Option<(u32, TargetAddress)> {
        self.flags()
            .contains(InfoFlags::MODS)
            .then(|| TargetAddress::new(self.mods_addr).map(|addr| (self.mods_count, addr)))
            .flatten()
    }

    /// Address and byte length of the memory map buffer (flag bit 6).
    pub fn set_memory_map(&mut self, mmap_addr: TargetAddress, mmap_length: u32) {
        self.mmap_addr = mmap_addr.as_u32();
        self.mmap_length = mmap_length;
        self.insert_flag(InfoFlags::MEM_MAP);
    }

    pub fn memory_map(&self) -> Option<(TargetAddress, u32)> {
        self.flags()
            .contains(InfoFlags::MEM_MAP)
            .then(|| TargetAddress::new(self.mmap_addr).map(|addr| (addr, self.mmap_length)))
            .flatten()
    }

    /// Address of the boot loader name string (flag bit 9).
    pub fn set_boot_loader_name(&mut self, name: TargetAddress) {
        self.boot_loader_name = name.as_u32();
        self.insert_flag(InfoFlags::BOOT_LOADER_NAME);
    }

    pub fn boot_loader_name(&self) -> Option<TargetAddress> {
        self.flags()
            .contains(InfoFlags::BOOT_LOADER_NAME)
            .then(|| TargetAddress::new(self.boot_loader_name))
            .flatten()
    }

    /// Address of the APM table (flag bit 10).
    pub fn set_apm_table(&mut self, table: TargetAddress) {
        self.apm_table = table.as_u32();
        self.insert_flag(InfoFlags::APM_TABLE);
    }

    pub fn apm_table(&self) -> Option<TargetAddress> {
        self.flags()
            .contains(InfoFlags::APM_TABLE)
            .then(|| TargetAddress::new(self.apm_table))
            .flatten()
    }
}

impl core::fmt::Debug for BootInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Multiboot")
            .field("flags", &self.flags())
            .field("mem", &self.memory_bounds())
            .field("cmdline", &self.command_line())
            .field("mods", &self.modules())
            .field("mmap", &self.memory_map())
            .field("boot_loader_name", &self.boot_loader_name())
            .field("apm_table", &self.apm_table())
            .finish_non_exhaustive()
    }
}
