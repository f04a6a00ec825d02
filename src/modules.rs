//! Placement of the auxiliary modules and of the module list describing them.

use alloc::format;
use alloc::vec::Vec;

use log::debug;
use multiboot::{BootInfo, Module};
use types::TargetAddress;
use zerocopy::AsBytes;

use crate::args::ModuleDescriptor;
use crate::error::{Error, MappingCause};
use crate::platform::AddressMapper;

/// Modules are page aligned, which also satisfies kernels that set the "aligned modules" header
/// flag.
pub const MODULE_ALIGN: u32 = 4096;

pub const MODULE_LIST_ALIGN: u32 = 16;

/// Map one module's command line (if any) and payload, and describe the result as a module list
/// entry.
pub fn map_module<M>(module: &ModuleDescriptor, mapper: &mut M) -> Result<Module, Error>
where
    M: AddressMapper + ?Sized,
{
    let overflow = || {
        Error::mapping(
            format!("module {}", module.path),
            MappingCause::AddressOverflow,
        )
    };
    let len = u32::try_from(module.len()).map_err(|_| overflow())?;

    let string = module
        .cmdline
        .as_deref()
        .map(|cmdline| {
            mapper.map_string(cmdline).ok_or_else(|| {
                Error::mapping(
                    format!("command line of module {}", module.path),
                    MappingCause::Fragmentation,
                )
            })
        })
        .transpose()?;

    let start = mapper
        .map_data(&module.data, MODULE_ALIGN, false)
        .ok_or_else(|| {
            Error::mapping(
                format!("module {}", module.path),
                MappingCause::Fragmentation,
            )
        })?;
    let end = start.checked_add(len).ok_or_else(overflow)?;

    debug!(
        "{}: mapped @ {start}..{end}, cmdline @ {}",
        module.path,
        string.map_or(0, TargetAddress::as_u32)
    );
    Ok(Module::new(start, end, string))
}

/// Map all auxiliary modules in argument order. The first failure aborts; whatever was placed
/// before stays placed.
pub fn map_modules<M>(modules: &[ModuleDescriptor], mapper: &mut M) -> Result<Vec<Module>, Error>
where
    M: AddressMapper + ?Sized,
{
    let mut entries = Vec::new();
    entries.try_reserve_exact(modules.len())?;
    for module in modules {
        entries.push(map_module(module, mapper)?);
    }
    Ok(entries)
}

/// Map the finished module list as one contiguous block and point the information structure at
/// it. Without auxiliary modules nothing is mapped and the `mods` fields stay unset.
pub fn map_module_list<M>(
    entries: &[Module],
    mapper: &mut M,
    info: &mut BootInfo,
) -> Result<(), Error>
where
    M: AddressMapper + ?Sized,
{
    if entries.is_empty() {
        return Ok(());
    }

    let count = u32::try_from(entries.len())
        .map_err(|_| Error::mapping("module list", MappingCause::AddressOverflow))?;
    let addr = mapper
        .map_data(entries.as_bytes(), MODULE_LIST_ALIGN, false)
        .ok_or_else(|| Error::mapping("module list", MappingCause::Fragmentation))?;

    debug!("Module list ({count} entries) @ {addr}");
    info.set_modules(count, addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;
    use multiboot::InfoFlags;
    use pretty_assertions::assert_eq;

    fn module(path: &str, len: usize, cmdline: Option<&str>) -> ModuleDescriptor {
        ModuleDescriptor {
            path: path.into(),
            data: (0..len).map(|byte| byte as u8).collect(),
            cmdline: cmdline.map(Into::into),
        }
    }

    #[test]
    fn entry_bounds_match_payload() {
        let mut platform = MockPlatform::default();
        let modules = [module("initrd.img", 5000, None), module("empty.img", 0, None)];
        let entries = map_modules(&modules, &mut platform).unwrap();

        for (entry, module) in entries.iter().zip(&modules) {
            let start = TargetAddress::new(entry.start()).unwrap();
            assert_eq!(entry.end(), entry.start() + module.len() as u32);
            assert!(start.is_aligned(MODULE_ALIGN));
            assert_eq!(entry.reserved(), 0);
            assert_eq!(
                platform.read(start),
                &module.data[..]
            );
        }
    }

    #[test]
    fn command_line_is_mapped_before_payload() {
        let mut platform = MockPlatform::default();
        let entry = map_module(&module("mod1.img", 10, Some("foo bar")), &mut platform).unwrap();

        assert_eq!(platform.calls.len(), 2);
        assert_eq!(platform.calls[0].data, b"foo bar\0");
        assert_eq!(platform.calls[0].align, 1);
        assert!(!platform.calls[0].fixed);
        assert_eq!(platform.calls[1].align, MODULE_ALIGN);
        assert!(!platform.calls[1].fixed);
        assert_eq!(platform.string_at(entry.string().unwrap()), "foo bar");
    }

    #[test]
    fn module_without_command_line() {
        let mut platform = MockPlatform::default();
        let entry = map_module(&module("initrd.img", 10, None), &mut platform).unwrap();
        assert_eq!(entry.string(), None);
        assert_eq!(platform.calls.len(), 1);
    }

    #[test]
    fn first_failure_aborts() {
        let mut platform = MockPlatform::default().failing(|index, _, _| index == 1);
        let modules = [
            module("mod1.img", 10, None),
            module("mod2.img", 10, None),
            module("mod3.img", 10, None),
        ];

        assert_eq!(
            map_modules(&modules, &mut platform),
            Err(Error::MappingFailure {
                what: "module mod2.img".into(),
                cause: MappingCause::Fragmentation,
            })
        );
        assert_eq!(platform.calls.len(), 2);
    }

    #[test]
    fn command_line_failure_is_fatal() {
        let mut platform = MockPlatform::default().failing(|_, data, _| data.ends_with(b"\0"));
        assert!(matches!(
            map_module(&module("mod1.img", 10, Some("x")), &mut platform),
            Err(Error::MappingFailure {
                cause: MappingCause::Fragmentation,
                ..
            })
        ));
    }

    #[test]
    fn module_list_is_one_block() {
        let mut platform = MockPlatform::default();
        let entries = map_modules(
            &[module("mod1.img", 10, Some("a")), module("mod2.img", 20, None)],
            &mut platform,
        )
        .unwrap();

        let mut info = BootInfo::new();
        map_module_list(&entries, &mut platform, &mut info).unwrap();

        let (count, addr) = info.modules().unwrap();
        assert_eq!(count, 2);
        assert!(info.flags().contains(InfoFlags::MODS));

        let list = platform.calls.last().unwrap();
        assert_eq!(list.align, MODULE_LIST_ALIGN);
        assert_eq!(list.data.len(), 2 * 16);
        assert_eq!(platform.read(addr), entries.as_bytes());
    }

    #[test]
    fn no_modules_no_list() {
        let mut platform = MockPlatform::default();
        let mut info = BootInfo::new();
        map_module_list(&[], &mut platform, &mut info).unwrap();

        assert!(platform.calls.is_empty());
        assert_eq!(info.mods_count(), 0);
        assert!(!info.flags().contains(InfoFlags::MODS));
    }

    #[test]
    fn module_list_failure() {
        let mut platform = MockPlatform::default().failing(|_, data, _| data.len() == 16);
        let entry = Module::new(
            TargetAddress::new(0x1000).unwrap(),
            TargetAddress::new(0x1001).unwrap(),
            None,
        );
        let mut info = BootInfo::new();

        assert_eq!(
            map_module_list(&[entry], &mut platform, &mut info),
            Err(Error::MappingFailure {
                what: "module list".into(),
                cause: MappingCause::Fragmentation,
            })
        );
        assert_eq!(info.modules(), None);
    }
}
