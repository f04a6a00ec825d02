//! The load sequence, from the command line to the jump into the kernel.
//!
//! ```text
//! Parsing -> PrimaryPlaced -> AuxPlaced -> InfoAssembled -> HandedOff
//!    \____________\_______________\______________\______________\____> Failed
//! ```
//!
//! Every transition happens only if the stage before it succeeded. Any error moves the loader to
//! `Failed`, which is terminal: target memory consumed so far is not given back, and running the
//! sequence again is not safe.

use core::convert::Infallible;
use core::fmt::{Display, Formatter};

use alloc::string::ToString;
use log::debug;
use multiboot::BootInfo;

use crate::args;
use crate::error::Error;
use crate::image;
use crate::info;
use crate::modules;
use crate::platform::{FileLoader, HandoffFlags, Platform, Registers};

/// Compile-time configuration of the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Leave the PXE and UNDI network stacks in place for the kernel.
    pub keep_pxe: bool,
    /// Passed to the kernel in the `boot_loader_name` field. `None` leaves the field unset.
    pub boot_loader_name: Option<&'static str>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            keep_pxe: false,
            boot_loader_name: Some(concat!("mboot ", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl LoaderOptions {
    pub fn handoff_flags(&self) -> HandoffFlags {
        if self.keep_pxe {
            HandoffFlags::KEEP_PXE | HandoffFlags::KEEP_UNDI
        } else {
            HandoffFlags::empty()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Splitting the arguments and loading files.
    Parsing,
    /// The primary image is in place.
    PrimaryPlaced,
    /// All auxiliary modules are in place.
    AuxPlaced,
    /// The module list and the information structure are in place.
    InfoAssembled,
    /// Control was passed to the kernel.
    HandedOff,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Parsing => "parsing",
            Self::PrimaryPlaced => "primary image placed",
            Self::AuxPlaced => "modules placed",
            Self::InfoAssembled => "info structure assembled",
            Self::HandedOff => "handed off",
            Self::Failed => "failed",
        })
    }
}

/// The part of the load sequence the loader is working on. Each step, when it succeeds, moves the
/// loader to the next [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Parsing,
    PrimaryPlacement,
    ModulePlacement,
    InfoAssembly,
    Handoff,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Parsing => "parsing",
            Self::PrimaryPlacement => "primary image placement",
            Self::ModulePlacement => "module placement",
            Self::InfoAssembly => "info structure assembly",
            Self::Handoff => "handoff",
        })
    }
}

/// Why and where a load sequence was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal {
    /// The step that failed.
    pub step: Step,
    pub error: Error,
}

impl Display for Fatal {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (stage: {})", self.error, self.step)
    }
}

impl core::error::Error for Fatal {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs one load sequence with the given file source and platform.
pub struct Loader<L, P> {
    files: L,
    platform: P,
    options: LoaderOptions,
    stage: Stage,
    step: Step,
}

impl<L: FileLoader, P: Platform> Loader<L, P> {
    pub fn new(files: L, platform: P) -> Self {
        Self {
            files,
            platform,
            options: LoaderOptions::default(),
            stage: Stage::Parsing,
            step: Step::Parsing,
        }
    }

    pub fn with_options(self, options: LoaderOptions) -> Self {
        Self { options, ..self }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn files(&self) -> &L {
        &self.files
    }

    /// Load and boot the kernel described by `args`. Only ever returns on failure.
    pub fn boot<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Infallible, Fatal> {
        match self.run(args) {
            Ok(never) => match never {},
            Err(error) => {
                self.stage = Stage::Failed;
                Err(Fatal {
                    step: self.step,
                    error,
                })
            }
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn attempt(&mut self, step: Step) {
        self.step = step;
    }

    fn run<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Infallible, Error> {
        self.attempt(Step::Parsing);
        if self.stage != Stage::Parsing {
            return Err(Error::Usage("a load sequence can only run once".to_string()));
        }

        let modules = args::load_modules(args, &mut self.files)?;
        let (primary, auxiliary) = modules
            .split_first()
            .ok_or_else(|| Error::Usage(args::USAGE.into()))?;

        // Must come first: the primary image may need fixed addresses.
        self.attempt(Step::PrimaryPlacement);
        image::place_primary_image(primary, &mut self.platform)?;
        self.advance(Stage::PrimaryPlaced);

        self.attempt(Step::ModulePlacement);
        let entries = modules::map_modules(auxiliary, &mut self.platform)?;
        self.advance(Stage::AuxPlaced);

        self.attempt(Step::InfoAssembly);
        let mut info = BootInfo::new();
        modules::map_module_list(&entries, &mut self.platform, &mut info)?;
        let info_addr =
            info::assemble_info(primary, &mut self.platform, &self.options, &mut info)?;
        self.advance(Stage::InfoAssembled);

        // Everything the kernel needs lives in target memory now.
        drop(modules);

        let registers = Registers::new(info_addr);
        let flags = self.options.handoff_flags();
        log::info!("Booting kernel, info structure @ {info_addr}");
        self.attempt(Step::Handoff);
        self.advance(Stage::HandedOff);

        match self.platform.transfer_control(registers, flags) {
            Ok(never) => match never {},
            Err(reason) => Err(Error::BootFailure(reason.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingCause;
    use crate::testing::{MemFiles, MockPlatform};
    use multiboot::{InfoFlags, BOOTLOADER_MAGIC};
    use pretty_assertions::assert_eq;
    use types::TargetAddress;

    const KERNEL: &[u8] = b"\x7fELF kernel image";
    const INITRD: &[u8] = &[0xa5; 5000];

    fn files() -> MemFiles {
        MemFiles::default()
            .with("kernel.bin", KERNEL)
            .with("initrd.img", INITRD)
            .with("mod1.img", b"first module")
            .with("mod2.img", b"second")
    }

    fn boot(args: &[&str], platform: MockPlatform) -> (Loader<MemFiles, MockPlatform>, Fatal) {
        let mut loader = Loader::new(files(), platform);
        let fatal = match loader.boot(args) {
            Ok(never) => match never {},
            Err(fatal) => fatal,
        };
        (loader, fatal)
    }

    fn addr(addr: u32) -> TargetAddress {
        TargetAddress::new(addr).unwrap()
    }

    #[test]
    fn scenario_a_primary_only() {
        let (loader, fatal) = boot(&["kernel.bin"], MockPlatform::default());
        let platform = loader.platform();
        let info = platform.info();

        assert_eq!(fatal.error, Error::BootFailure("kernel returned".into()));
        assert_eq!(fatal.step, Step::Handoff);
        assert_eq!(fatal.to_string(), "boot failed: kernel returned (stage: handoff)");
        assert_eq!(loader.stage(), Stage::Failed);
        assert_eq!(info.mods_count(), 0);
        assert_eq!(info.command_line(), None);
        assert!(!info.flags().contains(InfoFlags::MODS));
        assert!(!info.flags().contains(InfoFlags::CMDLINE));
        assert!(platform.module_list().is_empty());
    }

    #[test]
    fn scenario_b_primary_command_line() {
        let (loader, _) = boot(&["kernel.bin", "console=ttyS0"], MockPlatform::default());
        let platform = loader.platform();
        let info = platform.info();

        assert!(info.flags().contains(InfoFlags::CMDLINE));
        assert_eq!(
            platform.string_at(info.command_line().unwrap()),
            "console=ttyS0"
        );
    }

    #[test]
    fn scenario_c_single_module() {
        let (loader, _) = boot(&["kernel.bin", "---", "initrd.img"], MockPlatform::default());
        let platform = loader.platform();
        let list = platform.module_list();

        assert_eq!(platform.info().mods_count(), 1);
        assert!(platform.info().flags().contains(InfoFlags::MODS));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].string(), None);
        assert_eq!(list[0].len() as usize, INITRD.len());
        assert_eq!(platform.read(addr(list[0].start())), INITRD);
    }

    #[test]
    fn scenario_d_modules_in_order() {
        let (loader, _) = boot(
            &["kernel.bin", "---", "mod1.img", "foo", "bar", "---", "mod2.img"],
            MockPlatform::default(),
        );
        let platform = loader.platform();
        let list = platform.module_list();

        assert_eq!(list.len(), 2);
        assert_eq!(platform.read(addr(list[0].start())), b"first module");
        assert_eq!(platform.string_at(list[0].string().unwrap()), "foo bar");
        assert_eq!(platform.read(addr(list[1].start())), b"second");
        assert_eq!(list[1].string(), None);
    }

    #[test]
    fn scenario_e_primary_placement_failure() {
        let (loader, fatal) = boot(
            &["kernel.bin", "---", "initrd.img"],
            MockPlatform::default().failing(|_, _, fixed| fixed),
        );

        assert_eq!(fatal.step, Step::PrimaryPlacement);
        assert_eq!(
            fatal.to_string(),
            "failed to map primary image kernel.bin (required load address unavailable) \
             (stage: primary image placement)"
        );
        assert_eq!(
            fatal.error,
            Error::MappingFailure {
                what: "primary image kernel.bin".into(),
                cause: MappingCause::FixedAddress,
            }
        );
        assert_eq!(loader.platform().calls.len(), 1);
        assert!(loader.platform().handoffs.is_empty());
    }

    #[test]
    fn primary_image_is_placed_first() {
        for args in [
            &["kernel.bin"][..],
            &["kernel.bin", "quiet"],
            &["kernel.bin", "---", "mod1.img", "a", "---", "mod2.img", "b"],
        ] {
            let platform = MockPlatform::default().with_memory_map(&[
                types::mem::MemoryRegion::new(
                    0,
                    0x800_0000,
                    types::mem::MemoryRegionType::Available,
                ),
            ]);
            let (loader, _) = boot(args, platform);
            let calls = &loader.platform().calls;

            assert!(calls[0].fixed, "{args:?}");
            assert_eq!(calls[0].data, KERNEL, "{args:?}");
            assert!(calls[1..].iter().all(|call| !call.fixed), "{args:?}");
        }
    }

    #[test]
    fn one_entry_per_separator() {
        for k in 0..4 {
            let mut args = vec!["kernel.bin"];
            for _ in 0..k {
                args.extend(["---", "mod1.img"]);
            }
            let (loader, _) = boot(&args, MockPlatform::default());
            let list = loader.platform().module_list();

            assert_eq!(list.len(), k);
            assert!(list
                .iter()
                .all(|entry| entry.end() == entry.start() + b"first module".len() as u32));
        }
    }

    #[test]
    fn handoff_registers() {
        let (loader, _) = boot(&["kernel.bin"], MockPlatform::default());
        let platform = loader.platform();
        let (registers, flags) = platform.handoffs[0];
        let info_call = platform.calls.last().unwrap();

        assert_eq!(platform.handoffs.len(), 1);
        assert_eq!(registers.eax, BOOTLOADER_MAGIC);
        assert_eq!(Some(registers.ebx), info_call.addr);
        assert_eq!(flags, HandoffFlags::empty());
    }

    #[test]
    fn keep_pxe_is_forwarded() {
        let mut loader = Loader::new(files(), MockPlatform::default()).with_options(LoaderOptions {
            keep_pxe: true,
            ..Default::default()
        });
        assert!(loader.boot(&["kernel.bin"]).is_err());

        let (_, flags) = loader.platform().handoffs[0];
        assert_eq!(flags, HandoffFlags::KEEP_PXE | HandoffFlags::KEEP_UNDI);
    }

    #[test]
    fn load_failure_happens_before_any_placement() {
        let (loader, fatal) = boot(
            &["kernel.bin", "---", "missing.img", "---", "mod1.img"],
            MockPlatform::default(),
        );

        assert_eq!(fatal.step, Step::Parsing);
        assert!(matches!(fatal.error, Error::LoadFailure { ref path, .. } if path == "missing.img"));
        assert!(loader.platform().calls.is_empty());
        assert_eq!(loader.files().loaded, ["kernel.bin", "missing.img"]);
    }

    #[test]
    fn usage_error() {
        let (loader, fatal) = boot(&[], MockPlatform::default());
        assert_eq!(fatal.error, Error::Usage(args::USAGE.into()));
        assert!(loader.files().loaded.is_empty());
    }

    #[test]
    fn module_failure_stops_before_module_list() {
        let (loader, fatal) = boot(
            &["kernel.bin", "---", "mod1.img", "---", "mod2.img"],
            MockPlatform::default().failing(|_, data, _| data == b"second"),
        );

        assert_eq!(fatal.step, Step::ModulePlacement);
        assert_eq!(
            fatal.to_string(),
            "failed to map module mod2.img (memory fragmentation issue?) \
             (stage: module placement)"
        );
        assert_eq!(loader.platform().calls.len(), 3);
        assert!(loader.platform().handoffs.is_empty());
    }

    #[test]
    fn info_failure_is_reported_after_modules() {
        let (loader, fatal) = boot(
            &["kernel.bin", "---", "initrd.img"],
            MockPlatform::default().failing(|_, data, _| data.len() == 88),
        );

        assert_eq!(fatal.step, Step::InfoAssembly);
        assert_eq!(
            fatal.to_string(),
            "failed to map info structure (memory fragmentation issue?) \
             (stage: info structure assembly)"
        );
        assert!(loader.platform().handoffs.is_empty());
    }

    #[test]
    fn sequence_runs_once() {
        let mut loader = Loader::new(files(), MockPlatform::default());
        assert!(loader.boot(&["kernel.bin"]).is_err());
        let calls = loader.platform().calls.len();

        let fatal = loader.boot(&["kernel.bin"]).unwrap_err();
        assert_eq!(fatal.step, Step::Parsing);
        assert_eq!(loader.stage(), Stage::Failed);
        assert!(matches!(fatal.error, Error::Usage(_)));
        assert_eq!(loader.platform().calls.len(), calls);
    }
}
