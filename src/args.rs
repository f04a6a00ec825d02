//! Splitting the command line into modules and loading them.
//!
//! The arguments have the form `primary [args...] [--- aux [args...]]...`. Every segment between
//! separators names one file, and whatever follows the file name becomes that module's command
//! line. The first segment is always the primary (kernel) image.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, info};
use types::fmt::Fmt;

use crate::error::Error;
use crate::platform::FileLoader;

/// Token separating one module from the next. It is consumed and never part of a command line.
pub const MODULE_SEPARATOR: &str = "---";

pub const USAGE: &str = "Usage: mboot mboot_file args... [--- module args...]...";

/// A loaded module, still in loader memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Path the module was loaded from, for diagnostics.
    pub path: String,
    pub data: Vec<u8>,
    /// Space separated arguments following the path. `None` if there were none.
    pub cmdline: Option<String>,
}

impl ModuleDescriptor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One `path [args...]` segment of the command line.
#[derive(Debug, PartialEq, Eq)]
pub struct ModuleSpec<'a, S> {
    pub path: &'a str,
    pub args: &'a [S],
}

impl<S: AsRef<str>> ModuleSpec<'_, S> {
    /// Join the arguments with single spaces. A segment without arguments, or whose arguments join
    /// to an empty string, has no command line at all rather than an empty one.
    pub fn command_line(&self) -> Result<Option<String>, Error> {
        let length = self
            .args
            .iter()
            .map(|arg| arg.as_ref().len() + 1)
            .sum::<usize>();

        let mut cmdline = String::new();
        cmdline.try_reserve_exact(length)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                cmdline.push(' ');
            }
            cmdline.push_str(arg.as_ref());
        }

        Ok(Some(cmdline).filter(|cmdline| !cmdline.is_empty()))
    }
}

/// Split `args` at every [`MODULE_SEPARATOR`]. The result always has exactly one more entry than
/// there are separators, the first being the primary image.
pub fn split_modules<S: AsRef<str>>(args: &[S]) -> Result<Vec<ModuleSpec<'_, S>>, Error> {
    if args.is_empty() {
        return Err(Error::Usage(USAGE.into()));
    }

    let segments = args.split(|arg| arg.as_ref() == MODULE_SEPARATOR);
    let mut specs = Vec::new();
    specs.try_reserve_exact(segments.clone().count())?;

    for (index, segment) in segments.enumerate() {
        let (path, args) = segment.split_first().ok_or_else(|| {
            Error::Usage(format!(
                "module {index} has no file name (`{MODULE_SEPARATOR}` must be followed by a path)"
            ))
        })?;
        specs.push(ModuleSpec {
            path: path.as_ref(),
            args,
        });
    }

    Ok(specs)
}

/// Load every module named in `args`, in order. Stops at the first file that cannot be loaded.
pub fn load_modules<S, L>(args: &[S], loader: &mut L) -> Result<Vec<ModuleDescriptor>, Error>
where
    S: AsRef<str>,
    L: FileLoader + ?Sized,
{
    let specs = split_modules(args)?;

    let mut modules = Vec::new();
    modules.try_reserve_exact(specs.len())?;

    for spec in specs {
        info!("Loading {}...", spec.path);
        let data = loader.load(spec.path).map_err(|err| Error::LoadFailure {
            path: spec.path.into(),
            reason: err.to_string(),
        })?;
        debug!("{}: {} loaded", spec.path, Fmt::<u8>::from(data.len()));

        modules.push(ModuleDescriptor {
            path: spec.path.into(),
            cmdline: spec.command_line()?,
            data,
        });
    }

    Ok(modules)
}
