use alloc::string::String;
use core::fmt::{Display, Formatter, Result};

use thiserror::Error;

/// Likely reason for a failed placement, reported to the operator along with the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingCause {
    /// The primary image could not get the addresses it asked for.
    FixedAddress,
    /// No free block of the requested size and alignment was left.
    Fragmentation,
    /// The block would not fit below 4 GiB.
    AddressOverflow,
}

impl Display for MappingCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(match self {
            Self::FixedAddress => "required load address unavailable",
            Self::Fragmentation => "memory fragmentation issue?",
            Self::AddressOverflow => "does not fit in the 32-bit address space",
        })
    }
}

/// Every way a load sequence can fail. None of these are recoverable: once placement has started,
/// target memory has been consumed and the only way out is to abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed or empty argument list, detected before any file is loaded.
    #[error("{0}")]
    Usage(String),

    #[error("failed to load {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    /// Loader memory for descriptors or command lines could not be reserved.
    #[error("out of memory")]
    OutOfMemory,

    #[error("failed to map {what} ({cause})")]
    MappingFailure { what: String, cause: MappingCause },

    /// The handoff returned instead of transferring control to the kernel.
    #[error("boot failed: {0}")]
    BootFailure(String),
}

impl Error {
    pub(crate) fn mapping(what: impl Into<String>, cause: MappingCause) -> Self {
        Self::MappingFailure {
            what: what.into(),
            cause,
        }
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
