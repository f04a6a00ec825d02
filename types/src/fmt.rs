use core::{
    fmt::{Display, Formatter, Result},
    marker::PhantomData,
};

/// Formats a byte count with the largest unit that keeps at least two significant digits.
pub struct Fmt<T> {
    length: u64,
    phantom: PhantomData<T>,
}

impl<T> From<u64> for Fmt<T> {
    fn from(value: u64) -> Self {
        Self {
            length: value,
            phantom: PhantomData,
        }
    }
}

impl<T> From<usize> for Fmt<T> {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

impl<T> Display for Fmt<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.length {
            b if b < 10 * 1024 => write!(f, "{b} B"),
            kb if kb < 10 * 1024u64.pow(2) => write!(f, "{} KiB", kb >> 10),
            mb if mb < 10 * 1024u64.pow(3) => write!(f, "{} MiB", mb >> 20),
            gb => write!(f, "{} GiB", gb >> 30),
        }
    }
}
