use std::io;

use mboot::FileLoader;

/// Reads modules from the host file system.
#[derive(Debug, Default)]
pub struct HostFiles;

impl FileLoader for HostFiles {
    type Error = io::Error;

    fn load(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        std::fs::read(path)
    }
}
