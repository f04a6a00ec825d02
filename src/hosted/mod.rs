//! Stand-ins for the boot environment, so the load sequence can be run and inspected from an
//! ordinary process. Files come from the host file system; target memory, firmware tables and the
//! final jump are simulated.

mod files;
mod machine;

pub use files::HostFiles;
pub use machine::SimulatedMachine;
