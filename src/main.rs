//! Runs the load sequence against a simulated machine: files are read from the host, placements
//! and the resulting information structure are logged, and the final jump is refused.

use std::process::ExitCode;

use log::error;
use mboot::Loader;

use crate::hosted::{HostFiles, SimulatedMachine};

mod hosted;
mod logging;

fn main() -> ExitCode {
    if let Err(err) = logging::initialize_log() {
        eprintln!("mboot: cannot initialize log: {err}");
    }

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut loader = Loader::new(HostFiles, SimulatedMachine::default());

    match loader.boot(&args) {
        Ok(never) => match never {},
        Err(fatal) => {
            error!("mboot: {fatal}");
            ExitCode::FAILURE
        }
    }
}
