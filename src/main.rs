use std::env;
use std::path::PathBuf;

use log::debug;

use shell::Shell;
use utils::config::Config;
use utils::log::init_logger;

mod error;
mod shell;
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("configuration loaded");

    let mut shell = Shell::new(&config)?;

    // `mysh <file>` runs a script; no argument starts the interactive loop
    match env::args().nth(1) {
        Some(script) => shell.run_script(&PathBuf::from(script)),
        None => shell.run(),
    }
}
