mod builtins;
mod environment;
mod executor;
mod history;
mod job_table;
pub mod parser;
mod plugins;
mod readline;
mod shell;
mod signals;

pub use shell::Shell;
