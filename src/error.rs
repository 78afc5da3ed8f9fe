use std::fmt;

/// Errors surfaced to the interactive user as a single descriptive line.
/// None of these terminate the control loop; only `exit` or EOF does.
#[derive(Debug)]
pub enum ShellError {
    Parse(String),
    CommandNotFound(String),
    PermissionDenied(String),
    Io(std::io::Error),
    Spawn(String),
    JobNotFound(usize),
    Readline(rustyline::error::ReadlineError),
    Hook(String),
}

impl ShellError {
    /// Exit status reserved for this error class.
    pub fn status(&self) -> i32 {
        match self {
            ShellError::CommandNotFound(_) => 127,
            ShellError::PermissionDenied(_) => 126,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::Io(err)
    }
}

impl From<rustyline::error::ReadlineError> for ShellError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        ShellError::Readline(err)
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Parse(msg) => write!(f, "parse error: {}", msg),
            ShellError::CommandNotFound(cmd) => write!(f, "Command not found: {}", cmd),
            ShellError::PermissionDenied(cmd) => write!(f, "Permission denied: {}", cmd),
            ShellError::Io(e) => write!(f, "IO error: {}", e),
            ShellError::Spawn(msg) => write!(f, "Execution error: {}", msg),
            ShellError::JobNotFound(id) => write!(f, "job not found: {}", id),
            ShellError::Readline(e) => write!(f, "readline error: {}", e),
            ShellError::Hook(msg) => write!(f, "hook error: {}", msg),
        }
    }
}

impl std::error::Error for ShellError {}
