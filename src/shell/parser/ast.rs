use std::fmt;

/// One parsed input line, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered stages connected stdout-to-stdin. Never empty when produced
    /// by `parse`.
    Pipeline(Pipeline),
    /// `&`-separated pipelines launched concurrently, none foregrounded.
    ParallelJobs(Vec<Pipeline>),
    /// Block until every outstanding child process has been reaped.
    Wait,
    /// Source form we refuse to execute. Reported, never silently run.
    Unsupported { kind: UnsupportedKind, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    FunctionDef,
    Block,
    Heredoc,
}

impl UnsupportedKind {
    pub fn label(&self) -> &'static str {
        match self {
            UnsupportedKind::FunctionDef => "Function definition",
            UnsupportedKind::Block => "Control flow block",
            UnsupportedKind::Heredoc => "Here-document",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

/// One program invocation within a pipeline. `args[0]` is the program name;
/// redirection paths resolve against the cwd at dispatch time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage {
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub stdout: Option<Redirect>,
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub path: String,
    pub append: bool,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))?;
        if let Some(path) = &self.stdin {
            write!(f, " < {}", path)?;
        }
        if let Some(redirect) = &self.stdout {
            let op = if redirect.append { ">>" } else { ">" };
            write!(f, " {} {}", op, redirect.path)?;
        }
        if let Some(path) = &self.stderr {
            write!(f, " 2> {}", path)?;
        }
        Ok(())
    }
}
