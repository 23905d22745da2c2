//! Descriptors for a parsed command line: one argument vector per command,
//! and the pipeline that strings them together.

use std::path::PathBuf;

/// A single executable invocation: the argument vector, first element being
/// the executable or builtin name. Immutable once produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    pub fn new(argv: Vec<String>) -> Self {
        debug_assert!(!argv.is_empty());
        Self { argv }
    }

    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Output redirection for the last command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: PathBuf,
    /// Append to the file instead of truncating it.
    pub append: bool,
}

/// An ordered sequence of commands connected by pipes, optionally bounded by
/// file redirection at the two ends. Produced by the parser, consumed once
/// by the executor.
///
/// The input path applies only to the first command, the output redirect
/// only to the last. A background pipeline runs detached from the
/// interactive wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub input: Option<PathBuf>,
    pub output: Option<OutputRedirect>,
    pub background: bool,
}

impl Pipeline {
    /// True when the whole line is the bare `exit` builtin, which ends the
    /// interactive session.
    pub fn is_exit(&self) -> bool {
        self.commands.len() == 1 && self.commands[0].argv() == ["exit"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(args: &[&str]) -> Command {
        Command::new(args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn bare_exit_is_recognized() {
        let line = Pipeline {
            commands: vec![cmd(&["exit"])],
            input: None,
            output: None,
            background: false,
        };
        assert!(line.is_exit());
    }

    #[test]
    fn exit_with_arguments_is_not_the_builtin() {
        let line = Pipeline {
            commands: vec![cmd(&["exit", "1"])],
            input: None,
            output: None,
            background: false,
        };
        assert!(!line.is_exit());
    }

    #[test]
    fn exit_inside_a_pipeline_is_not_the_builtin() {
        let line = Pipeline {
            commands: vec![cmd(&["exit"]), cmd(&["wc"])],
            input: None,
            output: None,
            background: false,
        };
        assert!(!line.is_exit());
    }
}
