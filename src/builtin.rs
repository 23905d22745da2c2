//! Builtins run inside the interpreter's own process, never forked. The
//! dispatcher intercepts them before the process launcher sees the command.
//!
//! Only `cd` lives here; the bare `exit` line is handled by the REPL itself
//! (see [`crate::command::Pipeline::is_exit`]).

use crate::command::Command;
use anyhow::{Context, Result, anyhow};
use nix::unistd::User;
use std::path::PathBuf;

/// A builtin recognized in a command descriptor.
#[derive(Debug, PartialEq, Eq)]
pub enum Builtin {
    Cd { target: String },
}

impl Builtin {
    /// `cd` is recognized only with exactly one argument beyond the name;
    /// anything else falls through to the process launcher.
    pub fn recognize(command: &Command) -> Option<Builtin> {
        match command.argv() {
            [name, target] if name == "cd" => Some(Builtin::Cd {
                target: target.clone(),
            }),
            _ => None,
        }
    }

    /// Run the builtin. Failures are ordinary errors for the caller to
    /// report; they never end the session.
    pub fn run(&self) -> Result<()> {
        match self {
            Builtin::Cd { target } => cd(target),
        }
    }
}

fn cd(target: &str) -> Result<()> {
    let path = resolve_cd_target(target, std::env::var("HOME").ok().as_deref())?;
    std::env::set_current_dir(&path)
        .with_context(|| format!("cd: {}", path.display()))
}

/// Expand a `cd` target: `~` to `$HOME`, `~user[/rest]` to that user's home
/// directory, anything else verbatim. Pure so it can be tested without
/// touching the working directory.
pub fn resolve_cd_target(target: &str, home: Option<&str>) -> Result<PathBuf> {
    if target == "~" {
        return home
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("cd: HOME is not set"));
    }

    if let Some(rest) = target.strip_prefix('~') {
        if !rest.starts_with('/') {
            let (user, remainder) = match rest.split_once('/') {
                Some((user, remainder)) => (user, Some(remainder)),
                None => (rest, None),
            };
            let entry = User::from_name(user)
                .with_context(|| format!("cd: user lookup for {user}"))?
                .ok_or_else(|| anyhow!("cd: no such user: {user}"))?;
            let mut path = entry.dir;
            if let Some(remainder) = remainder {
                path.push(remainder);
            }
            return Ok(path);
        }
    }

    Ok(PathBuf::from(target))
}
