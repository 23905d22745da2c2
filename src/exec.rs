//! The pipeline execution engine: pipe chaining, redirection, fork/exec,
//! and the foreground wait.
//!
//! Commands launch strictly left to right. One pipe is created immediately
//! before forking its producer; the parent closes both ends it does not
//! retain right after the fork (ownership via `OwnedFd`, dropping closes),
//! so readers see EOF as soon as every writer is gone. All reaping happens
//! on the reaper thread; the foreground wait blocks on the reap channel for
//! the last command's pid, which keeps the synchronous and asynchronous
//! paths from ever racing over the same child.

use crate::builtin::Builtin;
use crate::command::Pipeline;
use crate::reaper::{ReapEvent, Reaper};
use anyhow::{Context, Result};
use nix::libc;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, Pid, dup2, execvp, fork, pipe};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, OwnedFd};
use std::process;
use std::time::Duration;

/// Executes pipelines and keeps the not-yet-displayed termination reports.
pub struct Executor {
    reaper: &'static Reaper,
    backlog: Vec<ReapEvent>,
}

impl Executor {
    /// Installs the process-wide reaper on first use, before any child can
    /// be forked.
    pub fn new() -> Result<Self> {
        Ok(Self {
            reaper: Reaper::install()?,
            backlog: Vec::new(),
        })
    }

    /// Execute one pipeline.
    ///
    /// Returns the pid of the last launched external command, if any. For a
    /// foreground pipeline, that process has terminated (and its status is
    /// in the backlog) by the time this returns; a background pipeline
    /// returns without waiting. Launch failures skip the failing command
    /// and the pipeline continues best-effort.
    pub fn run(&mut self, pipeline: &Pipeline) -> Result<Option<Pid>> {
        let mut inbound: Option<OwnedFd> = None;
        let mut last_pid = None;
        let last = pipeline.commands.len() - 1;

        for (index, command) in pipeline.commands.iter().enumerate() {
            if let Some(builtin) = Builtin::recognize(command) {
                // In-process, never forked. An inbound pipe, if any, stays
                // for the next command.
                if let Err(err) = builtin.run() {
                    eprintln!("minnow: {err:#}");
                }
                continue;
            }

            match self.launch(pipeline, index, inbound.take()) {
                Ok((pid, outbound)) => {
                    inbound = outbound;
                    if index == last {
                        last_pid = Some(pid);
                    }
                }
                Err(err) => {
                    eprintln!("minnow: {}: {err:#}", command.name());
                }
            }
        }

        if !pipeline.background {
            if let Some(pid) = last_pid {
                self.wait_foreground(pid)?;
            }
        }
        Ok(last_pid)
    }

    /// Fork and exec the command at `index`, wiring `inbound` (the previous
    /// pipe's read end) to its stdin. Returns the child's pid and, when the
    /// command is not the last one, the read end feeding the next command.
    fn launch(
        &self,
        pipeline: &Pipeline,
        index: usize,
        inbound: Option<OwnedFd>,
    ) -> Result<(Pid, Option<OwnedFd>)> {
        let command = &pipeline.commands[index];
        let last = index == pipeline.commands.len() - 1;

        // Prepared before forking; allocating between fork and exec in a
        // threaded process is not safe.
        let argv: Vec<CString> = command
            .argv()
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()
            .context("argument contains a NUL byte")?;

        let outbound = if last {
            None
        } else {
            Some(pipe().context("pipe creation failed")?)
        };

        match unsafe { fork() }.context("fork failed")? {
            ForkResult::Parent { child } => {
                // Drop = close: the parent retains only the read end that
                // feeds the next command.
                drop(inbound);
                Ok((child, outbound.map(|(read, write)| {
                    drop(write);
                    read
                })))
            }
            ForkResult::Child => {
                let outbound_write = outbound.map(|(read, write)| {
                    drop(read);
                    write
                });
                exec_child(pipeline, index, inbound, outbound_write, &argv)
            }
        }
    }

    /// Block until the last command of a foreground pipeline has been
    /// reclaimed. Events for other pids stay queued for the next flush.
    fn wait_foreground(&mut self, pid: Pid) -> Result<()> {
        loop {
            let event = self.reaper.recv()?;
            let done = event.pid == pid;
            self.backlog.push(event);
            if done {
                return Ok(());
            }
        }
    }

    /// Formatted status lines for every child reclaimed so far, oldest
    /// first. Clears the backlog.
    pub fn drain_statuses(&mut self) -> Vec<String> {
        while let Some(event) = self.reaper.try_recv() {
            self.backlog.push(event);
        }
        self.backlog.drain(..).map(|event| event.to_string()).collect()
    }

    /// Wait up to `timeout` for one further termination to arrive. Returns
    /// whether anything was added to the backlog.
    pub fn wait_for_status(&mut self, timeout: Duration) -> Result<bool> {
        match self.reaper.recv_timeout(timeout)? {
            Some(event) => {
                self.backlog.push(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Child-side setup and exec. Never returns: on exec failure the child
/// reports it and exits with status 1, observed by the parent only as a
/// reaped status.
fn exec_child(
    pipeline: &Pipeline,
    index: usize,
    inbound: Option<OwnedFd>,
    outbound_write: Option<OwnedFd>,
    argv: &[CString],
) -> ! {
    let last = index == pipeline.commands.len() - 1;

    if pipeline.background {
        // A backgrounded command does not need to reap its own
        // descendants; with SIGCHLD ignored the kernel discards them.
        let _ = unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) };
    }

    // Stdin: inbound pipe beats file redirection; a background pipeline's
    // first command must never contend for the terminal, so it reads the
    // null device when no file was given.
    if let Some(fd) = inbound {
        let _ = dup2(fd.as_raw_fd(), libc::STDIN_FILENO);
        drop(fd);
    } else if (index == 0 && pipeline.input.is_some()) || pipeline.background {
        let path = pipeline
            .input
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new("/dev/null"));
        match File::open(path) {
            Ok(file) => {
                let _ = dup2(file.as_raw_fd(), libc::STDIN_FILENO);
                drop(file);
            }
            // Recoverable: exec proceeds with stdin unredirected.
            Err(err) => eprintln!("minnow: input redirection failed: {err}"),
        }
    }

    // Stdout: interior commands feed the pipe; the last command honors the
    // output redirection, if any.
    if let Some(fd) = outbound_write {
        let _ = dup2(fd.as_raw_fd(), libc::STDOUT_FILENO);
        drop(fd);
    } else if last {
        if let Some(redirect) = &pipeline.output {
            let opened = OpenOptions::new()
                .write(true)
                .create(true)
                .append(redirect.append)
                .truncate(!redirect.append)
                .open(&redirect.path);
            match opened {
                Ok(file) => {
                    let _ = dup2(file.as_raw_fd(), libc::STDOUT_FILENO);
                    drop(file);
                }
                // Recoverable: falls back to the inherited stdout.
                Err(err) => eprintln!("minnow: output redirection failed: {err}"),
            }
        }
    }

    match execvp(&argv[0], argv) {
        Err(err) => {
            eprintln!("minnow: {}: {err}", pipeline.commands[index].name());
            process::exit(1);
        }
        Ok(_) => unreachable!(),
    }
}
