//! Asynchronous child reaping.
//!
//! A dedicated thread blocks on a [`signal_hook`] iterator. On every
//! `SIGCHLD` it reclaims all currently-terminated children with a
//! non-blocking `waitpid` loop (signals coalesce, so one delivery can stand
//! for several exits) and sends one structured [`ReapEvent`] per child down
//! an mpsc channel. Nothing is formatted on this thread; the interactive
//! loop formats after dequeue. `SIGINT` is registered in the same set and
//! absorbed so the session survives interrupts.

use anyhow::{Context, Result, anyhow};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use signal_hook::consts::{SIGCHLD, SIGINT};
use signal_hook::iterator::Signals;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Normal exit with the given code.
    Exited(i32),
    /// Terminated by the given signal number.
    Signaled(i32),
}

/// One reclaimed child: raw data only, formatted by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapEvent {
    pub pid: Pid,
    pub kind: ExitKind,
}

impl fmt::Display for ReapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExitKind::Exited(code) => {
                write!(f, "PID {} finished with exit status {}", self.pid, code)
            }
            ExitKind::Signaled(signo) => {
                write!(f, "PID {} finished with signal {}", self.pid, signo)
            }
        }
    }
}

/// Process-wide collector. Single producer (the signal thread), single
/// consumer (whoever holds the receiver lock — the interactive loop).
pub struct Reaper {
    events: Mutex<Receiver<ReapEvent>>,
}

static REAPER: OnceLock<Reaper> = OnceLock::new();

impl Reaper {
    /// Install the process-wide reaper, or return the existing one. Must be
    /// called before the first child is forked so no exit can be missed.
    pub fn install() -> Result<&'static Reaper> {
        if REAPER.get().is_none() {
            let reaper = Reaper::start()?;
            let _ = REAPER.set(reaper);
        }
        REAPER.get().ok_or_else(|| anyhow!("reaper not installed"))
    }

    fn start() -> Result<Reaper> {
        let (tx, rx) = mpsc::channel();
        let mut signals =
            Signals::new([SIGCHLD, SIGINT]).context("installing signal watcher")?;
        thread::spawn(move || {
            for signal in signals.forever() {
                if signal != SIGCHLD {
                    continue; // SIGINT is absorbed; the session continues
                }
                if reap_terminated(&tx).is_err() {
                    return; // receiver gone, nothing left to report to
                }
            }
        });
        Ok(Reaper {
            events: Mutex::new(rx),
        })
    }

    /// Block until the next child is reclaimed.
    pub fn recv(&self) -> Result<ReapEvent> {
        let events = self
            .events
            .lock()
            .map_err(|_| anyhow!("reaper receiver poisoned"))?;
        events.recv().context("reaper thread gone")
    }

    /// Take one already-reclaimed child, if any, without blocking.
    pub fn try_recv(&self) -> Option<ReapEvent> {
        let events = self.events.lock().ok()?;
        events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next reclaimed child.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ReapEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| anyhow!("reaper receiver poisoned"))?;
        match events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("reaper thread gone")),
        }
    }
}

/// Reclaim every currently-terminated child. Errs only when the channel is
/// closed.
fn reap_terminated(tx: &Sender<ReapEvent>) -> Result<(), mpsc::SendError<ReapEvent>> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => tx.send(ReapEvent {
                pid,
                kind: ExitKind::Exited(code),
            })?,
            Ok(WaitStatus::Signaled(pid, signal, _core_dumped)) => tx.send(ReapEvent {
                pid,
                kind: ExitKind::Signaled(signal as i32),
            })?,
            // Stop/continue notifications would need job control, which
            // this shell does not do.
            Ok(WaitStatus::StillAlive) => return Ok(()),
            Ok(_) => {}
            Err(Errno::EINTR) => {}
            Err(_) => return Ok(()), // ECHILD: no children left
        }
    }
}
