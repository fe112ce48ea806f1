// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! Watchers enforcing the limits of a running job.
//!
//! Each job has three of them: one thread per output stream and one for the
//! wall time. They share a [`KillSwitch`]; whichever fires first kills the
//! process group, the others become no-ops.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::Result;

lazy_static! {
    /// Process groups of the jobs currently running, killed by `kill_all_jobs`.
    static ref LIVE_GROUPS: Mutex<HashSet<i32>> = Mutex::new(HashSet::new());
}

/// Send SIGKILL to every running job
pub fn kill_all_jobs() {
    // Held while killing, so a job can not reap its leader in between
    let groups = match LIVE_GROUPS.lock() {
        Ok(groups) => groups,
        Err(poisoned) => poisoned.into_inner(),
    };
    for &pgid in groups.iter() {
        match kill_group(pgid) {
            Ok(()) => info!("Killed process group {}", pgid),
            Err(e) => error!("Cannot kill process group {}: {}", pgid, e),
        }
    }
}

fn kill_group(pgid: i32) -> nix::Result<()> {
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Already gone
        Err(Errno::ESRCH) => Ok(()),
        other => other,
    }
}

/// Which limit killed a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillReason {
    Timeout,
    StdoutLimit,
    StderrLimit,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillReason::Timeout => write!(f, "wall time limit"),
            KillReason::StdoutLimit => write!(f, "stdout limit"),
            KillReason::StderrLimit => write!(f, "stderr limit"),
        }
    }
}

/// Kills the process group of a job at most once
#[derive(Debug)]
pub struct KillSwitch {
    pgid: i32,
    reason: OnceLock<KillReason>,
}

impl KillSwitch {
    /// `pgid` is the pid of the child, leader of its own group
    pub fn new(pgid: i32) -> Self {
        if let Ok(mut groups) = LIVE_GROUPS.lock() {
            groups.insert(pgid);
        }
        KillSwitch {
            pgid,
            reason: OnceLock::new(),
        }
    }

    /// Kill the job for `reason`. Only the first call has an effect.
    pub fn trigger(&self, reason: KillReason) {
        if self.reason.set(reason).is_err() {
            trace!("Process group {} already killed, ignoring {}", self.pgid, reason);
            return;
        }
        warn!("Killing process group {}: {} exceeded", self.pgid, reason);
        if let Err(e) = kill_group(self.pgid) {
            error!("Cannot kill process group {}: {}", self.pgid, e);
        }
    }

    /// Why the job was killed, if it was
    pub fn fired(&self) -> Option<KillReason> {
        self.reason.get().copied()
    }

    /// Take the group out of the reach of `kill_all_jobs`. Must happen
    /// before the leader is reaped, after that its pid can be reused.
    pub fn disarm(&self) {
        let mut groups = match LIVE_GROUPS.lock() {
            Ok(groups) => groups,
            Err(poisoned) => poisoned.into_inner(),
        };
        groups.remove(&self.pgid);
    }
}

impl Drop for KillSwitch {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
fn is_live(pgid: i32) -> bool {
    LIVE_GROUPS
        .lock()
        .map(|groups| groups.contains(&pgid))
        .unwrap_or(false)
}

/// Read `stream` until EOF, keeping at most `limit` bytes. Going over the
/// limit triggers the switch with `reason` and stops reading.
pub fn spawn_output_reader<R>(
    name: &str,
    mut stream: R,
    limit: usize,
    switch: Arc<KillSwitch>,
    reason: KillReason,
) -> Result<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let mut output = Vec::new();
            let mut buffer = [0u8; 8192];
            loop {
                match stream.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        output.extend_from_slice(&buffer[..n]);
                        if output.len() > limit {
                            switch.trigger(reason);
                            output.truncate(limit);
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Error reading child output: {}", e);
                        break;
                    }
                }
            }
            output
        })
        .context("Failed to start output reader thread")
}

/// Kills the job when the wall time limit expires, unless cancelled before
#[derive(Debug)]
pub struct TimeoutWatcher {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl TimeoutWatcher {
    pub fn start(limit: Duration, switch: Arc<KillSwitch>) -> Result<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("Wall time watcher".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(limit) {
                    switch.trigger(KillReason::Timeout);
                }
            })
            .context("Failed to start wall time watcher thread")?;
        Ok(TimeoutWatcher { cancel, handle })
    }

    /// Stop the watcher and wait for it
    pub fn cancel(self) {
        // The watcher may have fired already, so the receiver can be gone
        let _ = self.cancel.send(());
        if self.handle.join().is_err() {
            error!("Wall time watcher panicked");
        }
    }
}
