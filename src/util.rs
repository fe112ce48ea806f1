// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use std::io;

/// Setup the child between fork() and exec().
///
/// Runs in the forked child, only async-signal-safe calls are allowed here.
pub fn setup_child() -> io::Result<()> {
    disable_core_dumps()?;
    set_parent_death_signal()
}

/// When the spawning thread dies, the child dies too
#[cfg(target_os = "linux")]
fn set_parent_death_signal() -> io::Result<()> {
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
fn set_parent_death_signal() -> io::Result<()> {
    Ok(())
}

/// Set RLIMIT_CORE to zero
fn disable_core_dumps() -> io::Result<()> {
    let r_limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &r_limit) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Block until `pid` exits without reaping it. The zombie keeps the pid,
/// and so the process group id, reserved until `Child::wait` is called.
pub fn wait_exited(pid: i32) -> io::Result<()> {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let ret = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Cut `output` to at most `limit` bytes without splitting a character
pub fn truncate_utf8(output: &mut String, limit: usize) {
    if output.len() <= limit {
        return;
    }
    let mut end = limit;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    output.truncate(end);
}
