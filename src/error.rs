// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! Failures of a job. None of them escapes [`Executor::execute`](crate::Executor::execute):
//! they are all turned into an [`ExecutionResult`].
//!
//! An exception thrown by the user code is not listed here. The harness
//! catches it and logs `Error: <message>`, so it reaches the caller as
//! regular output.

use std::io;

use crate::monitor::KillReason;
use crate::result::ExecutionResult;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The source scan or the length check refused the code
    #[error("{0}")]
    ValidationRejected(String),

    /// Timeout, stdout limit or stderr limit
    #[error("resource limit exceeded: {0}")]
    ResourceExceeded(KillReason),

    /// The interpreter could not be started
    #[error("{0}")]
    SpawnFailure(#[source] io::Error),

    /// The artifact could not be written or the child could not be supervised
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl From<SandboxError> for ExecutionResult {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::ResourceExceeded(_) => ExecutionResult::resource_exceeded(),
            other => ExecutionResult::failure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RESOURCE_EXCEEDED_MESSAGE;

    #[test]
    fn test_kill_reason_not_disclosed() {
        for reason in [
            KillReason::Timeout,
            KillReason::StdoutLimit,
            KillReason::StderrLimit,
        ] {
            let result: ExecutionResult = SandboxError::ResourceExceeded(reason).into();
            assert_eq!(result.stdout, "");
            assert_eq!(result.stderr_str(), RESOURCE_EXCEEDED_MESSAGE);
        }
    }

    #[test]
    fn test_spawn_failure_keeps_system_message() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        let result: ExecutionResult = SandboxError::SpawnFailure(err).into();
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr_str(), "No such file or directory");
    }
}
