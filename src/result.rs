// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

/// Message returned in `stderr` when a job was killed by one of its limits.
/// Which limit fired is not disclosed.
pub const RESOURCE_EXCEEDED_MESSAGE: &str = "Execution timeout or output limit exceeded";

/// struct that rappresents the outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// What the code logged
    pub stdout: String,

    /// Standard error of the interpreter, or the reason the code did not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ExecutionResult {
    /// Result of a job that ran to completion
    pub fn completed(stdout: String, stderr: String) -> Self {
        ExecutionResult {
            stdout,
            stderr: Some(stderr),
        }
    }

    /// Result of a job that did not produce any output
    pub fn failure<S: Into<String>>(message: S) -> Self {
        ExecutionResult {
            stdout: String::new(),
            stderr: Some(message.into()),
        }
    }

    /// Result of a job killed by a limit
    pub fn resource_exceeded() -> Self {
        Self::failure(RESOURCE_EXCEEDED_MESSAGE)
    }

    /// The stderr text, empty when absent
    pub fn stderr_str(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }
}
