// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! # tsbox
//!
//! Run untrusted TypeScript snippets and capture what they log.
//!
//! ### What does it do
//! tsbox takes a piece of source code and:
//! - rejects it early if it contains obviously dangerous constructs
//! - wraps it in a harness that captures `console.log` output
//! - runs it in its own process group with a wall time limit, an output limit and a heap limit
//! - always removes the temporary source file before returning
//!
//! The process boundary and the limits are the real containment. The source
//! scan only rejects the obvious cases.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

#[cfg(not(unix))]
compile_error!("tsbox is only supported on unix systems");

pub mod configuration;
pub mod error;
pub mod harness;
pub mod job;
pub mod monitor;
pub mod result;
pub mod runner;
pub mod validator;

mod util;

#[cfg(test)]
mod tests;

pub use configuration::ExecutorConfiguration;
pub use harness::{Harness, PassthroughHarness, TypeScriptHarness};
pub use monitor::kill_all_jobs;
pub use result::ExecutionResult;
pub use runner::Executor;
pub use validator::{validate, ValidationResult};

/// Convenience result type
pub type Result<T> = anyhow::Result<T>;

/// Execute `code` with the default configuration.
///
/// Any failure, including an invalid default configuration, is reported in
/// the `stderr` field of the result.
pub fn execute(code: &str) -> ExecutionResult {
    match Executor::new(ExecutorConfiguration::default()) {
        Ok(executor) => executor.execute(code),
        Err(e) => {
            error!("Cannot create executor: {:#}", e);
            ExecutionResult::failure(format!("{:#}", e))
        }
    }
}
