// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::configuration::ExecutorConfiguration;
use crate::harness::PassthroughHarness;
use crate::result::ExecutionResult;
use crate::runner::Executor;

/// An executor running shell scripts, with its own temp directory
pub struct ShellSandbox {
    pub executor: Executor,
    pub temp: TempDir,
}

impl ShellSandbox {
    pub fn run(&self, script: &str) -> ExecutionResult {
        let result = self.executor.execute(script);
        eprintln!("Result = {:?}", result);
        result
    }

    pub fn artifact_dir(&self) -> &Path {
        self.executor
            .config()
            .temp_dir
            .as_deref()
            .expect("temp dir is always set in tests")
    }

    /// Number of files left in the artifact directory
    pub fn leftover_artifacts(&self) -> usize {
        fs::read_dir(self.artifact_dir()).unwrap().count()
    }
}

/// Configuration with `/bin/sh` as interpreter and short limits.
/// `setup` can change it before the executor is built.
pub fn shell_sandbox<F>(setup: F) -> ShellSandbox
where
    F: FnOnce(&mut ExecutorConfiguration),
{
    let temp = TempDir::new().unwrap();

    let mut config = ExecutorConfiguration::default();
    config
        .interpreter(vec!["/bin/sh"])
        .working_directory(temp.path())
        .temp_dir(temp.path().join("artifacts"))
        .timeout_ms(5_000)
        .max_output_bytes(1_000);
    setup(&mut config);

    let executor =
        Executor::with_harness(config, Box::new(PassthroughHarness::new("sh"))).unwrap();

    ShellSandbox { executor, temp }
}
