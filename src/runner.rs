// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! Execution of one submission in a limited subprocess

use std::fs;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Context};

use crate::configuration::ExecutorConfiguration;
use crate::error::SandboxError;
use crate::harness::{Harness, TypeScriptHarness, HARNESS_OVERFLOW_EXIT_CODE};
use crate::job::{Artifact, JobState, SandboxJob};
use crate::monitor::{spawn_output_reader, KillReason, KillSwitch, TimeoutWatcher};
use crate::result::ExecutionResult;
use crate::util::{setup_child, truncate_utf8, wait_exited};
use crate::validator::validate;
use crate::Result;

/// Runs submissions, one subprocess each. Safe to share between threads:
/// every call to [`Executor::execute`] owns all of its state.
pub struct Executor {
    config: ExecutorConfiguration,
    harness: Box<dyn Harness>,
}

/// What a finished subprocess left behind
struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    killed: Option<KillReason>,
}

impl Executor {
    /// Executor for TypeScript with the given configuration
    pub fn new(config: ExecutorConfiguration) -> Result<Self> {
        Self::with_harness(config, Box::new(TypeScriptHarness))
    }

    /// Executor using a custom harness
    pub fn with_harness(config: ExecutorConfiguration, harness: Box<dyn Harness>) -> Result<Self> {
        config.validate()?;
        let temp_dir = config.resolved_temp_dir();
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Failed to create temp directory {}", temp_dir.display()))?;
        trace!("Executor created with config {:?}", config);
        Ok(Executor { config, harness })
    }

    pub fn config(&self) -> &ExecutorConfiguration {
        &self.config
    }

    /// Run `code` and return what it logged. Never fails: every problem ends
    /// up in the `stderr` of the result.
    pub fn execute(&self, code: &str) -> ExecutionResult {
        let validation = validate(code, self.config.max_source_length);
        if !validation.valid {
            let message = validation.error.unwrap_or_default();
            info!("Submission rejected: {}", message);
            return SandboxError::ValidationRejected(message).into();
        }

        let mut job = SandboxJob::new();
        let start_time = Instant::now();
        let result = match self.run_job(&mut job, code) {
            Ok(result) => result,
            Err(err) => err.into(),
        };
        job.transition(JobState::Cleaned);

        debug!(
            "Job {} done in {:.3}s, stdout {} bytes",
            job.id,
            start_time.elapsed().as_secs_f64(),
            result.stdout.len()
        );
        result
    }

    /// Everything between validation and the result. The artifact is removed
    /// before returning, whatever the outcome.
    fn run_job(
        &self,
        job: &mut SandboxJob,
        code: &str,
    ) -> std::result::Result<ExecutionResult, SandboxError> {
        let source = self.harness.wrap(code, &self.config);
        let artifact = Artifact::create(
            &self.config.resolved_temp_dir(),
            job.id,
            self.harness.extension(),
            &source,
        )
        .map_err(SandboxError::Internal)?;

        let outcome = self.supervise(job, &artifact);

        if let Err(e) = artifact.close() {
            error!("Job {}: {:#}", job.id, e);
        }

        let captured = outcome?;
        if let Some(reason) = captured.killed {
            return Err(SandboxError::ResourceExceeded(reason));
        }
        if captured.status.code() == Some(HARNESS_OVERFLOW_EXIT_CODE) {
            info!("Job {}: harness log buffer overflowed", job.id);
            return Err(SandboxError::ResourceExceeded(KillReason::StdoutLimit));
        }
        if let Some(signal) = captured.status.signal() {
            debug!("Job {} terminated by signal {}", job.id, signal);
        }

        let mut stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
        truncate_utf8(&mut stdout, self.config.max_output_bytes);
        let stderr = String::from_utf8_lossy(&captured.stderr).into_owned();
        Ok(ExecutionResult::completed(stdout, stderr))
    }

    /// Spawn the interpreter on `artifact` and wait for it under the limits
    fn supervise(
        &self,
        job: &mut SandboxJob,
        artifact: &Artifact,
    ) -> std::result::Result<Captured, SandboxError> {
        let mut command = self.command(artifact);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Job {}: failed to spawn {:?}: {}", job.id, command, e);
                job.transition(JobState::SpawnFailed);
                return Err(SandboxError::SpawnFailure(e));
            }
        };
        job.transition(JobState::Spawned);

        let switch = Arc::new(KillSwitch::new(child.id() as i32));
        let watchers = self.start_watchers(&mut child, &switch);
        let (timeout, stdout_reader, stderr_reader) = match watchers {
            Ok(watchers) => watchers,
            Err(e) => {
                // Without watchers the child can not be left running
                switch.trigger(KillReason::Timeout);
                let _ = child.wait();
                return Err(SandboxError::Internal(e));
            }
        };
        job.transition(JobState::Running);

        // The leader stays a zombie until every watcher is disarmed, so
        // the group id they kill can not be recycled under them.
        let exited = wait_exited(child.id() as i32);
        // Readers end when every process holding the pipes is gone. The
        // timeout is still armed in case some grandchild keeps them open.
        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        timeout.cancel();
        switch.disarm();

        if let Err(e) = exited {
            warn!("Job {}: waitid failed: {}", job.id, e);
        }
        let status = child
            .wait()
            .map_err(|e| SandboxError::Internal(anyhow!(e).context("Failed to wait the child")))?;

        let killed = switch.fired();
        match killed {
            Some(reason) => job.transition(JobState::Killed(reason)),
            None => job.transition(JobState::Completed),
        }

        Ok(Captured {
            status,
            stdout,
            stderr,
            killed,
        })
    }

    #[allow(clippy::type_complexity)]
    fn start_watchers(
        &self,
        child: &mut Child,
        switch: &Arc<KillSwitch>,
    ) -> Result<(TimeoutWatcher, JoinHandle<Vec<u8>>, JoinHandle<Vec<u8>>)> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Child stdout is not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Child stderr is not piped"))?;

        let timeout = TimeoutWatcher::start(self.config.timeout(), switch.clone())?;
        let stdout_reader = spawn_output_reader(
            "Stdout watcher",
            stdout,
            self.config.max_output_bytes,
            switch.clone(),
            KillReason::StdoutLimit,
        )?;
        let stderr_reader = spawn_output_reader(
            "Stderr watcher",
            stderr,
            self.config.max_output_bytes,
            switch.clone(),
            KillReason::StderrLimit,
        )?;
        Ok((timeout, stdout_reader, stderr_reader))
    }

    /// Build the interpreter command for `artifact`
    fn command(&self, artifact: &Artifact) -> Command {
        let config = &self.config;
        let mut command = Command::new(&config.interpreter[0]);

        command
            .args(&config.interpreter[1..])
            .arg(artifact.path())
            .current_dir(&config.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        if !config.inherit_env {
            command.env_clear();
        }
        for variable in &config.env_blocklist {
            command.env_remove(variable);
        }
        command
            .env("NODE_NO_WARNINGS", "1")
            .env(
                "NODE_OPTIONS",
                format!("--max-old-space-size={}", config.max_heap_mb),
            )
            .envs(config.env.iter().map(|(k, v)| (k, v)));

        unsafe {
            // This code get executed after the fork() and before the exec()
            command.pre_exec(setup_child);
        }

        command
    }
}

fn join_reader(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    reader.join().unwrap_or_else(|_| {
        error!("Output reader panicked");
        Vec::new()
    })
}
