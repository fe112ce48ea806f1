// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Name of the artifact directory created inside the working directory when
/// no explicit temp directory is configured.
pub const DEFAULT_TEMP_DIR_NAME: &str = ".temp";

/// struct that represents the configuration parameters
/// of an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfiguration {
    /// Wall time limit for one job, in milliseconds
    pub timeout_ms: u64,

    /// Limit for the captured output of a job, in bytes. Applies to the
    /// harness log buffer and to stdout and stderr independently.
    pub max_output_bytes: usize,

    /// Heap ceiling of the interpreter, in megabytes
    pub max_heap_mb: u64,

    /// Directory holding the temporary source files
    pub temp_dir: Option<PathBuf>,

    /// Working directory of the interpreter
    pub working_directory: PathBuf,

    /// Interpreter command line, the artifact path is appended to it
    pub interpreter: Vec<String>,

    /// Maximum length of the submitted code, in characters
    pub max_source_length: usize,

    /// Pass the environment of this process to the interpreter
    pub inherit_env: bool,

    /// Additional environment for the interpreter
    pub env: Vec<(String, String)>,

    /// Variables never passed to the interpreter
    pub env_blocklist: Vec<String>,

    /// Text inserted at the top of every generated source file
    pub prelude: String,
}

impl Default for ExecutorConfiguration {
    fn default() -> Self {
        ExecutorConfiguration {
            timeout_ms: 30_000,
            max_output_bytes: 50_000,
            max_heap_mb: 128,
            temp_dir: None,
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            interpreter: vec!["npx".into(), "tsx".into()],
            max_source_length: 10_000,
            inherit_env: true,
            env: vec![],
            env_blocklist: vec!["EXECUTOR_API_KEY".into()],
            prelude: String::new(),
        }
    }
}

impl ExecutorConfiguration {
    /// Load a configuration from a JSON file. Missing keys keep their default.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration {}", path.display()))
    }

    /// Check that the configuration can actually run something
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.is_empty() || self.interpreter[0].is_empty() {
            bail!("The interpreter command is empty");
        }
        if self.timeout_ms == 0 {
            bail!("timeoutMs must be greater than zero");
        }
        if self.max_output_bytes == 0 {
            bail!("maxOutputBytes must be greater than zero");
        }
        if self.max_heap_mb == 0 {
            bail!("maxHeapMb must be greater than zero");
        }
        Ok(())
    }

    /// The directory where artifacts are written
    pub fn resolved_temp_dir(&self) -> PathBuf {
        match &self.temp_dir {
            Some(dir) => dir.clone(),
            None => self.working_directory.join(DEFAULT_TEMP_DIR_NAME),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the wall time limit, in milliseconds
    pub fn timeout_ms(&mut self, timeout_ms: u64) -> &mut Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the output limit, in **bytes**
    pub fn max_output_bytes(&mut self, max_output_bytes: usize) -> &mut Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Set the interpreter heap limit, in megabytes
    pub fn max_heap_mb(&mut self, max_heap_mb: u64) -> &mut Self {
        self.max_heap_mb = max_heap_mb;
        self
    }

    /// Set the artifact directory
    pub fn temp_dir<P: Into<PathBuf>>(&mut self, temp_dir: P) -> &mut Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Set the working directory
    pub fn working_directory<P: Into<PathBuf>>(&mut self, working_directory: P) -> &mut Self {
        self.working_directory = working_directory.into();
        self
    }

    /// Replace the interpreter command line
    pub fn interpreter<I, S>(&mut self, command: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreter = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum source length, in characters
    pub fn max_source_length(&mut self, max_source_length: usize) -> &mut Self {
        self.max_source_length = max_source_length;
        self
    }

    /// Inherit the environment of this process or start from an empty one
    pub fn inherit_env(&mut self, value: bool) -> &mut Self {
        self.inherit_env = value;
        self
    }

    /// Add a variable to the environment
    pub fn env<S: Into<String>, T: Into<String>>(&mut self, variable: S, value: T) -> &mut Self {
        self.env.push((variable.into(), value.into()));
        self
    }

    /// Never pass this variable to the interpreter
    pub fn block_env<S: Into<String>>(&mut self, variable: S) -> &mut Self {
        self.env_blocklist.push(variable.into());
        self
    }

    /// Set the prelude
    pub fn prelude<S: Into<String>>(&mut self, prelude: S) -> &mut Self {
        self.prelude = prelude.into();
        self
    }
}
