// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::monitor::KillReason;
use crate::Result;

/// Identifier of a job, also the name of its artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }

    /// File name of the artifact of this job
    pub fn artifact_name(&self, extension: &str) -> String {
        format!("{}.{}", self, extension)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Spawned,
    Running,
    Completed,
    Killed(KillReason),
    SpawnFailed,
    Cleaned,
}

/// The temporary source file of a job.
///
/// The file is created exclusively, so two jobs never share one. It is
/// removed by [`Artifact::close`] or, failing that, when dropped.
#[derive(Debug)]
pub struct Artifact {
    file: NamedTempFile,
}

impl Artifact {
    /// Write `source` to `<dir>/<id>.<extension>`
    pub fn create(dir: &Path, id: JobId, extension: &str, source: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(&id.artifact_name(extension))
            .rand_bytes(0)
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create artifact in {}", dir.display()))?;

        file.write_all(source.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write artifact {}", file.path().display()))?;

        Ok(Artifact { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file from disk
    pub fn close(self) -> Result<()> {
        let path = self.file.path().to_owned();
        self.file
            .close()
            .with_context(|| format!("Failed to remove artifact {}", path.display()))
    }
}

/// One execution attempt of one submission
#[derive(Debug)]
pub struct SandboxJob {
    pub id: JobId,
    state: JobState,
}

impl SandboxJob {
    pub fn new() -> Self {
        let job = SandboxJob {
            id: JobId::new(),
            state: JobState::Created,
        };
        debug!("Job {} created", job.id);
        job
    }

    #[cfg(test)]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move the job to `state`. Nothing leaves `Cleaned`.
    pub fn transition(&mut self, state: JobState) {
        if self.state == JobState::Cleaned {
            warn!("Job {} is already cleaned, ignoring {:?}", self.id, state);
            return;
        }
        trace!("Job {}: {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
    }
}

impl Default for SandboxJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_artifact_lifecycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let job = SandboxJob::new();

        let artifact = Artifact::create(dir.path(), job.id, "ts", "console.log(1)").unwrap();
        let name = format!("{}.ts", job.id);
        assert_eq!(job.id.artifact_name("ts"), name);
        assert_eq!(artifact.path(), dir.path().join(&name));
        assert_eq!(fs::read_to_string(artifact.path()).unwrap(), "console.log(1)");

        artifact.close().unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_artifact_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let _artifact = Artifact::create(dir.path(), JobId::new(), "sh", "true").unwrap();
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_artifact_is_exclusive() {
        let dir = tempfile::TempDir::new().unwrap();
        let id = JobId::new();
        let _first = Artifact::create(dir.path(), id, "ts", "a").unwrap();
        assert!(Artifact::create(dir.path(), id, "ts", "b").is_err());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(Artifact::create(&missing, JobId::new(), "ts", "a").is_err());
    }

    #[test]
    fn test_cleaned_is_terminal() {
        let mut job = SandboxJob::new();
        job.transition(JobState::Spawned);
        job.transition(JobState::Running);
        job.transition(JobState::Completed);
        job.transition(JobState::Cleaned);
        job.transition(JobState::Running);
        assert_eq!(job.state(), JobState::Cleaned);
    }

    #[test]
    fn test_unique_ids() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
