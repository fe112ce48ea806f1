// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! End to end tests with the real harness. They need `npx tsx` in the PATH
//! and pass without doing anything when it is missing.

use std::process::{Command, Stdio};
use std::sync::OnceLock;

use tempfile::TempDir;

use crate::configuration::ExecutorConfiguration;
use crate::result::{ExecutionResult, RESOURCE_EXCEEDED_MESSAGE};
use crate::runner::Executor;

/// Whether `npx tsx` can be started on this machine, checked once
fn tsx_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let available = Command::new("npx")
            .args(["--no-install", "tsx", "--version"])
            .stdin(Stdio::null())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !available {
            eprintln!("npx tsx not found, skipping TypeScript tests");
        }
        available
    })
}

/// Run `code` with the default interpreter, `None` if tsx is missing
fn run_typescript(code: &str, max_output_bytes: usize) -> Option<ExecutionResult> {
    if !tsx_available() {
        return None;
    }
    let temp = TempDir::new().unwrap();
    let mut config = ExecutorConfiguration::default();
    config
        .temp_dir(temp.path())
        .max_output_bytes(max_output_bytes);

    let executor = Executor::new(config).unwrap();
    let result = executor.execute(code);
    eprintln!("Result = {:?}", result);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    Some(result)
}

#[test]
fn test_hello() {
    let Some(result) = run_typescript(r#"console.log("hello")"#, 50_000) else {
        return;
    };
    assert_eq!(result.stdout, "hello");
    assert_eq!(result.stderr_str(), "");
}

#[test]
fn test_objects_and_await() {
    let Some(result) = run_typescript(
        "const v: number = await Promise.resolve(2);\nconsole.log('v', v, { a: 1 });",
        50_000,
    ) else {
        return;
    };
    assert_eq!(result.stdout, "v 2 {\n  \"a\": 1\n}");
}

#[test]
fn test_exception() {
    let Some(result) = run_typescript(
        "console.log('before');\nthrow new Error('boom');",
        50_000,
    ) else {
        return;
    };
    assert_eq!(result.stdout, "before\nError: boom");
}

#[test]
fn test_log_overflow() {
    let Some(result) = run_typescript("console.log('x'.repeat(2000));", 1_000) else {
        return;
    };
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr_str(), RESOURCE_EXCEEDED_MESSAGE);
}
