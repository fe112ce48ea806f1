// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

use super::util::*;
use crate::validator::BLOCKED_PATTERN_MESSAGE;

#[test]
fn test_blocked_code_is_not_run() {
    let sandbox = shell_sandbox(|_| {});
    let marker = sandbox.temp.path().join("marker");

    // Valid shell, but the comment matches the denylist
    let result = sandbox.run(&format!(
        "touch {} # require('child_process')",
        marker.display()
    ));

    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr_str(), BLOCKED_PATTERN_MESSAGE);
    assert!(!marker.exists());
    assert_eq!(sandbox.leftover_artifacts(), 0);
}

#[test]
fn test_every_blocked_pattern() {
    let sandbox = shell_sandbox(|_| {});

    for code in &[
        r#"import { execSync } from "child_process";"#,
        r#"const fs = require("fs");"#,
        r#"const m = await import("node:vm");"#,
        "console.log(process.env)",
        "eval('1')",
        "Function('return this')()",
        "vm.runInNewContext('1')",
    ] {
        let result = sandbox.run(code);
        assert_eq!(result.stdout, "", "{}", code);
        assert_eq!(result.stderr_str(), BLOCKED_PATTERN_MESSAGE, "{}", code);
    }
    assert_eq!(sandbox.leftover_artifacts(), 0);
}

#[test]
fn test_source_too_long() {
    let sandbox = shell_sandbox(|config| {
        config.max_source_length(20);
    });

    let result = sandbox.run("printf 'this is longer than twenty'");

    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr_str(), "Code too long (max 20 characters)");
}

#[test]
fn test_unique_artifact_per_job() {
    let sandbox = shell_sandbox(|_| {});

    // Each job sees only its own artifact, named after a fresh uuid
    let first = sandbox.run("basename \"$0\"");
    let second = sandbox.run("basename \"$0\"");

    assert!(first.stdout.trim().ends_with(".sh"));
    assert_eq!(first.stdout.trim().len(), 36 + 3);
    assert_ne!(first.stdout, second.stdout);
}
