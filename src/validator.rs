// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! Static scan of the submitted source.
//!
//! This is a denylist over the literal text: string concatenation, alternate
//! quoting and indirect references all get through. It only avoids spawning
//! a process for the obvious cases, the subprocess limits are what contain
//! the code.

use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Generic message for every denylist match
pub const BLOCKED_PATTERN_MESSAGE: &str = "Blocked pattern detected in code";

/// Modules that can not be imported, in any import syntax
const BLOCKED_MODULES: &[&str] = &["child_process", "fs", "fs/promises", "vm"];

lazy_static! {
    static ref BLOCKED_PATTERNS: RegexSet = {
        let mut patterns = Vec::new();
        for module in BLOCKED_MODULES {
            let module = format!(r#"['"](?:node:)?{}['"]"#, regex::escape(module));
            patterns.push(format!(r"require\s*\(\s*{}\s*\)", module));
            patterns.push(format!(r"import\s+.*from\s+{}", module));
            patterns.push(format!(r"import\s*\(\s*{}\s*\)", module));
        }
        patterns.push(r"process\.env".to_string());
        patterns.push(r"eval\s*\(".to_string());
        patterns.push(r"Function\s*\(".to_string());
        patterns.push(r"vm\.".to_string());
        // The patterns are fixed, failing here is a programming error
        RegexSet::new(patterns).expect("invalid blocked pattern")
    };
}

/// Outcome of the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn accepted() -> Self {
        ValidationResult {
            valid: true,
            error: None,
        }
    }

    fn rejected<S: Into<String>>(error: S) -> Self {
        ValidationResult {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Scan `code`, rejecting it if longer than `max_length` characters or if it
/// matches any blocked pattern. The matched pattern is not reported.
pub fn validate(code: &str, max_length: usize) -> ValidationResult {
    if code.chars().count() > max_length {
        return ValidationResult::rejected(format!(
            "Code too long (max {} characters)",
            max_length
        ));
    }

    if BLOCKED_PATTERNS.is_match(code) {
        debug!(
            "Source rejected by patterns {:?}",
            BLOCKED_PATTERNS.matches(code).into_iter().collect::<Vec<_>>()
        );
        return ValidationResult::rejected(BLOCKED_PATTERN_MESSAGE);
    }

    ValidationResult::accepted()
}
