// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

//! Generation of the source file actually given to the interpreter.

use crate::configuration::ExecutorConfiguration;

/// Exit code of the harness when the log buffer went over the limit. The
/// runner treats it as a killed job.
pub const HARNESS_OVERFLOW_EXIT_CODE: i32 = 86;

/// Placeholders of [`TYPESCRIPT_TEMPLATE`]
const PRELUDE_PLACEHOLDER: &str = "__TSBOX_PRELUDE__";
const LIMIT_PLACEHOLDER: &str = "__TSBOX_LIMIT__";
const EXIT_CODE_PLACEHOLDER: &str = "__TSBOX_EXIT_CODE__";
const CODE_PLACEHOLDER: &str = "__TSBOX_USER_CODE__";

/// Wraps the user code into something the interpreter can run
pub trait Harness: Send + Sync {
    /// Extension of the generated file, without dot
    fn extension(&self) -> &str;

    /// Build the source of the artifact
    fn wrap(&self, code: &str, config: &ExecutorConfiguration) -> String;
}

/// Every job gets its own sink, created by `__tsboxLogSink` and handed to the
/// entry point. `console.log` only forwards to it.
const TYPESCRIPT_TEMPLATE: &str = r#"__TSBOX_PRELUDE__

const __tsboxLogSink = (limit: number) => {
  const lines: string[] = [];
  let size = 0;
  let overflowed = false;
  return {
    push(...args: unknown[]) {
      if (overflowed) return;
      const msg = args
        .map((a) => (typeof a === "object" && a !== null ? JSON.stringify(a, null, 2) : String(a)))
        .join(" ");
      size += (lines.length > 0 ? 1 : 0) + msg.length;
      lines.push(msg);
      if (size > limit) {
        overflowed = true;
        lines.length = 0;
        throw new Error("Output size limit exceeded");
      }
    },
    flush() {
      if (overflowed) {
        process.exit(__TSBOX_EXIT_CODE__);
      }
      process.stdout.write(lines.join("\n"));
    },
  };
};

(async (sink: ReturnType<typeof __tsboxLogSink>) => {
  console.log = (...args: unknown[]) => sink.push(...args);
  try {
__TSBOX_USER_CODE__
  } catch (e: unknown) {
    const err = e as Error;
    try {
      console.log("Error:", (err && err.message) || String(e));
    } catch {}
  }
  sink.flush();
})(__tsboxLogSink(__TSBOX_LIMIT__));
"#;

/// Harness for TypeScript snippets run by `tsx` or a compatible loader
#[derive(Debug, Clone, Default)]
pub struct TypeScriptHarness;

impl Harness for TypeScriptHarness {
    fn extension(&self) -> &str {
        "ts"
    }

    fn wrap(&self, code: &str, config: &ExecutorConfiguration) -> String {
        // Substituted last so the user code can not inject placeholders
        TYPESCRIPT_TEMPLATE
            .replacen(PRELUDE_PLACEHOLDER, &config.prelude, 1)
            .replacen(LIMIT_PLACEHOLDER, &config.max_output_bytes.to_string(), 1)
            .replacen(
                EXIT_CODE_PLACEHOLDER,
                &HARNESS_OVERFLOW_EXIT_CODE.to_string(),
                1,
            )
            .replacen(CODE_PLACEHOLDER, &indent(code, 4), 1)
    }
}

/// Harness writing the code as it is, for interpreters that do their own
/// output handling
#[derive(Debug, Clone)]
pub struct PassthroughHarness {
    extension: String,
}

impl PassthroughHarness {
    pub fn new<S: Into<String>>(extension: S) -> Self {
        PassthroughHarness {
            extension: extension.into(),
        }
    }
}

impl Harness for PassthroughHarness {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn wrap(&self, code: &str, _config: &ExecutorConfiguration) -> String {
        code.to_owned()
    }
}

/// Indent every line of `code` by `width` spaces
fn indent(code: &str, width: usize) -> String {
    let padding = " ".repeat(width);
    code.split('\n')
        .map(|line| format!("{}{}", padding, line))
        .collect::<Vec<_>>()
        .join("\n")
}
