// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
// SPDX-License-Identifier: MPL-2.0

#[macro_use]
extern crate log;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

use anyhow::Context;
use signal_hook::iterator::Signals;
use structopt::StructOpt;
use tsbox::{Executor, ExecutorConfiguration, PassthroughHarness, TypeScriptHarness};

/// Last SIGINT or SIGTERM received, zero if none
static STOP_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Command line arguments of the program
#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "tsbox",
    about = "Run a TypeScript snippet with time and output limits",
    setting = structopt::clap::AppSettings::ColoredHelp)
]
struct Args {
    /// File with the code to run, standard input if missing
    source: Option<PathBuf>,

    /// JSON configuration file
    #[structopt(long, short)]
    config: Option<PathBuf>,

    /// Wall time limit, in milliseconds
    #[structopt(long, short)]
    timeout_ms: Option<u64>,

    /// Output limit, in bytes
    #[structopt(long)]
    max_output_bytes: Option<usize>,

    /// Heap limit of the interpreter, in megabytes
    #[structopt(long, short)]
    max_heap_mb: Option<u64>,

    /// Directory for the temporary source files
    #[structopt(long)]
    temp_dir: Option<PathBuf>,

    /// Working directory of the interpreter
    #[structopt(long)]
    working_directory: Option<PathBuf>,

    /// Interpreter command line, split on whitespace
    #[structopt(long)]
    interpreter: Option<String>,

    /// File inserted at the top of the generated source
    #[structopt(long)]
    prelude: Option<PathBuf>,

    /// Give the code to the interpreter as it is, without the harness
    #[structopt(long)]
    raw: bool,

    /// Extension of the source file in raw mode
    #[structopt(long, default_value = "js")]
    extension: String,

    /// output in JSON format
    #[structopt(long, short)]
    json: bool,
}

fn main() {
    env_logger::init();

    match run(Args::from_args()) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run the program, returning the exit code
fn run(args: Args) -> tsbox::Result<i32> {
    let mut config = match &args.config {
        Some(path) => ExecutorConfiguration::from_file(path)?,
        None => ExecutorConfiguration::default(),
    };

    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms(timeout_ms);
    }

    if let Some(max_output_bytes) = args.max_output_bytes {
        config.max_output_bytes(max_output_bytes);
    }

    if let Some(max_heap_mb) = args.max_heap_mb {
        config.max_heap_mb(max_heap_mb);
    }

    if let Some(temp_dir) = args.temp_dir {
        config.temp_dir(temp_dir);
    }

    if let Some(working_directory) = args.working_directory {
        config.working_directory(working_directory);
    }

    if let Some(interpreter) = &args.interpreter {
        config.interpreter(interpreter.split_whitespace());
    }

    if let Some(prelude) = &args.prelude {
        let prelude = std::fs::read_to_string(prelude)
            .with_context(|| format!("Failed to read prelude {}", prelude.display()))?;
        config.prelude(prelude);
    }

    let code = match &args.source {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut code = String::new();
            io::stdin()
                .read_to_string(&mut code)
                .context("Failed to read the code from stdin")?;
            code
        }
    };

    trace!("Executor config {:#?}", config);

    let executor = if args.raw {
        Executor::with_harness(config, Box::new(PassthroughHarness::new(args.extension)))?
    } else {
        Executor::with_harness(config, Box::new(TypeScriptHarness))?
    };

    // Kill the running job when we are asked to stop. The executor then
    // returns normally and removes the artifact before we exit.
    let signals = Signals::new(&[signal_hook::SIGINT, signal_hook::SIGTERM])
        .context("Failed to register signal handlers")?;
    thread::Builder::new()
        .name("Signal handler".into())
        .spawn(move || {
            for signal in signals.forever() {
                info!("Received signal {}", signal);
                STOP_SIGNAL.store(signal, Ordering::SeqCst);
                tsbox::kill_all_jobs();
            }
        })
        .context("Failed to start signal handler thread")?;

    let result = executor.execute(&code);

    let signal = STOP_SIGNAL.load(Ordering::SeqCst);
    if signal != 0 {
        return Ok(128 + signal);
    }

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        let mut stdout = io::stdout();
        stdout.write_all(result.stdout.as_bytes())?;
        stdout.flush()?;
        eprint!("{}", result.stderr_str());
    }
    Ok(0)
}
