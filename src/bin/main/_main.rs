//! # minimake
//!
//! This is a minimal implementation of `make`, written in Rust. The binary is thin glue: it
//! parses arguments, finds the makefile, and hands `{makefile_path, targets, options}` to the
//! library, mapping the result to an exit code.

mod args;

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use args::Args;

use minimake::{Context, DefaultLogger, Env, Logger, Makefile};

/// An ordered list of filenames used to search for a makefile.
const MAKEFILE_SEARCH: [&str; 3] = ["GNUmakefile", "makefile", "Makefile"];

/// Search the current directory for a makefile to execute.
fn find_makefile() -> Option<PathBuf> {
    for file in MAKEFILE_SEARCH {
        if Path::new(file).is_file() {
            return Some(PathBuf::from(file));
        }
    }

    None
}

/// Print an error message and exit with code 1.
fn exit_with(msg: impl AsRef<str>, logger: &DefaultLogger, context: Option<&Context>) -> ! {
    logger.error(msg, context);
    std::process::exit(1)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let logger = DefaultLogger {};

    // Change to another directory, if specified by the arguments.
    let original_dir = match &args.directory {
        None => None,
        Some(dir) => {
            // Remember the current directory to return to.
            let cwd = env::current_dir()
                .unwrap_or_else(|e| exit_with(format!("Failed to get cwd ({}).", e), &logger, None));

            env::set_current_dir(dir)
                .unwrap_or_else(|e| exit_with(format!("Chdir to '{}' failed: {}.", dir, e), &logger, None));

            Some(cwd)
        }
    };

    // Determine the makefile to read.
    let makefile_path = match args.file {
        None => find_makefile().unwrap_or_else(|| exit_with("No makefile found.", &logger, None)),
        Some(ref file) => PathBuf::from(file),
    };

    // Parse the makefile, with variables seeded from the environment.
    let question = args.question;
    let targets = args.targets.clone();
    let makefile = match Makefile::new(
        makefile_path,
        args.into(),
        Box::new(DefaultLogger {}),
        env::vars().collect::<Env>().into(),
    ) {
        Err(e) => exit_with(e.msg, &logger, Some(&e.context)),
        Ok(m) => m,
    };

    // Execute the makefile.
    let rebuilt = match makefile.execute(targets) {
        Err(e) => exit_with(e.msg, &logger, Some(&e.context)),
        Ok(rebuilt) => rebuilt,
    };

    // Go back to the original directory, if we changed directory previously.
    if let Some(cwd) = original_dir {
        env::set_current_dir(&cwd)
            .unwrap_or_else(|e| exit_with(format!("Chdir back failed: {}.", e), &logger, None));
    }

    // In question mode the exit code reports whether anything needed rebuilding.
    if question {
        return ExitCode::from(u8::from(rebuilt));
    }

    if !rebuilt {
        logger.info("Nothing to be done.");
    }
    ExitCode::SUCCESS
}
