//! This module provides the `clap`-based `Args` struct and its conversion into the run options
//! consumed by the core.

use clap::Parser;
use const_format::formatcp;

use minimake::Opts;

/// Represents the `clap`-based arguments provided by this binary.
#[derive(Clone, Debug, Parser)]
#[clap(
    name = "minimake",
    version,
    about,
    after_help = formatcp!("License:  {}", env!("CARGO_PKG_LICENSE")),
)]
pub struct Args {
    /// Target(s) (if none specified, use the first regular target).
    #[arg()]
    pub targets: Vec<String>,

    /// Read FILE as the makefile.
    #[arg(short, long, visible_alias("makefile"))]
    pub file: Option<String>,

    /// Change to DIR before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<String>,

    /// Don't execute recipes; just print them.
    #[arg(
        short = 'n',
        long = "dry-run",
        visible_alias("just-print"),
        visible_alias("recon")
    )]
    pub dry_run: bool,

    /// Don't echo recipes.
    #[arg(short, long, visible_alias("quiet"))]
    pub silent: bool,

    /// Keep going when some targets can't be made.
    #[arg(short, long)]
    pub keep_going: bool,

    /// Ignore errors from recipes.
    #[arg(short, long)]
    pub ignore_errors: bool,

    /// Unconditionally make all targets.
    #[arg(short = 'B', long)]
    pub always_make: bool,

    /// Don't run anything; exit 0 if everything is up to date, 1 otherwise.
    #[arg(short, long)]
    pub question: bool,
}

impl From<Args> for Opts {
    fn from(args: Args) -> Self {
        Self {
            dry_run: args.dry_run,
            silent: args.silent,
            keep_going: args.keep_going,
            ignore_errors: args.ignore_errors,
            always_make: args.always_make,
            question_only: args.question,
        }
    }
}
