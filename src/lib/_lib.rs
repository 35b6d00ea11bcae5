//! # minimake
//!
//! This is the library component of `minimake`, a minimal implementation of `make`. It is
//! generally oriented towards the main binary of this crate, but should be designed to be usable
//! by other applications.

mod context;
mod error;
mod expand;
mod logger;
mod makefile;
mod vars;

pub use context::Context;
pub use error::MakeError;
pub use expand::expand;
pub use logger::{DefaultLogger, Logger};
pub use makefile::{Makefile, Opts, PatternRule, Rule};
pub use vars::{Env, Flavor, Var, Vars};
