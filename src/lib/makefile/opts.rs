//! Options available for makefiles.

#[derive(Debug, Default)]
pub struct Opts {
    /// Don't execute recipes; just print them.
    pub dry_run: bool,

    /// Don't echo recipes before running them.
    pub silent: bool,

    /// Keep going when some targets can't be made.
    pub keep_going: bool,

    /// Ignore errors from recipes.
    pub ignore_errors: bool,

    /// Unconditionally make all targets.
    pub always_make: bool,

    /// Don't run anything; only compute whether targets need rebuilding.
    pub question_only: bool,
}
