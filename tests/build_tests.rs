//! End-to-end tests: parse a real makefile from disk and execute it against a temporary
//! directory, asserting the rebuild flag and the commands' filesystem effects.
//!
//! Every target, prerequisite, and command path is absolute, so the tests neither change the
//! process working directory nor interfere with each other.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use tempfile::TempDir;

use minimake::{DefaultLogger, Logger, Makefile, Opts, Vars};

/// A logger that records both channels for assertions.
#[derive(Clone, Default)]
struct CaptureLogger {
    out: Arc<Mutex<Vec<String>>>,
    err: Arc<Mutex<Vec<String>>>,
}

impl Logger for CaptureLogger {
    fn write_out(&self, msg: String) {
        self.out.lock().unwrap().push(msg);
    }

    fn write_err(&self, msg: String) {
        self.err.lock().unwrap().push(msg);
    }
}

/// Absolute path to `name` inside the test directory, as a string.
fn path_in(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).display().to_string()
}

/// Write the makefile into the test directory and parse it.
fn parse<L: Logger>(dir: &TempDir, content: &str, opts: Opts, logger: L) -> Makefile<L> {
    let path = dir.path().join("Makefile");
    fs::write(&path, content).unwrap();
    Makefile::new(path, opts, Box::new(logger), Vars::new([])).unwrap()
}

#[test]
fn builds_missing_target_then_reports_up_to_date() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "hello.c");
    let target = path_in(&dir, "hello");
    fs::write(&source, "int main() {}\n").unwrap();

    let makefile = parse(
        &dir,
        &format!("{target}: {source}\n\ttouch $@\n"),
        Opts::default(),
        DefaultLogger {},
    );

    // First run: the target is missing, so it is built.
    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert!(PathBuf::from(&target).exists());

    // Second run: the target is at least as new as its dependency.
    assert!(!makefile.execute(vec![target]).unwrap());
}

#[test]
fn rebuilds_when_dependency_is_newer() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "in.txt");
    let target = path_in(&dir, "out.txt");
    let marker = path_in(&dir, "marker");

    fs::write(&target, "stale\n").unwrap();
    // Some file systems only have second-granularity timestamps.
    sleep(Duration::from_millis(1100));
    fs::write(&source, "fresh\n").unwrap();

    let makefile = parse(
        &dir,
        &format!("{target}: {source}\n\ttouch {marker}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target]).unwrap());
    assert!(PathBuf::from(&marker).exists());
}

#[test]
fn phony_target_always_runs() {
    let dir = TempDir::new().unwrap();
    let clean = path_in(&dir, "clean");
    let marker = path_in(&dir, "marker");

    // The file exists and is up to date; phony ignores that.
    fs::write(&clean, "").unwrap();

    let makefile = parse(
        &dir,
        &format!(".PHONY: {clean}\n{clean}:\n\ttouch {marker}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![clean]).unwrap());
    assert!(PathBuf::from(&marker).exists());
}

#[test]
fn order_only_prerequisite_does_not_trigger_rebuild() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "in.txt");
    let target = path_in(&dir, "out.txt");
    let extra = path_in(&dir, "extra");
    let marker = path_in(&dir, "marker");

    fs::write(&source, "").unwrap();
    fs::write(&target, "").unwrap();
    fs::write(&extra, "").unwrap();

    // Without the order-only prerequisite the target is up to date; adding one whose file exists
    // must not change that.
    let makefile = parse(
        &dir,
        &format!("{target}: {source} | {extra}\n\ttouch {marker}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(!makefile.execute(vec![target]).unwrap());
    assert!(!PathBuf::from(&marker).exists());
}

#[test]
fn order_only_prerequisite_is_built_but_staleness_is_discarded() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");
    let generated = path_in(&dir, "generated");

    fs::write(&target, "").unwrap();

    let makefile = parse(
        &dir,
        &format!("{target}: | {generated}\n\ttouch {target}.rebuilt\n{generated}:\n\ttouch {generated}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    // The order-only prerequisite gets built, but the target itself stays fresh.
    assert!(!makefile.execute(vec![target.clone()]).unwrap());
    assert!(PathBuf::from(&generated).exists());
    assert!(!PathBuf::from(format!("{target}.rebuilt")).exists());
}

#[test]
fn default_target_builds_dependencies_in_order() {
    let dir = TempDir::new().unwrap();
    let log = path_in(&dir, "log");
    let all = path_in(&dir, "all");
    let a = path_in(&dir, "a");
    let b = path_in(&dir, "b");

    let makefile = parse(
        &dir,
        &format!("{all}: {a} {b}\n{a}:\n\techo A >> {log}\n{b}:\n\techo B >> {log}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    // No requested targets: the first explicit rule is built.
    assert!(makefile.execute(vec![]).unwrap());
    assert_eq!(fs::read_to_string(&log).unwrap(), "A\nB\n");
}

#[test]
fn question_mode_reports_without_running() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");
    let marker = path_in(&dir, "marker");

    let opts = Opts {
        question_only: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{target}:\n\ttouch {marker}\n"),
        opts,
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target]).unwrap());
    assert!(!PathBuf::from(&marker).exists());
}

#[test]
fn dry_run_echoes_without_running() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "hello.c");
    let target = path_in(&dir, "hello");
    fs::write(&source, "").unwrap();

    let logger = CaptureLogger::default();
    let opts = Opts {
        dry_run: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{target}: {source}\n\tcc -o $@ $<\n"),
        opts,
        logger.clone(),
    );

    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert!(!PathBuf::from(&target).exists());

    // The echoed command has both automatic variables substituted.
    let out = logger.out.lock().unwrap();
    assert_eq!(*out, vec![format!("[make]: cc -o {target} {source}")]);
}

#[test]
fn silent_runs_without_echoing() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");

    let logger = CaptureLogger::default();
    let opts = Opts {
        silent: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{target}:\n\ttouch $@\n"),
        opts,
        logger.clone(),
    );

    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert!(PathBuf::from(&target).exists());
    assert!(logger.out.lock().unwrap().is_empty());
}

#[test]
fn always_make_rebuilds_fresh_targets() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");
    let marker = path_in(&dir, "marker");
    fs::write(&target, "").unwrap();

    let opts = Opts {
        always_make: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{target}:\n\ttouch {marker}\n"),
        opts,
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target]).unwrap());
    assert!(PathBuf::from(&marker).exists());
}

#[test]
fn failing_command_aborts_the_build() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");
    let marker = path_in(&dir, "marker");

    let makefile = parse(
        &dir,
        &format!("{target}:\n\tfalse\n\ttouch {marker}\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target]).is_err());
    assert!(!PathBuf::from(&marker).exists());
}

#[test]
fn ignore_errors_continues_with_remaining_commands() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");
    let marker = path_in(&dir, "marker");

    let logger = CaptureLogger::default();
    let opts = Opts {
        ignore_errors: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{target}:\n\tfalse\n\ttouch {marker}\n"),
        opts,
        logger.clone(),
    );

    assert!(makefile.execute(vec![target]).unwrap());
    assert!(PathBuf::from(&marker).exists());
    let err = logger.err.lock().unwrap();
    assert!(err.iter().any(|m| m.contains("(ignored)")));
}

#[test]
fn keep_going_moves_to_the_next_target() {
    let dir = TempDir::new().unwrap();
    let bad = path_in(&dir, "bad");
    let good = path_in(&dir, "good");

    let opts = Opts {
        keep_going: true,
        ..Default::default()
    };
    let makefile = parse(
        &dir,
        &format!("{bad}:\n\tfalse\n{good}:\n\ttouch $@\n"),
        opts,
        DefaultLogger {},
    );

    // The failing target is reported and skipped; the attempted work still counts.
    assert!(makefile.execute(vec![bad, good.clone()]).unwrap());
    assert!(PathBuf::from(&good).exists());
}

#[test]
fn unknown_target_is_fatal_unless_keep_going() {
    let dir = TempDir::new().unwrap();
    let good = path_in(&dir, "good");
    let content = format!("{good}:\n\ttouch $@\n");

    let makefile = parse(&dir, &content, Opts::default(), DefaultLogger {});
    assert!(makefile
        .execute(vec![path_in(&dir, "no-such-target")])
        .is_err());

    let opts = Opts {
        keep_going: true,
        ..Default::default()
    };
    let makefile = parse(&dir, &content, opts, DefaultLogger {});
    assert!(makefile
        .execute(vec![path_in(&dir, "no-such-target"), good.clone()])
        .unwrap());
    assert!(PathBuf::from(&good).exists());
}

#[test]
fn pattern_rule_builds_matching_target() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "foo.c");
    let target = path_in(&dir, "foo.o");
    fs::write(&source, "void foo() {}\n").unwrap();

    let prefix = path_in(&dir, "");
    let makefile = parse(
        &dir,
        &format!("{prefix}%.o: {prefix}%.c\n\tcp $< $@\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        fs::read_to_string(&source).unwrap(),
    );
}

#[test]
fn pattern_rule_expands_variables_at_run_time() {
    let dir = TempDir::new().unwrap();
    let source = path_in(&dir, "foo.c");
    let target = path_in(&dir, "foo.o");
    let log = path_in(&dir, "log");
    fs::write(&source, "").unwrap();

    let prefix = path_in(&dir, "");
    let makefile = parse(
        &dir,
        &format!("CC := gcc\n{prefix}%.o: {prefix}%.c\n\techo $(CC) -c $< -o $@ >> {log}\n\ttouch $@\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert_eq!(
        fs::read_to_string(&log).unwrap(),
        format!("gcc -c {source} -o {target}\n"),
    );
}

#[test]
fn deferred_variables_resolve_at_command_time() {
    let dir = TempDir::new().unwrap();
    let target = path_in(&dir, "out.txt");

    let makefile = parse(
        &dir,
        &format!("X = $(Y)\nY = hi\n{target}:\n\techo $(X) > $@\n"),
        Opts::default(),
        DefaultLogger {},
    );

    assert!(makefile.execute(vec![target.clone()]).unwrap());
    assert_eq!(fs::read_to_string(&target).unwrap(), "hi\n");
}

#[test]
fn missing_makefile_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = Makefile::new(
        dir.path().join("no-such-makefile"),
        Opts::default(),
        Box::new(DefaultLogger {}),
        Vars::new([]),
    );
    assert!(result.is_err());
}
