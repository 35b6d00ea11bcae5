//! The in-memory rule model: explicit rules, pattern rules, and the per-rule machinery for
//! staleness decisions, automatic-variable substitution, and command execution.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::SystemTime;

use crate::context::Context;
use crate::error::MakeError;
use crate::expand::expand;
use crate::logger::Logger;

use super::Makefile;

const SHELL: &str = "/bin/sh";
const SHELL_ARGS: &str = "-c";

/// Helper to get the `mtime` of a file as an optional value. Note that the return value also
/// signals whether or not the file is accessible, so a `None` value represents either the file
/// not existing or the current user not having the appropriate permissions to access it.
pub(super) fn get_mtime(file: &str) -> Option<SystemTime> {
    fs::metadata(file).ok()?.modified().ok()
}

fn file_part(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dir_part(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Represents a parsed rule from a makefile. Implicit rules synthesized from a pattern match use
/// the same representation, with `stem` recording the text matched by `%`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub target: String,
    pub dependencies: Vec<String>,
    pub order_only: Vec<String>,
    pub commands: Vec<String>,
    pub is_phony: bool,
    pub stem: String,
    pub context: Context,
}

impl Rule {
    /// Decide whether this rule's commands must be rerun. Order-only prerequisites never
    /// contribute; they are only brought up to date beforehand.
    pub fn is_stale(&self, opts: &super::Opts) -> bool {
        if opts.always_make {
            return true;
        }

        let Some(target_mtime) = get_mtime(&self.target) else {
            return true;
        };

        if self.is_phony {
            return true;
        }

        self.dependencies.iter().any(|dep| match get_mtime(dep) {
            None => true,
            Some(dep_mtime) => dep_mtime > target_mtime,
        })
    }

    /// Unconditionally run this rule's commands, expanding variables and then substituting the
    /// automatic variables into each line.
    pub(super) fn run<L: Logger>(&self, makefile: &Makefile<L>) -> Result<(), MakeError> {
        for line in self.commands.iter() {
            let command = self.substitute_autos(expand(line, &makefile.vars));

            // Echo the line, unless suppressed.
            if !makefile.opts.silent || makefile.opts.dry_run {
                makefile.logger.info(&command);
            }
            if makefile.opts.dry_run {
                continue;
            }

            let status = Command::new(SHELL)
                .arg(SHELL_ARGS)
                .arg(&command)
                .status()
                .map_err(|e| MakeError::new(e.to_string(), self.context.clone()))?;

            if !status.success() {
                let msg = format!("Command failed: {}", command);
                if makefile.opts.ignore_errors {
                    makefile
                        .logger
                        .error(format!("{} (ignored)", msg), Some(&self.context));
                    continue;
                }
                return Err(MakeError::new(msg, self.context.clone()));
            }
        }

        Ok(())
    }

    /// Substitute the automatic variables into a command line. The general expander has already
    /// run and left these tokens intact. Longer tokens are substituted before their one-character
    /// counterparts so `$(@F)` is never half-eaten by `$@`.
    pub fn substitute_autos(&self, command: String) -> String {
        let first_dep = self.dependencies.first().cloned().unwrap_or_default();

        // `$+` keeps duplicates; `$^` keeps the first occurrence of each dependency.
        let all_deps = self.dependencies.join(" ");
        let mut seen: Vec<&str> = vec![];
        for dep in &self.dependencies {
            if !seen.contains(&dep.as_str()) {
                seen.push(dep);
            }
        }
        let unique_deps = seen.join(" ");

        // `$?` lists dependencies newer than the target, or all of them if the target is missing.
        let newer_deps = match get_mtime(&self.target) {
            None => all_deps.clone(),
            Some(target_mtime) => self
                .dependencies
                .iter()
                .filter(|dep| matches!(get_mtime(dep.as_str()), Some(m) if m > target_mtime))
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        };

        let target_file = file_part(&self.target);
        let target_dir = dir_part(&self.target);
        let first_dep_file = file_part(&first_dep);
        let first_dep_dir = dir_part(&first_dep);
        let dep_files = self
            .dependencies
            .iter()
            .map(|d| file_part(d))
            .collect::<Vec<_>>()
            .join(" ");
        let dep_dirs = self
            .dependencies
            .iter()
            .map(|d| dir_part(d))
            .collect::<Vec<_>>()
            .join(" ");

        let mut command = command;
        for (token, value) in [
            ("$(@F)", target_file.as_str()),
            ("$(@D)", target_dir.as_str()),
            ("$(<F)", first_dep_file.as_str()),
            ("$(<D)", first_dep_dir.as_str()),
            ("$(^F)", dep_files.as_str()),
            ("$(^D)", dep_dirs.as_str()),
            ("$@", self.target.as_str()),
            ("$<", first_dep.as_str()),
            ("$+", all_deps.as_str()),
            ("$^", unique_deps.as_str()),
            ("$?", newer_deps.as_str()),
            ("$*", self.stem.as_str()),
        ] {
            command = command.replace(token, value);
        }

        command
    }
}

/// A rule template whose target pattern contains `%`. Matching a concrete target yields a
/// synthetic `Rule` with the stem substituted throughout.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub target_pattern: String,
    pub dependencies: Vec<String>,
    pub order_only: Vec<String>,
    pub commands: Vec<String>,
    pub context: Context,
}

impl PatternRule {
    /// Match `target` against the target pattern, returning the stem (the text `%` matched).
    pub fn match_stem(&self, target: &str) -> Option<String> {
        let pct = self.target_pattern.find('%')?;
        let prefix = &self.target_pattern[..pct];
        let suffix = &self.target_pattern[pct + 1..];

        if target.len() < prefix.len() + suffix.len() {
            return None;
        }

        let stem = target.strip_prefix(prefix)?.strip_suffix(suffix)?;
        Some(stem.to_string())
    }

    /// Synthesize a concrete rule for `target` by substituting every `%` with the stem.
    pub fn instantiate(&self, target: &str, stem: &str) -> Rule {
        Rule {
            target: target.to_string(),
            dependencies: self
                .dependencies
                .iter()
                .map(|d| substitute_stem(d, stem))
                .collect(),
            order_only: self
                .order_only
                .iter()
                .map(|d| substitute_stem(d, stem))
                .collect(),
            commands: self
                .commands
                .iter()
                .map(|c| substitute_stem(c, stem))
                .collect(),
            is_phony: false,
            stem: stem.to_string(),
            context: self.context.clone(),
        }
    }
}

fn substitute_stem(s: &str, stem: &str) -> String {
    s.replace('%', stem)
}
