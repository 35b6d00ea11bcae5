//! The core logic for parsing and executing makefiles.

pub mod opts;
pub mod rule;
pub mod rule_map;

pub use opts::Opts;
pub use rule::{PatternRule, Rule};

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::context::Context;
use crate::error::MakeError;
use crate::expand::expand;
use crate::logger::Logger;
use crate::vars::Vars;

use rule_map::{Executor, RuleMap};

const COMMENT_INDICATOR: char = '#';
const PHONY_DIRECTIVE: &str = ".PHONY:";

/// The three assignment operators, in match priority order.
enum AssignOp {
    /// `:=` — right-hand side expanded now, stored verbatim.
    Immediate,
    /// `?=` — stored unexpanded, only if the name is unbound.
    Conditional,
    /// `=` — stored unexpanded, expanded at every use.
    Deferred,
}

/// A rule header whose command block is still being collected; it has not yet been committed to
/// the rule tables.
#[derive(Debug)]
struct PendingRule {
    targets: Vec<String>,
    dependencies: Vec<String>,
    order_only: Vec<String>,
    commands: Vec<String>,
    pattern: bool,
    context: Context,
}

/// The primary interface for reading, parsing, and executing a makefile.
pub struct Makefile<L: Logger> {
    pub opts: Opts,
    pub logger: Box<L>,
    pub vars: Vars,
    pub rule_map: RuleMap,

    phony_targets: HashSet<String>,
    default_target: Option<String>,

    // Parser state.
    current_rule: Option<PendingRule>,
    context: Context,
}

impl<L: Logger> Makefile<L> {
    /// Principal interface for reading and parsing a makefile from a file.
    pub fn new(path: PathBuf, opts: Opts, logger: Box<L>, vars: Vars) -> Result<Self, MakeError> {
        let file = File::open(&path).map_err(|e| {
            MakeError::new(
                format!("Could not read makefile ({}).", e),
                path.clone().into(),
            )
        })?;

        Self::parse_new(BufReader::new(file), path.into(), opts, logger, vars)
    }

    /// Parse a makefile from any buffered reader.
    pub fn from_reader<R: BufRead>(
        stream: R,
        opts: Opts,
        logger: Box<L>,
        vars: Vars,
    ) -> Result<Self, MakeError> {
        Self::parse_new(stream, Context::new(), opts, logger, vars)
    }

    fn parse_new<R: BufRead>(
        stream: R,
        context: Context,
        opts: Opts,
        logger: Box<L>,
        vars: Vars,
    ) -> Result<Self, MakeError> {
        let mut makefile = Self {
            opts,
            logger,
            vars,
            rule_map: RuleMap::new(),
            phony_targets: HashSet::new(),
            default_target: None,
            current_rule: None,
            context,
        };
        makefile.parse(stream)?;

        Ok(makefile)
    }

    /// The default target, i.e., the target of the first explicit rule, if any was parsed.
    pub fn default_target(&self) -> Option<&String> {
        self.default_target.as_ref()
    }

    /// Iterate over the makefile's lines, join backslash continuations into logical lines, call
    /// `parse_line` to handle the actual parsing logic, and manage context.
    fn parse<R: BufRead>(&mut self, stream: R) -> Result<(), MakeError> {
        self.current_rule = None;

        // A backslash-continued line under construction, with the index where it began.
        let mut continuation: Option<(String, usize)> = None;

        for (i, result) in stream.lines().enumerate() {
            let physical =
                result.map_err(|e| MakeError::new(e.to_string(), self.context.clone()))?;

            let (mut line, start) = match continuation.take() {
                // Continued lines are appended with no separator.
                Some((mut buffer, start)) => {
                    buffer.push_str(&physical);
                    (buffer, start)
                }
                None => (physical, i),
            };

            if ends_with_single_backslash(&line) {
                line.pop();
                continuation = Some((line, start));
                continue;
            }

            self.context.line_index = Some(start);
            self.context.content = Some(line.clone());
            self.parse_line(line)?;
        }

        // A trailing backslash on the final line has nothing left to join with.
        if let Some((line, start)) = continuation.take() {
            self.context.line_index = Some(start);
            self.context.content = Some(line.clone());
            self.parse_line(line)?;
        }

        // Terminate a trailing rule.
        self.finish_rule();

        // `.PHONY:` may appear anywhere, so rules are flagged only after the full pass.
        for name in &self.phony_targets {
            if let Some(rule) = self.rule_map.rules.get_mut(name) {
                rule.is_phony = true;
            }
        }

        Ok(())
    }

    /// The line parser is where the "meat" of the parsing occurs. Classification order: command
    /// line, comment/blank, `.PHONY:` directive, variable assignment, rule header.
    fn parse_line(&mut self, line: String) -> Result<(), MakeError> {
        // Handle command lines.
        if line.starts_with('\t') {
            let command = line.trim();

            // Blank and comment-only lines inside a command block are skipped.
            if command.is_empty() || command.starts_with(COMMENT_INDICATOR) {
                return Ok(());
            }

            return match &mut self.current_rule {
                None => Err(MakeError::new(
                    "Command outside of any rule.",
                    self.context.clone(),
                )),
                Some(rule) => {
                    rule.commands.push(command.to_string());
                    Ok(())
                }
            };
        }

        // Ignore comments and blank lines; they do not terminate a command block.
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_INDICATOR) {
            return Ok(());
        }

        // Any other line terminates the rule currently collecting commands.
        self.finish_rule();

        // Handle `.PHONY:` directives: the remainder is expanded, then split.
        if let Some(rest) = trimmed.strip_prefix(PHONY_DIRECTIVE) {
            let names = expand(rest, &self.vars);
            self.phony_targets
                .extend(names.split_whitespace().map(|s| s.to_string()));
            return Ok(());
        }

        // Handle variable assignments.
        if let Some((name, value, op)) = classify_assignment(&line) {
            let value = value.trim_start();
            let result = match op {
                AssignOp::Immediate => {
                    let expanded = expand(value, &self.vars);
                    self.vars.set_immediate(name.to_string(), expanded)
                }
                AssignOp::Conditional => self
                    .vars
                    .set_if_absent_deferred(name.to_string(), value.to_string()),
                AssignOp::Deferred => self.vars.set_deferred(name.to_string(), value.to_string()),
            };
            return result.map_err(|e| MakeError::new(e, self.context.clone()));
        }

        // Handle rule headers.
        if find_unescaped(&line, ':').is_some() {
            return self.parse_rule_header(&line);
        }

        // Otherwise, throw error if line is not recognizable.
        Err(MakeError::new("Invalid line type.", self.context.clone()))
    }

    /// Parse a rule header. An inline command (after an unescaped `;`) is split off the raw text
    /// so it stays unexpanded, and pattern detection uses the raw pre-colon slice, since a `%`
    /// must be literal to count. Non-pattern headers are then expanded before the final split, so
    /// expanded values may introduce the `:` or prerequisites.
    fn parse_rule_header(&mut self, line: &str) -> Result<(), MakeError> {
        let colon = find_unescaped(line, ':').expect("header known to contain a colon");

        let (header, inline_command) = match find_unescaped(line, ';') {
            Some(semi) if semi > colon => (&line[..semi], Some(line[semi + 1..].trim())),
            _ => (line, None),
        };

        let pattern = header[..colon].contains('%');

        let (targets_part, deps_part) = if pattern {
            // Pattern targets keep their `%` literal; no expansion.
            (header[..colon].to_string(), header[colon + 1..].to_string())
        } else {
            let expanded = expand(header, &self.vars);
            match find_unescaped(&expanded, ':') {
                Some(c) => (expanded[..c].to_string(), expanded[c + 1..].to_string()),
                // Expansion swallowed the colon; nothing usable remains of the header.
                None => (String::new(), String::new()),
            }
        };

        // Order-only prerequisites follow the first unescaped `|`.
        let (deps, order_only) = match find_unescaped(&deps_part, '|') {
            Some(pipe) => (
                deps_part[..pipe].to_string(),
                deps_part[pipe + 1..].to_string(),
            ),
            None => (deps_part, String::new()),
        };

        let mut commands = vec![];
        if let Some(command) = inline_command {
            if !command.is_empty() {
                commands.push(command.to_string());
            }
        }

        // A header whose target portion is empty collects no targets and is silently dropped when
        // the rule is finished.
        self.current_rule = Some(PendingRule {
            targets: targets_part
                .split_whitespace()
                .map(|s| s.to_string())
                .collect(),
            dependencies: deps.split_whitespace().map(|s| s.to_string()).collect(),
            order_only: order_only
                .split_whitespace()
                .map(|s| s.to_string())
                .collect(),
            commands,
            pattern,
            context: self.context.clone(),
        });

        Ok(())
    }

    /// Commit the rule whose command block just ended, if any. A header names one rule per
    /// target; the first explicit target accepted becomes the default.
    fn finish_rule(&mut self) {
        let Some(pending) = self.current_rule.take() else {
            return;
        };

        if pending.pattern {
            for target_pattern in pending.targets {
                self.rule_map.patterns.push(PatternRule {
                    target_pattern,
                    dependencies: pending.dependencies.clone(),
                    order_only: pending.order_only.clone(),
                    commands: pending.commands.clone(),
                    context: pending.context.clone(),
                });
            }
            return;
        }

        for target in pending.targets {
            if self.default_target.is_none() {
                self.default_target = Some(target.clone());
            }

            let rule = Rule {
                target,
                dependencies: pending.dependencies.clone(),
                order_only: pending.order_only.clone(),
                commands: pending.commands.clone(),
                is_phony: false,
                stem: String::new(),
                context: pending.context.clone(),
            };
            self.rule_map.insert(rule, self.logger.as_ref());
        }
    }

    /// Principal interface for executing a parsed makefile, given a list of targets. Returns
    /// whether anything needed rebuilding.
    pub fn execute(&self, mut targets: Vec<String>) -> Result<bool, MakeError> {
        // Set targets list to the default target if none were provided.
        if targets.is_empty() {
            match &self.default_target {
                None => {
                    return Err(MakeError::new(
                        "No target specified and no default target found.",
                        Context::new(),
                    ))
                }
                Some(t) => targets.push(t.clone()),
            }
        }

        Executor::new(self).execute(&targets)
    }
}

/// A line is continued when it ends in exactly one backslash; `\\` is an escaped backslash, not a
/// continuation.
fn ends_with_single_backslash(line: &str) -> bool {
    line.ends_with('\\') && !line.ends_with("\\\\")
}

/// Position of the first `ch` in `line` that is not preceded by a backslash.
fn find_unescaped(line: &str, ch: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ch {
            return Some(i);
        }
    }

    None
}

/// Classify a top-level line as a variable assignment. An assignment operator classifies the line
/// only if it appears before the first unescaped `:` (a `:=` sitting exactly at that colon also
/// counts). Matching order when several operators appear: `:=` wins over `?=` wins over `=`.
fn classify_assignment(line: &str) -> Option<(&str, &str, AssignOp)> {
    let colon = find_unescaped(line, ':');

    if let Some(c) = colon {
        if line[c + 1..].starts_with('=') {
            return Some((&line[..c], &line[c + 2..], AssignOp::Immediate));
        }
    }

    let limit = colon.unwrap_or(line.len());

    if let Some(q) = line.find("?=") {
        if q < limit {
            return Some((&line[..q], &line[q + 2..], AssignOp::Conditional));
        }
    }

    if let Some(e) = line.find('=') {
        if e < limit {
            return Some((&line[..e], &line[e + 1..], AssignOp::Deferred));
        }
    }

    None
}
