//! The rule tables built by the parser, and the executor that walks them.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::MakeError;
use crate::logger::Logger;

use super::rule::{PatternRule, Rule};
use super::Makefile;

/// The explicit rules (keyed by target) and the pattern rules (in declaration order) of a parsed
/// makefile.
#[derive(Debug, Default)]
pub struct RuleMap {
    pub rules: HashMap<String, Rule>,
    pub patterns: Vec<PatternRule>,
}

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an explicit rule. A target defined twice keeps its first definition; the duplicate
    /// is reported and dropped.
    pub fn insert<L: Logger>(&mut self, rule: Rule, logger: &L) {
        if self.rules.contains_key(&rule.target) {
            logger.warn(
                format!("Ignoring duplicate definition for target '{}'.", rule.target),
                Some(&rule.context),
            );
            return;
        }

        self.rules.insert(rule.target.clone(), rule);
    }
}

/// Walks the dependency graph for the requested targets. The executor owns the implicit-rule
/// cache, which grows monotonically as pattern matches are resolved; the parse result itself is
/// only borrowed.
pub struct Executor<'m, L: Logger> {
    makefile: &'m Makefile<L>,
    implicit: HashMap<String, Rule>,
}

impl<'m, L: Logger> Executor<'m, L> {
    pub fn new(makefile: &'m Makefile<L>) -> Self {
        Self {
            makefile,
            implicit: HashMap::new(),
        }
    }

    /// Build each requested target in order, returning whether anything needed rebuilding. Under
    /// `keep_going`, a target that cannot be resolved or built is reported and the loop moves on.
    pub fn execute(&mut self, targets: &[String]) -> Result<bool, MakeError> {
        let mut any_rebuilt = false;

        for target in targets {
            let Some(rule) = self.resolve(target) else {
                let error = MakeError::new(
                    format!("No rule to make target '{}'.", target),
                    Context::new(),
                );
                if self.makefile.opts.keep_going {
                    self.makefile.logger.error(&error.msg, None);
                    continue;
                }
                return Err(error);
            };

            if self.makefile.opts.keep_going {
                match self.build(&rule) {
                    Ok(rebuilt) => any_rebuilt |= rebuilt,
                    Err(e) => self.makefile.logger.error(
                        format!("Error building target '{}': {}", target, e.msg),
                        Some(&e.context),
                    ),
                }
            } else {
                any_rebuilt |= self.build(&rule)?;
            }
        }

        Ok(any_rebuilt)
    }

    /// The recursive builder: a depth-first post-order walk. For a given rule, every
    /// prerequisite's commands have finished before the rule's own commands begin.
    fn build(&mut self, rule: &Rule) -> Result<bool, MakeError> {
        // Order-only prerequisites are brought up to date, but their staleness is discarded.
        for prereq in &rule.order_only {
            if let Some(prereq_rule) = self.resolve(prereq) {
                self.build(&prereq_rule)?;
            }
        }

        let mut rebuilt = false;
        for dep in &rule.dependencies {
            // A dependency with no rule is an external input; whether its file exists is judged
            // by the staleness check below, and any deeper failure is left to the shell.
            if let Some(dep_rule) = self.resolve(dep) {
                if self.build(&dep_rule)? {
                    rebuilt = true;
                }
            }
        }

        let stale = rule.is_stale(&self.makefile.opts);
        if stale && !self.makefile.opts.question_only {
            rule.run(self.makefile)?;
        }

        Ok(rebuilt || stale)
    }

    /// Resolution policy for a target name: the explicit rule map first, then the implicit cache,
    /// then each pattern rule in declaration order (the first match is synthesized and cached).
    fn resolve(&mut self, target: &str) -> Option<Rule> {
        if let Some(rule) = self.makefile.rule_map.rules.get(target) {
            return Some(rule.clone());
        }
        if let Some(rule) = self.implicit.get(target) {
            return Some(rule.clone());
        }

        for pattern in &self.makefile.rule_map.patterns {
            if let Some(stem) = pattern.match_stem(target) {
                let rule = pattern.instantiate(target, &stem);
                self.implicit.insert(target.to_string(), rule.clone());
                return Some(rule);
            }
        }

        None
    }
}
