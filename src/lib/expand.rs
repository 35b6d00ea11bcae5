//! Variable expansion for makefile text.
//!
//! The reference syntax is `$(NAME)` and `${NAME}` only; a bare `$X` is not a reference (the
//! single-character automatic variables are substituted separately, per rule, just before a
//! command runs). Substituted text is appended to the output buffer and never rescanned, so a
//! value cannot smuggle in references the current pass would expand; chained deferred references
//! still resolve because deferred values are expanded recursively during their own substitution.

use std::collections::HashSet;

use crate::vars::{Flavor, Vars};

/// Names the expander must leave intact for the automatic-variable substitutor.
const RESERVED_NAMES: [&str; 6] = ["@F", "@D", "<F", "<D", "^F", "^D"];

/// The primary public interface for running variable expansion on an input string, given a
/// collection of `vars`.
///
/// Lookup misses expand to the empty string. Immediate-flavor values are substituted verbatim
/// (they were fully expanded at assignment time); deferred-flavor values are expanded recursively
/// with an in-progress set, so a self-referential binding expands to empty instead of diverging.
pub fn expand(s: &str, vars: &Vars) -> String {
    expand_tracked(s, vars, &mut HashSet::new())
}

fn expand_tracked(s: &str, vars: &Vars, in_progress: &mut HashSet<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(dollar) = rest.find('$') {
        // Determine the closing delimiter, if this is a reference at all.
        let close = match rest[dollar + 1..].chars().next() {
            Some('(') => ')',
            Some('{') => '}',
            // `$X`, `$$`, or a trailing `$`: not a reference, so pass it through.
            _ => {
                result.push_str(&rest[..dollar + 1]);
                rest = &rest[dollar + 1..];
                continue;
            }
        };

        let name_start = dollar + 2;
        let Some(close_offset) = rest[name_start..].find(close) else {
            // Unmatched opening bracket: leave it literal and resume scanning after it.
            result.push_str(&rest[..name_start]);
            rest = &rest[name_start..];
            continue;
        };

        let name = &rest[name_start..name_start + close_offset];
        let after_token = name_start + close_offset + 1;

        // Leave automatic-variable tokens for the per-rule substitutor.
        if RESERVED_NAMES.contains(&name) {
            result.push_str(&rest[..after_token]);
            rest = &rest[after_token..];
            continue;
        }

        result.push_str(&rest[..dollar]);
        if let Some(var) = vars.lookup(name) {
            match var.flavor {
                Flavor::Immediate => result.push_str(&var.value),
                Flavor::Deferred => {
                    let key = name.trim().to_string();
                    // A name already in progress expands to empty (cycle-breaking).
                    if in_progress.insert(key.clone()) {
                        let value = expand_tracked(&var.value, vars, in_progress);
                        result.push_str(&value);
                        in_progress.remove(&key);
                    }
                }
            }
        }
        rest = &rest[after_token..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_expansions() {
        let vars = Vars::new([("TESTA", "VALUE A"), ("TESTB", "VALUE B")]);
        assert_eq!(expand("$(TESTA)", &vars), "VALUE A");
        assert_eq!(expand("${TESTA} and $(TESTB)", &vars), "VALUE A and VALUE B");
        assert_eq!(
            expand("Leading text and $(TESTA) and $(TESTB).", &vars),
            "Leading text and VALUE A and VALUE B.",
        );
    }

    #[test]
    fn test_missing_variable_expands_to_empty() {
        let vars = Vars::new([]);
        assert_eq!(expand("a $(MISSING) b", &vars), "a  b");
        assert_eq!(expand("${ALSO_MISSING}", &vars), "");
    }

    #[test]
    fn test_single_character_is_not_a_reference() {
        let vars = Vars::new([("X", "nope")]);
        assert_eq!(expand("$X", &vars), "$X");
        assert_eq!(expand("cost is $5", &vars), "cost is $5");
        assert_eq!(expand("trailing $", &vars), "trailing $");
    }

    #[test]
    fn test_unmatched_bracket_is_literal() {
        let vars = Vars::new([("TEST", "Value"), ("Y", "y")]);
        assert_eq!(expand("${TEST", &vars), "${TEST");
        assert_eq!(expand("$(TEST", &vars), "$(TEST");
        // Scanning resumes after the unmatched bracket, so later references still expand.
        assert_eq!(expand("$(X ${Y}", &vars), "$(X y");
    }

    #[test]
    fn test_mismatched_delimiters_do_not_close() {
        let vars = Vars::new([("TEST", "Value")]);
        assert_eq!(expand("$(TEST}", &vars), "$(TEST}");
    }

    #[test]
    fn test_immediate_substituted_verbatim() {
        let mut vars = Vars::new([("A", "B")]);
        vars.set_immediate("C", "$(A)").unwrap();
        // Substituted text is not rescanned, so the stored `$(A)` stays literal.
        assert_eq!(expand("Test $(C)", &vars), "Test $(A)");
    }

    #[test]
    fn test_deferred_expands_recursively() {
        let mut vars = Vars::new([("A", "B")]);
        vars.set_deferred("C", "$(A)").unwrap();
        assert_eq!(expand("Test ${C}", &vars), "Test B");
    }

    #[test]
    fn test_chained_deferred_references() {
        let mut vars = Vars::new([]);
        for (k, v) in [("A", "B"), ("C", "${A}"), ("D", "$(C)")] {
            vars.set_deferred(k, v).unwrap();
        }
        assert_eq!(expand("Test ${D}", &vars), "Test B");
    }

    #[test]
    fn test_self_reference_expands_to_empty() {
        let mut vars = Vars::new([]);
        vars.set_deferred("X", "$(X)bar").unwrap();
        assert_eq!(expand("$(X)", &vars), "bar");
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let mut vars = Vars::new([]);
        vars.set_deferred("X", "$(Y)x").unwrap();
        vars.set_deferred("Y", "$(X)y").unwrap();
        assert_eq!(expand("$(X)", &vars), "yx");
        assert_eq!(expand("$(Y)", &vars), "xy");
    }

    #[test]
    fn test_reserved_names_left_intact() {
        let vars = Vars::new([("CC", "gcc")]);
        assert_eq!(
            expand("$(CC) $(@D)/$(@F) $(<F) $(^D)", &vars),
            "gcc $(@D)/$(@F) $(<F) $(^D)",
        );
    }

    #[test]
    fn test_double_dollar_left_as_is() {
        let vars = Vars::new([("A", "B")]);
        assert_eq!(expand("echo $$PATH", &vars), "echo $$PATH");
    }
}
