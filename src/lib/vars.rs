//! A wrapper for a `HashMap` for storing the variables of a makefile.
//!
//! Every binding carries a flavor recording how its assignment is evaluated: `:=` produces an
//! immediate binding whose value was fully expanded at parse time, while `=` (and `?=`) produce
//! deferred bindings whose values are stored verbatim and expanded at every use. Calling `lookup`
//! on a key that doesn't exist returns `None`; the expander treats that as an empty value.

use std::collections::HashMap;

/// Represents the "raw" environment coming from the OS.
pub type Env = HashMap<String, String>;

/// How a variable's right-hand side is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    /// Value was expanded at assignment time and is substituted verbatim.
    Immediate,
    /// Value is stored unexpanded and is expanded at every reference.
    Deferred,
}

#[derive(Debug)]
pub struct Var {
    pub value: String,
    pub flavor: Flavor,
}

/// This wraps a `HashMap` of `Var`, providing an easy way to get and set variables with the
/// flavor semantics the three assignment operators need.
#[derive(Debug)]
pub struct Vars {
    map: HashMap<String, Var>,
}

impl Vars {
    /// Primary interface for configuring a new instance. Initial data is stored immediate, which
    /// mirrors how values arriving from outside the makefile (e.g., the environment) behave.
    pub fn new<const N: usize>(init: [(&str, &str); N]) -> Self {
        let mut vars = Self {
            map: HashMap::new(),
        };

        // Use `set_immediate` to initialize data.
        for (k, v) in init {
            let _ = vars.set_immediate(k, v);
        }

        vars
    }

    /// Public interface for getting variables. Keys are trimmed, matching how they are stored.
    pub fn lookup(&self, k: impl AsRef<str>) -> Option<&Var> {
        self.map.get(k.as_ref().trim())
    }

    /// Store a binding whose value has already been expanded.
    pub fn set_immediate<S: Into<String>>(&mut self, k: S, v: S) -> Result<(), String> {
        self.set(k, v, Flavor::Immediate)
    }

    /// Store a binding whose value is expanded at every use.
    pub fn set_deferred<S: Into<String>>(&mut self, k: S, v: S) -> Result<(), String> {
        self.set(k, v, Flavor::Deferred)
    }

    /// Store a deferred binding only if no binding (of either flavor) currently exists.
    pub fn set_if_absent_deferred<S: Into<String>>(&mut self, k: S, v: S) -> Result<(), String> {
        let k = k.into();
        if self.map.contains_key(k.trim()) {
            return Ok(());
        }
        self.set(k, v.into(), Flavor::Deferred)
    }

    fn set<S: Into<String>>(&mut self, k: S, v: S, flavor: Flavor) -> Result<(), String> {
        let clean_key = k.into().trim().to_string();

        if clean_key.is_empty() {
            return Err("Empty variable name.".to_string());
        }

        // Variable names must not include whitespace or any chars in the set: `:#=`.
        for ch in clean_key.chars() {
            if ch.is_whitespace() {
                return Err("Variable contains whitespace.".to_string());
            }

            if let ':' | '#' | '=' = ch {
                return Err(format!("Variable contains bad character '{}'.", ch));
            }
        }

        self.map.insert(
            clean_key,
            Var {
                value: v.into(),
                flavor,
            },
        );
        Ok(())
    }
}

impl From<Env> for Vars {
    fn from(env: Env) -> Self {
        let mut vars = Self::new([]);
        for (k, v) in env {
            vars.map.insert(
                k,
                Var {
                    value: v,
                    flavor: Flavor::Immediate,
                },
            );
        }

        vars
    }
}
