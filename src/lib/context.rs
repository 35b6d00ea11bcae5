//! Simple implementation of a `Context` struct designed to track parsing/execution location.

use std::path::PathBuf;

/// Represents parsing/execution context, specifically, which file and where in the file something
/// is happening.
#[derive(Clone, Debug, Default)]
pub struct Context {
    pub path: Option<PathBuf>,
    pub content: Option<String>,

    // Line number is determined when iterating the input, so we use `usize` here to match the
    // return type of `enumerate()`. The index is `0`-based and incremented on display to match the
    // convention other programs (including other make implementations) use when referencing line
    // numbers.
    pub line_index: Option<usize>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `path:line` label for this context, if a path is known.
    pub fn label(&self) -> Option<String> {
        let path_display = self.path.as_ref().map(|p| p.display())?;

        match self.line_index {
            Some(line) => Some(format!("{}:{}", path_display, line + 1)),
            None => Some(path_display.to_string()),
        }
    }

    /// Render the offending line itself, for warning/error displays.
    pub fn display_line(&self) -> Option<String> {
        self.content.as_ref().map(|content| match self.line_index {
            Some(line) => {
                let line_s = (line + 1).to_string();
                let pad = " ".repeat(line_s.len());
                format!("{pad} |\n{line_s} | {content}\n{pad} |")
            }
            None => format!(" | {content}"),
        })
    }
}

impl From<PathBuf> for Context {
    fn from(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }
}
