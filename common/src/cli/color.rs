//! When log output gets ANSI colors.
//!
//! An explicit `always`/`never` wins. Under `auto`, `NO_COLOR` or `EMACS`
//! in the environment turns colors off, otherwise they follow whether the
//! stream is a terminal.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

/// Color choice for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl LogColor {
    // ---
    /// Accepted spellings, for CLI help.
    pub const VARIANTS: [&'static str; 3] = ["auto", "always", "never"];

    /// Whether to color output written to stderr.
    pub fn for_stderr(self) -> bool {
        // ---
        self.decide(|key| env::var_os(key), atty::is(atty::Stream::Stderr))
    }

    fn decide<E>(self, lookup: E, is_tty: bool) -> bool
    where
        E: Fn(&str) -> Option<OsString>,
    {
        // ---
        match self {
            LogColor::Always => true,
            LogColor::Never => false,
            LogColor::Auto => {
                let suppressed = ["NO_COLOR", "EMACS"].iter().any(|key| lookup(key).is_some());
                !suppressed && is_tty
            }
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            other => Err(format!(
                "invalid color choice '{}', expected one of: {}",
                other,
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

impl fmt::Display for LogColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            LogColor::Auto => "auto",
            LogColor::Always => "always",
            LogColor::Never => "never",
        };
        f.write_str(name)
    }
}
