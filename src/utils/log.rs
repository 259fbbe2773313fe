// src/utils/log.rs

//! Verbosity levels and their mapping onto the `log` facade.

use std::fmt;

use log::LevelFilter;

use crate::error::{AppError, Result};

/// Console verbosity chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Map `-q` / `-v` counts onto a verbosity.
    ///
    /// More `-v` flags than the table knows about is a configuration error.
    pub fn from_flags(quiet: bool, verbose: u8) -> Result<Self> {
        if quiet {
            return Ok(Self::Quiet);
        }
        match verbose {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Verbose),
            2 => Ok(Self::Debug),
            n => Err(AppError::config(format!(
                "Invalid log verbosity level {n}, try fewer -v"
            ))),
        }
    }

    /// The `log` filter for this verbosity.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Error,
            Self::Normal => LevelFilter::Warn,
            Self::Verbose => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Normal => "normal",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Verbose < Verbosity::Debug);
    }

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 0).unwrap(), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0).unwrap(), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 2).unwrap(), Verbosity::Debug);
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_verbosity_rejects_unknown_level() {
        assert!(Verbosity::from_flags(false, 3).is_err());
    }
}
