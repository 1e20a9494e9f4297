// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Build mode selected at startup.
///
/// - `Development`: optional stages gated on `production` are skipped and
///   output goes to the development root.
/// - `Production`: minification and other production-only stages run and
///   output goes to the public root.
///
/// The value is fixed for the lifetime of the process and handed to the
/// pipeline explicitly; nothing reads it from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

impl Default for BuildMode {
    fn default() -> Self {
        BuildMode::Production
    }
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    /// Returns true if something gated with `only` should be active in this
    /// mode. `None` means "always active".
    pub fn allows(self, only: Option<BuildMode>) -> bool {
        only.map_or(true, |m| m == self)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal action a task performs after its dependencies (and its own
/// pipeline, if any) have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalAction {
    /// Start the dev server(s) on the build output.
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gate_matches_mode() {
        assert!(BuildMode::Development.allows(None));
        assert!(BuildMode::Production.allows(Some(BuildMode::Production)));
        assert!(!BuildMode::Development.allows(Some(BuildMode::Production)));
    }
}
