//! CLI execution context.

use std::path::{Path, PathBuf};

use alpaca_core::ConfigFile;
use anyhow::{Context as _, Result};

use crate::config::{load_config, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Config file in effect, if one was given or found.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Locate the config file. Nothing is parsed yet.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve_path(&cwd, path)),
            None => find_config(&cwd),
        };

        Ok(Self {
            config_path,
            output,
            cwd,
        })
    }

    /// Parse the config file in effect.
    ///
    /// Without a config file the filter runs with every scope disabled.
    pub fn config(&self) -> Result<ConfigFile> {
        match &self.config_path {
            Some(path) => {
                self.output.debug(&format!("Using config: {}", path.display()));
                load_config(path)
            }
            None => {
                self.output.debug("No config file found, using defaults");
                Ok(ConfigFile::default())
            }
        }
    }
}

/// Find a config file in the directory tree.
fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
