use std::path::PathBuf;

use crate::error::{ChoreError, Result};

/// Environment variable overriding the data directory.
pub const DB_ENV: &str = "CHORES_DB";
/// Environment variable naming the acting user.
pub const USER_ENV: &str = "CHORES_USER";

/// Runtime settings for the command line client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the collection files.
    pub data_dir: PathBuf,
    /// User the commands act as.
    pub user: Option<String>,
}

impl Config {
    /// Reads the environment.
    ///
    /// The data directory is determined in the following order:
    /// 1. `CHORES_DB` environment variable.
    /// 2. `~/.local/share/choreboard` (on Linux).
    /// 3. `./choreboard` (fallback).
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DB_ENV).map(PathBuf::from).unwrap_or_else(|_| {
            let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
            p.push("choreboard");
            p
        });
        let user = std::env::var(USER_ENV).ok().filter(|u| !u.trim().is_empty());
        Config { data_dir, user }
    }

    /// Replaces the acting user when one was given explicitly.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        if user.is_some() {
            self.user = user;
        }
        self
    }

    pub fn require_user(&self) -> Result<&str> {
        self.user.as_deref().ok_or(ChoreError::MissingUser)
    }
}
