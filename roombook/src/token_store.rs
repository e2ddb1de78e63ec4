//! Key-value env file holding `USERNAME`, `PASSWORD` and the cached `TOKEN`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, RoombookError};

pub const TOKEN_KEY: &str = "TOKEN";

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file. A missing file reads as empty.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        dotenvy::from_path_iter(&self.path)
            .map_err(|e| RoombookError::Config(format!("Failed to read {}: {e}", self.path.display())))?
            .map(|item| {
                item.map_err(|e| {
                    RoombookError::Config(format!("Failed to parse {}: {e}", self.path.display()))
                })
            })
            .collect()
    }

    pub fn token(&self) -> Result<Option<String>> {
        Ok(self
            .load()?
            .remove(TOKEN_KEY)
            .filter(|token| !token.is_empty()))
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.set_key(TOKEN_KEY, token)
    }

    /// Replaces the first `key=` line or appends one, leaving every other
    /// line untouched. The file is created when missing.
    pub fn set_key(&self, key: &str, value: &str) -> Result<()> {
        if value.contains('\'') || value.contains('\n') {
            return Err(RoombookError::Validation(format!(
                "value for {key} cannot contain quotes or newlines"
            )));
        }

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let entry = format!("{key}='{value}'");
        let mut replaced = false;
        let mut lines: Vec<String> = existing
            .lines()
            .map(|line| {
                if !replaced && line_defines(line, key) {
                    replaced = true;
                    entry.clone()
                } else {
                    line.to_string()
                }
            })
            .collect();

        if !replaced {
            lines.push(entry);
        }

        let mut content = lines.join("\n");
        content.push('\n');
        self.replace_contents(&content)
    }

    /// Writes `<path>.tmp` and renames it over the file, so an interrupted
    /// write never leaves the credentials half-written.
    fn replace_contents(&self, content: &str) -> Result<()> {
        let tmp_path = self.tmp_path();
        if let Err(e) = fs::write(&tmp_path, content) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn line_defines(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.split_once('=')
        .map(|(name, _)| name.trim() == key)
        .unwrap_or(false)
}
