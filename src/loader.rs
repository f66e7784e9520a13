//! Script loader for scanning Lua scripts from the file system.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

/// Metadata parsed from a script's leading comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

/// A script found in the scripts directory.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptInfo {
    /// Path relative to the scripts directory.
    pub path: String,
    /// Display name (from `@name` metadata, or the file stem).
    pub name: String,
    /// Description from `@description` metadata.
    pub description: Option<String>,
    /// Author from `@author` metadata.
    pub author: Option<String>,
    /// File modification time.
    pub modified: Option<DateTime<Utc>>,
}

/// Loader for scanning Lua scripts from the file system.
pub struct ScriptLoader {
    /// Base directory for scripts.
    scripts_dir: PathBuf,
}

impl ScriptLoader {
    /// Create a new ScriptLoader with the given scripts directory.
    pub fn new<P: AsRef<Path>>(scripts_dir: P) -> Self {
        Self {
            scripts_dir: scripts_dir.as_ref().to_path_buf(),
        }
    }

    /// List all .lua scripts under the scripts directory, recursively,
    /// sorted by relative path. A missing directory yields an empty list.
    pub fn list(&self) -> Result<Vec<ScriptInfo>> {
        let mut infos = Vec::new();
        if self.scripts_dir.exists() {
            self.scan_directory(&self.scripts_dir, &mut infos)?;
        }
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    /// Scan a directory recursively for .lua files.
    fn scan_directory(&self, dir: &Path, infos: &mut Vec<ScriptInfo>) -> Result<()> {
        for entry in fs::read_dir(dir)?.flatten() {
            let path = entry.path();

            if path.is_dir() {
                self.scan_directory(&path, infos)?;
            } else if path.extension().is_some_and(|ext| ext == "lua") {
                infos.push(self.describe_script(&path)?);
            }
        }

        Ok(())
    }

    /// Build a ScriptInfo for a single .lua file.
    fn describe_script(&self, path: &Path) -> Result<ScriptInfo> {
        let rel_path = path
            .strip_prefix(&self.scripts_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let content = fs::read_to_string(path)?;
        let metadata = Self::parse_metadata(&content);

        let modified = fs::metadata(path)?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(ScriptInfo {
            path: rel_path,
            name: metadata.name.unwrap_or_else(|| Self::filename_to_name(path)),
            description: metadata.description,
            author: metadata.author,
            modified,
        })
    }

    /// Parse metadata from Lua file comments.
    ///
    /// Looks for comments like:
    /// ```lua
    /// -- @name Script Name
    /// -- @description Description text
    /// -- @author Author Name
    /// ```
    /// Parsing stops at the first non-comment line.
    pub fn parse_metadata(content: &str) -> ScriptMetadata {
        let mut metadata = ScriptMetadata::default();

        for line in content.lines() {
            let line = line.trim();
            if !line.starts_with("--") {
                // Stop at first non-comment line
                if !line.is_empty() {
                    break;
                }
                continue;
            }

            let comment = line.trim_start_matches("--").trim();

            if let Some(value) = comment.strip_prefix("@name ") {
                metadata.name = Some(value.trim().to_string());
            } else if let Some(value) = comment.strip_prefix("@description ") {
                metadata.description = Some(value.trim().to_string());
            } else if let Some(value) = comment.strip_prefix("@author ") {
                metadata.author = Some(value.trim().to_string());
            }
        }

        metadata
    }

    /// Convert filename to a display name.
    fn filename_to_name(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    /// Read the source code of a script from the file system.
    pub fn read_source(&self, file_path: &str) -> Result<String> {
        let full_path = self.scripts_dir.join(file_path);
        Ok(fs::read_to_string(full_path)?)
    }

    /// Get the scripts directory path.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }
}
