//! JSON file settings backend.

use super::{SettingsStore, SettingsTree};
use crate::error::SettingsError;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings persisted to a JSON file, written through after every update.
#[derive(Debug)]
pub struct JsonSettings {
    path: PathBuf,
    tree: SettingsTree,
}

impl JsonSettings {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let mut settings = Self {
            path: path.as_ref().to_path_buf(),
            tree: SettingsTree::default(),
        };
        settings.load()?;
        Ok(settings)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.tree.set(key, value, false)?;
        self.save()
    }

    fn set_initial(&mut self, key: &str, value: Value) -> Result<bool, SettingsError> {
        let written = self.tree.set(key, value, true)?;
        if written {
            self.save()?;
        }
        Ok(written)
    }

    fn load(&mut self) -> Result<(), SettingsError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No settings file yet, starting empty");
                self.tree = SettingsTree::default();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_reader(BufReader::new(file))?;
        self.tree = SettingsTree::from_value(value)?;
        debug!(path = %self.path.display(), "Settings loaded");
        Ok(())
    }

    /// Atomic write: temp file, then rename over the target.
    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer_pretty(&mut writer, self.tree.as_map())?;
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_through_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("settings.json");

        let mut settings = JsonSettings::open(&path).unwrap();
        settings.set("connection.command_prefix", json!(".")).unwrap();
        assert!(path.exists());

        let reopened = JsonSettings::open(&path).unwrap();
        assert_eq!(reopened.get_str("connection.command_prefix"), Some("."));
    }

    #[test]
    fn test_load_discards_unsaved_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"nick": "slbot"}"#).unwrap();

        let mut settings = JsonSettings::open(&path).unwrap();
        assert_eq!(settings.get_str("nick"), Some("slbot"));

        fs::write(&path, r#"{"nick": "renamed"}"#).unwrap();
        settings.load().unwrap();
        assert_eq!(settings.get_str("nick"), Some("renamed"));
    }

    #[test]
    fn test_non_object_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(JsonSettings::open(&path), Err(SettingsError::NotAnObject)));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonSettings::open(&path), Err(SettingsError::Json(_))));
    }
}
