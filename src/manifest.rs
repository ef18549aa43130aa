//! Attachment list
//!
//! Maps attachment names to the files that provide their content. Lists are
//! stored as JSON objects or, for `.toml` files, as TOML tables:
//!
//! ```text
//! {"config": "conf/app.json", "logo.png": "/assets/logo.png"}
//!
//! config = "conf/app.json"
//! "logo.png" = "/assets/logo.png"
//! ```
//!
//! Relative paths in a list file resolve against the directory of that file.

use crate::error::{Result, StowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Attachment names mapped to source files, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentList {
    entries: BTreeMap<String, PathBuf>,
}

impl AttachmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attachment
    pub fn with_attachment(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(name, path);
        self
    }

    /// Add or replace an attachment
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON object of name/path pairs
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| StowError::InvalidAttachmentList(e.to_string()))
    }

    /// Parse a TOML table of name/path pairs
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StowError::InvalidAttachmentList(e.to_string()))
    }

    /// Load a list file and validate its entries
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut list = if is_toml {
            Self::from_toml(&text)?
        } else {
            Self::from_json(&text)?
        };

        if let Some(base) = path.parent() {
            list.resolve_relative_to(base);
        }
        list.validate()?;

        debug!(path = %path.display(), attachments = list.len(), "loaded attachment list");
        Ok(list)
    }

    /// Prefix every relative path with `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in self.entries.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check that every entry names an existing regular file
    ///
    /// # Errors
    ///
    /// - `InvalidAttachmentList` for directories
    /// - `AttachmentSource` if a file cannot be inspected
    pub fn validate(&self) -> Result<()> {
        for (name, path) in &self.entries {
            let metadata = std::fs::metadata(path).map_err(|source| StowError::AttachmentSource {
                name: name.clone(),
                path: path.clone(),
                source,
            })?;
            if metadata.is_dir() {
                return Err(StowError::InvalidAttachmentList(format!(
                    "cannot attach directory {:?} at {}",
                    name,
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_json() -> Result<()> {
        let list = AttachmentList::from_json(r#"{"b": "two.bin", "a": "/abs/one.txt"}"#)?;

        assert_eq!(list.len(), 2);
        assert_eq!(list.get("a"), Some(Path::new("/abs/one.txt")));

        // Ordered by name regardless of file order
        let names: Vec<_> = list.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);

        Ok(())
    }

    #[test]
    fn test_from_toml() -> Result<()> {
        let list = AttachmentList::from_toml("config = \"conf/app.json\"\n\"logo.png\" = \"logo.png\"\n")?;

        assert_eq!(list.get("config"), Some(Path::new("conf/app.json")));
        assert_eq!(list.get("logo.png"), Some(Path::new("logo.png")));

        Ok(())
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            AttachmentList::from_json("[1, 2]"),
            Err(StowError::InvalidAttachmentList(_))
        ));
        assert!(matches!(
            AttachmentList::from_toml("config = 3"),
            Err(StowError::InvalidAttachmentList(_))
        ));
    }

    #[test]
    fn test_load_resolves_relative_paths() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("data.bin"), b"payload")?;
        std::fs::write(dir.path().join("list.json"), r#"{"data": "data.bin"}"#)?;

        let list = AttachmentList::load(dir.path().join("list.json"))?;
        assert_eq!(list.get("data"), Some(dir.path().join("data.bin").as_path()));

        Ok(())
    }

    #[test]
    fn test_load_toml_extension() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("data.bin"), b"payload")?;
        std::fs::write(dir.path().join("list.TOML"), "data = \"data.bin\"\n")?;

        let list = AttachmentList::load(dir.path().join("list.TOML"))?;
        assert_eq!(list.len(), 1);

        Ok(())
    }

    #[test]
    fn test_rejects_directory() -> Result<()> {
        let dir = tempdir()?;
        let list = AttachmentList::new().with_attachment("dir", dir.path());

        assert!(matches!(
            list.validate(),
            Err(StowError::InvalidAttachmentList(_))
        ));
        Ok(())
    }

    #[test]
    fn test_rejects_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let list = AttachmentList::new().with_attachment("gone", dir.path().join("missing.bin"));

        match list.validate() {
            Err(StowError::AttachmentSource { name, .. }) => assert_eq!(name, "gone"),
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_accepts_empty_name() -> Result<()> {
        // Embedding accepts any name, including ""
        let dir = tempdir()?;
        std::fs::write(dir.path().join("data.bin"), b"payload")?;
        std::fs::write(dir.path().join("list.json"), r#"{"": "data.bin"}"#)?;

        let list = AttachmentList::load(dir.path().join("list.json"))?;
        assert_eq!(list.get(""), Some(dir.path().join("data.bin").as_path()));
        Ok(())
    }
}
