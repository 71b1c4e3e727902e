//! Interchange document persistence.
//!
//! The current tree is written as indented JSON after every synthesis pass
//! and read back only when source text is regenerated.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::node::Node;
use crate::error::PersistenceError;

#[derive(Debug, Clone)]
pub struct InterchangeStore {
    path: PathBuf,
}

impl InterchangeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InterchangeStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `root` without touching disk.
    pub fn encode(root: &Node) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(root)?)
    }

    pub fn write(&self, root: &Node) -> Result<(), PersistenceError> {
        let json = Self::encode(root)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let mut file = File::create(&self.path).map_err(|source| self.io_error(source))?;
        file.write_all(json.as_bytes())
            .map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), bytes = json.len(), "wrote interchange document");
        Ok(())
    }

    /// Raw document text, as handed to the text generator.
    pub fn read_document(&self) -> Result<String, PersistenceError> {
        if !self.path.exists() {
            return Err(PersistenceError::NotFound(self.path.clone()));
        }
        fs::read_to_string(&self.path).map_err(|source| self.io_error(source))
    }

    pub fn read(&self) -> Result<Node, PersistenceError> {
        let text = self.read_document()?;
        Ok(serde_json::from_str(&text)?)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesizer::Synthesizer;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_keeps_identity_and_links() {
        let dir = tempdir().unwrap();
        let store = InterchangeStore::new(dir.path().join("out").join("ast.json"));
        let root = Synthesizer::new().synthesize("fn main() { let a = 1; let b = a; }");

        store.write(&root).unwrap();
        let text = store.read_document().unwrap();
        assert!(text.contains("\n  "));
        assert!(text.contains("\"kindTag\": \"Method\""));

        let back = store.read().unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_missing_document() {
        let dir = tempdir().unwrap();
        let store = InterchangeStore::new(dir.path().join("ast.json"));
        assert!(matches!(
            store.read_document(),
            Err(PersistenceError::NotFound(_))
        ));
    }
}
