//! Workflow document storage with file persistence.
//!
//! The editor core never performs I/O itself. A host hands documents to
//! a [`WorkflowPersistence`] implementation; [`DocumentStore`] is the
//! bundled one, keeping documents in memory with optional JSON files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::document::WorkflowDocument;
use crate::error::{EditorError, Result};
use crate::workflow::Workflow;

/// Metadata for a stored document (for listing).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,
    pub name: String,
    pub step_count: usize,
}

/// Backend that accepts and returns serialized workflows
pub trait WorkflowPersistence {
    /// Store a document under `id`, replacing any previous version
    fn save(&mut self, id: &str, document: &WorkflowDocument) -> Result<()>;

    /// Fetch the document stored under `id`
    fn load(&self, id: &str) -> Result<WorkflowDocument>;

    /// Describe every stored document
    fn list(&self) -> Vec<DocumentMetadata>;
}

/// In-memory document store with optional file persistence.
///
/// # Example
///
/// ```ignore
/// let mut store = DocumentStore::with_persistence(".workflows");
/// let count = store.load_from_disk()?;
///
/// workflow.save_to(&mut store, "rna-seq")?;
/// ```
#[derive(Debug, Default)]
pub struct DocumentStore {
    /// Stored documents, keyed by ID.
    documents: HashMap<String, WorkflowDocument>,
    /// Optional path for file persistence.
    persist_path: Option<PathBuf>,
}

impl DocumentStore {
    /// Create a new in-memory store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to the given directory.
    ///
    /// The directory will be created if it doesn't exist when saving.
    pub fn with_persistence(path: impl AsRef<Path>) -> Self {
        Self {
            documents: HashMap::new(),
            persist_path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Load all documents from the persistence directory.
    ///
    /// Returns the number of documents loaded. Files that fail to parse
    /// are skipped with a warning.
    pub fn load_from_disk(&mut self) -> Result<usize> {
        let Some(ref path) = self.persist_path else {
            return Ok(0);
        };

        if !path.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let Some(id) = file_path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let content = std::fs::read_to_string(&file_path)?;
            match WorkflowDocument::from_json(&content) {
                Ok(document) => {
                    log::info!("Loaded workflow '{}' from {:?}", id, file_path);
                    self.documents.insert(id, document);
                    count += 1;
                }
                Err(e) => {
                    log::warn!("Failed to parse workflow from {:?}: {}", file_path, e);
                }
            }
        }
        Ok(count)
    }

    /// Path of the file backing `id`; ids must be plain file stems
    fn file_for(&self, id: &str) -> Result<Option<PathBuf>> {
        validate_id(id)?;
        Ok(self
            .persist_path
            .as_ref()
            .map(|path| path.join(format!("{}.json", id))))
    }

    /// Save a document to disk (if persistence is enabled).
    fn save_to_disk(&self, id: &str, document: &WorkflowDocument) -> Result<()> {
        let Some(file_path) = self.file_for(id)? else {
            return Ok(());
        };
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, document.to_json_pretty()?)?;
        log::info!("Saved workflow '{}' to {:?}", id, file_path);
        Ok(())
    }

    /// Delete a document from disk (if persistence is enabled).
    fn delete_from_disk(&self, id: &str) -> Result<()> {
        let Some(file_path) = self.file_for(id)? else {
            return Ok(());
        };
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
            log::debug!("Deleted workflow '{}' from {:?}", id, file_path);
        }
        Ok(())
    }

    /// Remove a document by ID.
    ///
    /// Returns the removed document if it existed.
    pub fn remove(&mut self, id: &str) -> Result<Option<WorkflowDocument>> {
        self.delete_from_disk(id)?;
        Ok(self.documents.remove(id))
    }

    /// Check if a document exists.
    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }
}

fn validate_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\']);
    if invalid {
        return Err(EditorError::InvalidDocumentId(id.to_string()));
    }
    Ok(())
}

impl WorkflowPersistence for DocumentStore {
    fn save(&mut self, id: &str, document: &WorkflowDocument) -> Result<()> {
        self.save_to_disk(id, document)?;
        self.documents.insert(id.to_string(), document.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<WorkflowDocument> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| EditorError::DocumentNotFound(id.to_string()))
    }

    fn list(&self) -> Vec<DocumentMetadata> {
        let mut list: Vec<DocumentMetadata> = self
            .documents
            .iter()
            .map(|(id, d)| DocumentMetadata {
                id: id.clone(),
                name: d.name.clone(),
                step_count: d.steps.len(),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

impl Workflow {
    /// Rectify, serialize and hand the workflow to a persistence backend
    ///
    /// The unsaved-changes flag is cleared only when the backend accepts
    /// the document.
    pub fn save_to(&mut self, store: &mut dyn WorkflowPersistence, id: &str) -> Result<()> {
        let document = self.prepare_save();
        store.save(id, &document)?;
        self.mark_saved();
        Ok(())
    }

    /// Replace the graph with a stored document
    pub fn load_from(&mut self, store: &dyn WorkflowPersistence, id: &str) -> Result<()> {
        let document = store.load(id)?;
        self.load_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::datatypes::sample_registry;
    use crate::types::PortDefinition;
    use tempfile::TempDir;

    fn create_test_document(name: &str) -> WorkflowDocument {
        WorkflowBuilder::new(name)
            .add_data_input("Input dataset")
            .add_tool("sort1", "Sort")
            .with_input(PortDefinition::new("input", ["tabular"]))
            .with_output(PortDefinition::new("out_file1", ["tabular"]))
            .connect(0, "output", 1, "input")
            .build()
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = DocumentStore::new();
        store.save("test-1", &create_test_document("Test")).unwrap();

        assert!(store.load("test-1").is_ok());
        assert!(matches!(
            store.load("nonexistent"),
            Err(EditorError::DocumentNotFound(_))
        ));

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].step_count, 2);

        assert!(store.remove("test-1").unwrap().is_some());
        assert!(!store.contains("test-1"));
    }

    #[test]
    fn test_persistent_store() {
        let temp_dir = TempDir::new().unwrap();
        let persist_path = temp_dir.path().join("workflows");

        {
            let mut store = DocumentStore::with_persistence(&persist_path);
            store.save("persist-test", &create_test_document("Persistent")).unwrap();
        }

        {
            let mut store = DocumentStore::with_persistence(&persist_path);
            let count = store.load_from_disk().unwrap();
            assert_eq!(count, 1);
            assert_eq!(store.load("persist-test").unwrap().name, "Persistent");
        }
    }

    #[test]
    fn test_ids_cannot_escape_the_store_directory() {
        let temp_dir = TempDir::new().unwrap();
        let persist_path = temp_dir.path().join("workflows");
        let mut store = DocumentStore::with_persistence(&persist_path);
        let document = create_test_document("Escape");

        for id in ["../outside", "nested/inner", "..\\outside", "..", ""] {
            let err = store.save(id, &document).unwrap_err();
            assert!(matches!(err, EditorError::InvalidDocumentId(_)), "{}", id);
        }
        assert!(!temp_dir.path().join("outside.json").exists());
        assert!(store.list().is_empty());
        assert!(store.remove("../outside").is_err());

        store.save("plain-id", &document).unwrap();
        assert!(persist_path.join("plain-id.json").exists());
    }

    #[test]
    fn test_unparseable_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = DocumentStore::with_persistence(temp_dir.path());
        assert_eq!(store.load_from_disk().unwrap(), 0);
    }

    #[test]
    fn test_workflow_save_and_load() {
        let mut store = DocumentStore::new();
        let mut workflow =
            Workflow::from_document(&create_test_document("Sort"), sample_registry()).unwrap();
        workflow.set_name("Sort renamed");
        assert!(workflow.has_changes());

        workflow.save_to(&mut store, "sort").unwrap();
        assert!(!workflow.has_changes());

        let mut reloaded = Workflow::new("", sample_registry());
        reloaded.load_from(&store, "sort").unwrap();
        assert_eq!(reloaded.name(), "Sort renamed");
        assert_eq!(reloaded.to_document(), workflow.to_document());
    }
}
