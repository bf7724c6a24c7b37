use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DraftError, DraftResult};
use crate::richtext::content_document::ContentDocument;
use crate::richtext::html_converter::{document_to_html, html_to_document};
use crate::richtext::raw::{RawContentState, raw_to_document};

const HTML_EXTENSION: &str = "html";
const RAW_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub path: PathBuf,
    pub document: ContentDocument,
}

/// A document that could not be read or references missing entities
#[derive(Debug)]
pub struct CheckFailure {
    pub name: String,
    pub error: DraftError,
}

pub struct DocumentStore {
    base_path: PathBuf,
}

fn has_document_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some(HTML_EXTENSION) | Some(RAW_EXTENSION)
    )
}

/// Read a document file: raw content state for .json, HTML otherwise
pub fn read_document(path: &Path) -> DraftResult<ContentDocument> {
    let content = fs::read_to_string(path).map_err(|err| DraftError::io(path, err))?;

    if path.extension().and_then(|s| s.to_str()) == Some(RAW_EXTENSION) {
        let raw: RawContentState = serde_json::from_str(&content)?;
        Ok(raw_to_document(&raw))
    } else {
        Ok(html_to_document(&content))
    }
}

impl DocumentStore {
    pub fn new(base_path: PathBuf) -> Self {
        DocumentStore { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a name (with or without extension) to a file path.
    /// An existing .json file wins over a missing .html one.
    fn resolve(&self, name: &str) -> PathBuf {
        let path = self.base_path.join(name);
        if has_document_extension(&path) {
            return path;
        }

        let raw_path = path.with_extension(RAW_EXTENSION);
        let html_path = path.with_extension(HTML_EXTENSION);
        if !html_path.exists() && raw_path.exists() {
            raw_path
        } else {
            html_path
        }
    }

    /// Load a document by name.
    /// If the file doesn't exist, creates an empty document that will be saved on first write
    pub fn load(&self, name: &str) -> DraftResult<StoredDocument> {
        let path = self.resolve(name);

        let document = match fs::metadata(&path) {
            Ok(_) => read_document(&path)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(name, "new document");
                ContentDocument::new()
            }
            Err(err) => return Err(DraftError::io(&path, err)),
        };

        Ok(StoredDocument {
            name: name.to_string(),
            path,
            document,
        })
    }

    /// Recursively list all documents in the directory and subdirectories
    /// Returns relative paths from base_path without extension (e.g., "news/launch")
    pub fn list_all_documents(&self) -> DraftResult<Vec<String>> {
        let mut docs = Vec::new();

        for entry in WalkDir::new(&self.base_path).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&self.base_path).to_path_buf();
                DraftError::io(path, err.into())
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_document_extension(path) {
                continue;
            }

            if let Ok(relative) = path.strip_prefix(&self.base_path) {
                let name = relative.with_extension("");
                let name: Vec<String> = name
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                docs.push(name.join("/"));
            }
        }

        docs.sort();
        docs.dedup();
        Ok(docs)
    }

    /// Save document content as HTML.
    /// Creates parent directories if they don't exist
    pub fn save(&self, doc: &StoredDocument) -> DraftResult<PathBuf> {
        let path = doc.path.with_extension(HTML_EXTENSION);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| DraftError::io(parent, err))?;
        }

        fs::write(&path, document_to_html(&doc.document)).map_err(|err| DraftError::io(&path, err))?;
        Ok(path)
    }

    /// Validate every stored document, collecting the ones that fail
    pub fn check_all(&self) -> DraftResult<Vec<CheckFailure>> {
        let mut failures = Vec::new();

        for name in self.list_all_documents()? {
            let result = self
                .load(&name)
                .and_then(|stored| stored.document.validate());
            if let Err(error) = result {
                failures.push(CheckFailure { name, error });
            }
        }

        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_store(name: &str) -> (PathBuf, DocumentStore) {
        let temp_dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).unwrap();
        (temp_dir.clone(), DocumentStore::new(temp_dir))
    }

    #[test]
    fn test_load_non_existent_file() {
        let (temp_dir, store) = temp_store("draft-editor-test-load");

        let doc = store.load("non-existent").unwrap();

        assert!(doc.document.is_empty());
        assert_eq!(doc.name, "non-existent");
        assert_eq!(doc.path, temp_dir.join("non-existent.html"));

        // Cleanup
        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_load_raw_json() {
        let (temp_dir, store) = temp_store("draft-editor-test-load-raw");
        fs::write(
            temp_dir.join("note.json"),
            r#"{"blocks":[{"key":"a","text":"from raw","type":"unstyled"}],"entityMap":{}}"#,
        )
        .unwrap();

        let doc = store.load("note").unwrap();
        assert_eq!(doc.path, temp_dir.join("note.json"));
        assert_eq!(doc.document.to_plain_text(), "from raw");

        // Cleanup
        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let (temp_dir, store) = temp_store("draft-editor-test-save");

        let mut doc = store.load("nested/dir/page").unwrap();
        doc.document = ContentDocument::with_paragraph("Test content");

        let path = store.save(&doc).unwrap();

        // Verify file was created
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>Test content</p>");
        assert_eq!(store.load("nested/dir/page").unwrap().document.to_plain_text(), "Test content");

        // Cleanup
        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_list_all_documents_recursive() {
        let (temp_dir, store) = temp_store("draft-editor-test-list-all");

        // Create some test files
        fs::write(temp_dir.join("root.html"), "<p>root</p>").unwrap();
        fs::write(temp_dir.join("notes.txt"), "ignored").unwrap();
        fs::create_dir_all(temp_dir.join("dir1/subdir")).unwrap();
        fs::write(temp_dir.join("dir1/page1.json"), "{\"blocks\":[]}").unwrap();
        fs::write(temp_dir.join("dir1/subdir/page2.html"), "<p>page2</p>").unwrap();

        let docs = store.list_all_documents().unwrap();

        assert_eq!(docs, vec!["dir1/page1", "dir1/subdir/page2", "root"]);

        // Cleanup
        fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_check_all_reports_broken_documents() {
        let (temp_dir, store) = temp_store("draft-editor-test-check");
        fs::write(temp_dir.join("good.html"), "<p>fine</p>").unwrap();
        fs::write(temp_dir.join("bad.json"), "{\"blocks\": [").unwrap();

        let failures = store.check_all().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "bad");
        assert!(matches!(failures[0].error, DraftError::Json(_)));

        // Cleanup
        fs::remove_dir_all(&temp_dir).ok();
    }
}
