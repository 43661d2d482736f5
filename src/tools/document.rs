//! Document creation and update tools.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::Tool;

/// A document created during a turn.
#[derive(Debug, Clone)]
pub struct Document {
    /// Document ID.
    pub id: String,
    /// Title.
    pub title: String,
    /// Content.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// In-process document storage shared across turns.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document and return its ID.
    pub fn create(&self, title: String, content: String) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.documents.lock().insert(
            id.clone(),
            Document {
                id: id.clone(),
                title,
                content,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Replace a document's content. Returns false if the ID is unknown.
    pub fn update(&self, id: &str, content: String) -> bool {
        let mut documents = self.documents.lock();
        match documents.get_mut(id) {
            Some(doc) => {
                doc.content = content;
                doc.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Fetch a document by ID.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.lock().get(id).cloned()
    }
}

/// Tool that creates a new document.
#[derive(Debug)]
pub struct CreateDocumentTool {
    store: Arc<DocumentStore>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    title: String,
    content: String,
}

impl CreateDocumentTool {
    /// Create the tool over a store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateDocumentTool {
    fn name(&self) -> &'static str {
        "create_document"
    }

    fn description(&self) -> &'static str {
        "Create a document with a title and content, returning its ID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["title", "content"]
        })
    }

    async fn execute(&self, arguments: &str) -> anyhow::Result<String> {
        let args: CreateArgs = serde_json::from_str(arguments)?;
        let id = self.store.create(args.title, args.content);
        Ok(serde_json::json!({ "document_id": id }).to_string())
    }
}

/// Tool that replaces an existing document's content.
#[derive(Debug)]
pub struct UpdateDocumentTool {
    store: Arc<DocumentStore>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    document_id: String,
    content: String,
}

impl UpdateDocumentTool {
    /// Create the tool over a store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateDocumentTool {
    fn name(&self) -> &'static str {
        "update_document"
    }

    fn description(&self) -> &'static str {
        "Replace the content of an existing document by ID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_id": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["document_id", "content"]
        })
    }

    async fn execute(&self, arguments: &str) -> anyhow::Result<String> {
        let args: UpdateArgs = serde_json::from_str(arguments)?;
        if self.store.update(&args.document_id, args.content) {
            Ok(serde_json::json!({ "updated": true }).to_string())
        } else {
            anyhow::bail!("Document not found: {}", args.document_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_update() {
        let store = Arc::new(DocumentStore::new());
        let create = CreateDocumentTool::new(Arc::clone(&store));
        let update = UpdateDocumentTool::new(Arc::clone(&store));

        let result = create
            .execute(r#"{"title":"Notes","content":"v1"}"#)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        let id = parsed["document_id"].as_str().unwrap();

        update
            .execute(&format!(r#"{{"document_id":"{id}","content":"v2"}}"#))
            .await
            .unwrap();

        assert_eq!(store.get(id).unwrap().content, "v2");
    }

    #[tokio::test]
    async fn update_unknown_document_fails() {
        let store = Arc::new(DocumentStore::new());
        let update = UpdateDocumentTool::new(store);
        assert!(
            update
                .execute(r#"{"document_id":"missing","content":"x"}"#)
                .await
                .is_err()
        );
    }
}
