use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata attached to a retrieved chunk. Keys are always strings, values
/// keep whatever shape the vector store handed back.
pub type Metadata = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    fn write_literal(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '\n' => f.write_str("\\n")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Null => f.write_str("None"),
            MetadataValue::Bool(true) => f.write_str("True"),
            MetadataValue::Bool(false) => f.write_str("False"),
            MetadataValue::Int(n) => write!(f, "{}", n),
            // Debug keeps the fractional part: 3.0 stays "3.0"
            MetadataValue::Float(x) => write!(f, "{:?}", x),
            MetadataValue::Str(s) => f.write_str(s),
            MetadataValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_literal(f)?;
                }
                f.write_str("]")
            }
            MetadataValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    MetadataValue::Str(key.clone()).write_literal(f)?;
                    f.write_str(": ")?;
                    value.write_literal(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

/// One chunk returned by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(alias = "page_content")]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentRecord {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A retriever hit, either already structured or still in the stringified
/// `page_content=... metadata={...}` form some stores emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievedDocument {
    Structured(DocumentRecord),
    Serialized(String),
}

impl From<DocumentRecord> for RetrievedDocument {
    fn from(record: DocumentRecord) -> Self {
        RetrievedDocument::Structured(record)
    }
}

/// Which index a question is answered from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Preprocessed,
    Uploaded,
}

/// A (user message, assistant answer) pair as shown in the chat window.
pub type ChatExchange = (String, String);

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatExchange>,
    #[serde(default)]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    /// Always empty; clears the input box on the client.
    pub message: String,
    pub history: Vec<ChatExchange>,
    pub references: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub liked: bool,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferencesRequest {
    pub documents: Vec<RetrievedDocument>,
}

#[derive(Debug, Serialize)]
pub struct ReferencesResponse {
    pub references: String,
}

// Collaborator wire models
#[derive(Debug, Serialize)]
pub struct RetrievalQuery<'a> {
    pub query: &'a str,
    pub k: usize,
    pub collection: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub documents: Vec<RetrievedDocument>,
}
