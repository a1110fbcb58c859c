//! Metadata schema and the per-document metadata store.
//!
//! The set of metadata fields is not fixed: a [`MetadataSchema`] maps field
//! keys (as stored by the backend) to the labels used when the fields are
//! rendered into prompts and exports. Field order in the schema is the order
//! sections appear in a composed prompt.

use crate::novel::DocumentMetadata;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Key of the field that receives attached library characters.
pub const CHARACTERS_FIELD: &str = "characters";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    pub key: String,
    pub label: String,
}

impl MetadataField {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSchema {
    fields: Vec<MetadataField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Empty,
    MalformedEntry(String),
    DuplicateKey(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "metadata schema has no fields"),
            Self::MalformedEntry(entry) => {
                write!(f, "metadata schema entry `{entry}` is not `key=Label`")
            }
            Self::DuplicateKey(key) => write!(f, "metadata field `{key}` is listed twice"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl MetadataSchema {
    pub fn new(fields: Vec<MetadataField>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateKey(field.key.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Characters, glossary and knowledge.
    pub fn glossary_revision() -> Self {
        Self {
            fields: vec![
                MetadataField::new(CHARACTERS_FIELD, "Characters"),
                MetadataField::new("glossary", "Glossary"),
                MetadataField::new("knowledge", "Knowledge"),
            ],
        }
    }

    /// Characters, knowledge and the prompt library.
    pub fn prompt_library_revision() -> Self {
        Self {
            fields: vec![
                MetadataField::new(CHARACTERS_FIELD, "Characters"),
                MetadataField::new("knowledge", "Knowledge"),
                MetadataField::new("prompt_library", "Prompt library"),
            ],
        }
    }

    pub fn fields(&self) -> &[MetadataField] {
        &self.fields
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|field| field.key == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.label.as_str())
    }
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self::prompt_library_revision()
    }
}

/// Accepts a preset name (`glossary`, `prompt-library`) or a comma separated
/// `key=Label` list.
impl FromStr for MetadataSchema {
    type Err = SchemaError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "glossary" => return Ok(Self::glossary_revision()),
            "prompt-library" | "prompt_library" => return Ok(Self::prompt_library_revision()),
            _ => {}
        }

        let mut fields = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((key, label)) = entry.split_once('=') else {
                return Err(SchemaError::MalformedEntry(entry.to_string()));
            };
            let (key, label) = (key.trim(), label.trim());
            if key.is_empty() || label.is_empty() {
                return Err(SchemaError::MalformedEntry(entry.to_string()));
            }
            fields.push(MetadataField::new(key, label));
        }
        Self::new(fields)
    }
}

/// Structured fields of the open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStore {
    schema: MetadataSchema,
    values: HashMap<String, String>,
}

impl MetadataStore {
    pub fn new(schema: MetadataSchema) -> Self {
        Self {
            schema,
            values: HashMap::new(),
        }
    }

    /// Keeps only the fields the schema knows about.
    pub fn from_metadata(schema: MetadataSchema, metadata: &DocumentMetadata) -> Self {
        let values = schema
            .fields()
            .iter()
            .filter_map(|field| {
                metadata
                    .get(&field.key)
                    .map(|value| (field.key.clone(), value.clone()))
            })
            .collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        if !self.schema.contains(key) {
            return false;
        }
        self.values.insert(key.to_string(), value.into());
        true
    }

    /// Appends `block` to a field, separated by a blank line when the field
    /// already has text.
    pub fn append_block(&mut self, key: &str, block: &str) -> bool {
        if !self.schema.contains(key) {
            return false;
        }
        let value = self.values.entry(key.to_string()).or_default();
        if !value.trim().is_empty() {
            value.push_str("\n\n");
        }
        value.push_str(block);
        true
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|value| value.trim().is_empty())
    }

    /// Non-blank fields as `(label, trimmed value)`, in schema order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.schema.fields().iter().filter_map(|field| {
            let value = self.get(&field.key).trim();
            (!value.is_empty()).then_some((field.label.as_str(), value))
        })
    }

    /// Every schema field, blank ones included, for the save payload.
    pub fn to_metadata(&self) -> DocumentMetadata {
        self.schema
            .fields()
            .iter()
            .map(|field| (field.key.clone(), self.get(&field.key).to_string()))
            .collect()
    }
}
