//! Schema catalog contract consumed from the schema registry.
//!
//! The registry itself lives outside this crate. Callers hand in something
//! implementing [`SchemaRegistry`]; a slice of [`ResultSchema`] values works
//! directly, and [`InMemoryCatalog`] adds an id index for larger catalogs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One field of a schema as described by the registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Stable field identifier.
    pub id: String,
    /// Field name as it appears in result rows.
    #[serde(default)]
    pub name: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Hidden fields are left out of rendered columns by default.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl FieldDef {
    /// Creates a field whose id and name are both `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            label: String::new(),
            hidden: false,
        }
    }

    /// Overrides the field name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Marks the field hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Returns true when `name` refers to this field by id or by name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.id == name || self.name == name
    }

    /// Label to render, falling back to the name and then the id.
    pub fn display_label(&self) -> &str {
        if !self.label.is_empty() {
            &self.label
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}

/// Schema description; the order of `fields` is the natural column order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSchema {
    /// Schema identifier.
    pub id: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Ordered field list.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ResultSchema {
    /// Creates a schema without fields.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends plain fields named after their ids.
    pub fn with_fields<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(ids.into_iter().map(FieldDef::new));
        self
    }

    /// Position of the field answering to `name`.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.answers_to(name))
    }

    /// Field answering to `name`.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.answers_to(name))
    }

    /// Label to render, falling back to the id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Resolves schema ids to their registry descriptions.
pub trait SchemaRegistry {
    /// Looks up a schema by exact id.
    fn lookup(&self, schema_id: &str) -> Option<&ResultSchema>;
}

impl SchemaRegistry for [ResultSchema] {
    fn lookup(&self, schema_id: &str) -> Option<&ResultSchema> {
        self.iter().find(|schema| schema.id == schema_id)
    }
}

impl SchemaRegistry for Vec<ResultSchema> {
    fn lookup(&self, schema_id: &str) -> Option<&ResultSchema> {
        self.as_slice().lookup(schema_id)
    }
}

/// Indexed in-memory catalog used by the CLI and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    schemas: Vec<ResultSchema>,
    index: HashMap<String, usize>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema, replacing any previous schema with the same id.
    pub fn with_schema(mut self, schema: ResultSchema) -> Self {
        self.insert(schema);
        self
    }

    /// Adds a schema, replacing any previous schema with the same id.
    pub fn insert(&mut self, schema: ResultSchema) {
        match self.index.get(&schema.id) {
            Some(&idx) => self.schemas[idx] = schema,
            None => {
                self.index.insert(schema.id.clone(), self.schemas.len());
                self.schemas.push(schema);
            }
        }
    }

    /// Schemas in insertion order.
    pub fn schemas(&self) -> &[ResultSchema] {
        &self.schemas
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true when no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<ResultSchema> for InMemoryCatalog {
    fn from_iter<T: IntoIterator<Item = ResultSchema>>(iter: T) -> Self {
        let mut catalog = InMemoryCatalog::new();
        for schema in iter {
            catalog.insert(schema);
        }
        catalog
    }
}

impl SchemaRegistry for InMemoryCatalog {
    fn lookup(&self, schema_id: &str) -> Option<&ResultSchema> {
        self.index.get(schema_id).map(|&idx| &self.schemas[idx])
    }
}
