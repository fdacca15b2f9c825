// Schema DSL - declarative entity definitions resolved into storage layouts.
// Developers declare schemas as types implementing EntSchema; the registry
// validates them and computes the concrete relational mapping.

pub mod edge;
pub mod field;
pub mod registry;

pub use edge::{Cardinality, EdgeDefinition};
pub use field::{FieldDefault, FieldDefinition, FieldType, FieldValidator};
pub use registry::{EdgeLayout, EdgeStorage, EntityLayout, FieldColumn, GraphLayout, SchemaRegistry};

use serde::{Deserialize, Serialize};

/// Secondary index declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, fields: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.into_iter().map(|s| s.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A fully declared entity: fields, edges and indexes plus table mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldDefinition>,
    pub edges: Vec<EdgeDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl EntitySchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: format!("{}s", name),
            fields: Vec::new(),
            edges: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Override the default `<name>s` table name.
    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn edge(mut self, edge: EdgeDefinition) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Schema definition trait - declare an entity as a type, the way the ent
/// framework declares `ent.Schema` types.
pub trait EntSchema {
    fn schema() -> EntitySchema;
}
