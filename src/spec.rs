// Graph-mutation specs - the descriptors handed to the executor.
// A spec is a fully resolved description of one node mutation: which table,
// which column values, and which edge attachments/detachments across the
// four cardinalities. Builders produce specs; the executor turns them into
// a SQL statement sequence.

use crate::error::{EntError, EntResult};
use crate::schema::registry::{EdgeLayout, EdgeStorage};
use crate::value::Value;

/// One column assignment on the node row.
#[derive(Debug, Clone)]
pub struct FieldSet {
    pub column: String,
    pub value: Value,
}

/// One edge operation: attach or detach `target_ids` along a resolved edge.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub name: String,
    pub target_entity: String,
    pub target_table: String,
    pub storage: EdgeStorage,
    pub unique: bool,
    pub symmetric: bool,
    pub target_ids: Vec<i64>,
}

impl EdgeSpec {
    pub fn new(layout: &EdgeLayout, target_ids: Vec<i64>) -> EntResult<Self> {
        if layout.is_unique() && target_ids.len() > 1 {
            return Err(EntError::Validation(format!(
                "unique edge \"{}\" cannot attach {} targets",
                layout.name,
                target_ids.len()
            )));
        }
        Ok(Self {
            name: layout.name.clone(),
            target_entity: layout.target.clone(),
            target_table: layout.target_table.clone(),
            storage: layout.storage.clone(),
            unique: layout.is_unique(),
            symmetric: layout.symmetric,
            target_ids,
        })
    }
}

/// Descriptor for node creation.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub entity: String,
    pub table: String,
    pub id_column: String,
    pub id: i64,
    pub fields: Vec<FieldSet>,
    pub edges: Vec<EdgeSpec>,
}

/// Descriptor for a single-node update.
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    pub entity: String,
    pub table: String,
    pub id_column: String,
    pub node_id: i64,
    /// Column assignments.
    pub sets: Vec<FieldSet>,
    /// Columns reset to NULL.
    pub clears: Vec<String>,
    pub edge_adds: Vec<EdgeSpec>,
    pub edge_removes: Vec<EdgeSpec>,
    /// Edges fully detached (all current targets).
    pub edge_clears: Vec<EdgeSpec>,
}

impl UpdateSpec {
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.clears.is_empty()
            && self.edge_adds.is_empty()
            && self.edge_removes.is_empty()
            && self.edge_clears.is_empty()
    }
}

/// Filter for bulk updates. Bulk updates touch fields only; edge
/// operations need a node id and go through UpdateSpec.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// column = value
    FieldEq(String, Value),
    /// column IS NULL
    FieldIsNull(String),
    /// id IN (...)
    IdIn(Vec<i64>),
}

/// Descriptor for a predicate-scoped field update across many nodes.
#[derive(Debug, Clone)]
pub struct UpdateManySpec {
    pub entity: String,
    pub table: String,
    pub id_column: String,
    pub predicates: Vec<Predicate>,
    pub sets: Vec<FieldSet>,
    pub clears: Vec<String>,
}

/// Descriptor for node deletion.
#[derive(Debug, Clone)]
pub struct DeleteSpec {
    pub entity: String,
    pub table: String,
    pub id_column: String,
    pub node_id: i64,
    /// Edges whose storage must be cleaned up alongside the row.
    pub edges: Vec<EdgeSpec>,
}
