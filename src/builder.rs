// Runtime mutation builders. Generated per-entity builders are thin typed
// wrappers over these: they accumulate field-sets and edge-sets, and
// save() runs the full pipeline - before-hooks, default injection, required
// checks, validators, spec construction, atomic execution, after-hooks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{EntError, EntResult};
use crate::executor::{GraphExecutor, Node};
use crate::hooks::{HookTiming, MutationCtx, MutationOp};
use crate::schema::registry::{EdgeLayout, EntityLayout};
use crate::spec::{CreateSpec, DeleteSpec, EdgeSpec, FieldSet, Predicate, UpdateManySpec, UpdateSpec};
use crate::value::Value;

fn unknown_field(layout: &EntityLayout, name: &str) -> EntError {
    EntError::Schema(format!(
        "entity \"{}\" has no field \"{}\"",
        layout.entity, name
    ))
}

fn unknown_edge(layout: &EntityLayout, name: &str) -> EntError {
    EntError::Schema(format!(
        "entity \"{}\" has no edge \"{}\"",
        layout.entity, name
    ))
}

fn edge_layout<'a>(layout: &'a EntityLayout, name: &str) -> EntResult<&'a EdgeLayout> {
    layout.edge(name).ok_or_else(|| unknown_edge(layout, name))
}

/// Builder for node creation.
pub struct NodeCreate {
    layout: Arc<EntityLayout>,
    fields: BTreeMap<String, Value>,
    edges: BTreeMap<String, Vec<i64>>,
}

impl NodeCreate {
    pub fn new(layout: Arc<EntityLayout>) -> Self {
        Self {
            layout,
            fields: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Set a field value. Names and types are checked at save().
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Attach targets along an edge. Repeated calls accumulate.
    pub fn add_edge(mut self, edge: &str, ids: &[i64]) -> Self {
        self.edges.entry(edge.to_string()).or_default().extend(ids);
        self
    }

    pub async fn save(self, exec: &GraphExecutor) -> EntResult<Node> {
        let layout = self.layout.clone();

        for name in self.fields.keys() {
            if layout.field(name).is_none() {
                return Err(unknown_field(&layout, name));
            }
        }
        for name in self.edges.keys() {
            edge_layout(&layout, name)?;
        }

        // Before-hooks may inject or rewrite field values.
        let mut ctx = MutationCtx {
            layout: layout.clone(),
            op: MutationOp::Create,
            node_id: None,
            fields: self.fields,
            metadata: HashMap::new(),
        };
        exec.hooks()
            .run(&layout.entity, MutationOp::Create, HookTiming::Before, &mut ctx)
            .await?;
        let mut fields = ctx.fields;

        // Defaults apply only where nothing was set explicitly.
        for field in &layout.fields {
            if let Some(default) = &field.def.default {
                fields
                    .entry(field.def.name.clone())
                    .or_insert_with(|| default.materialize());
            }
        }

        // Required fields, then type checks and validators.
        for field in &layout.fields {
            let value = fields.get(&field.def.name);
            let missing = matches!(value, None | Some(Value::Null));
            if missing && !field.def.optional {
                return Err(EntError::MissingRequired(field.def.name.clone()));
            }
            if let Some(value) = value {
                field.def.check(value)?;
            }
        }

        // Required edges must be attached at create time.
        for edge in &layout.edges {
            if edge.required {
                let attached = self
                    .edges
                    .get(&edge.name)
                    .map(|ids| !ids.is_empty())
                    .unwrap_or(false);
                if !attached {
                    return Err(EntError::MissingRequired(format!("edge {}", edge.name)));
                }
            }
        }

        let id = exec.next_id();
        let mut field_sets = Vec::new();
        for field in &layout.fields {
            if let Some(value) = fields.get(&field.def.name) {
                if !value.is_null() {
                    field_sets.push(FieldSet {
                        column: field.column.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        let mut edge_specs = Vec::new();
        for (name, ids) in &self.edges {
            if ids.is_empty() {
                continue;
            }
            let edge = edge_layout(&layout, name)?;
            edge_specs.push(EdgeSpec::new(edge, ids.clone())?);
        }

        exec.create(CreateSpec {
            entity: layout.entity.clone(),
            table: layout.table.clone(),
            id_column: layout.id_column.clone(),
            id,
            fields: field_sets,
            edges: edge_specs,
        })
        .await?;

        let mut after = MutationCtx {
            layout: layout.clone(),
            op: MutationOp::Create,
            node_id: Some(id),
            fields,
            metadata: HashMap::new(),
        };
        exec.hooks()
            .run(&layout.entity, MutationOp::Create, HookTiming::After, &mut after)
            .await?;

        exec.node_strict(&layout, id).await
    }
}

/// Builder for a single-node update.
pub struct NodeUpdateOne {
    layout: Arc<EntityLayout>,
    node_id: i64,
    sets: BTreeMap<String, Value>,
    clears: Vec<String>,
    edge_adds: BTreeMap<String, Vec<i64>>,
    edge_removes: BTreeMap<String, Vec<i64>>,
    edge_clears: Vec<String>,
}

impl NodeUpdateOne {
    pub fn new(layout: Arc<EntityLayout>, node_id: i64) -> Self {
        Self {
            layout,
            node_id,
            sets: BTreeMap::new(),
            clears: Vec::new(),
            edge_adds: BTreeMap::new(),
            edge_removes: BTreeMap::new(),
            edge_clears: Vec::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.sets.insert(field.to_string(), value.into());
        self
    }

    /// Reset an optional field to NULL.
    pub fn clear(mut self, field: &str) -> Self {
        self.clears.push(field.to_string());
        self
    }

    pub fn add_edge(mut self, edge: &str, ids: &[i64]) -> Self {
        self.edge_adds.entry(edge.to_string()).or_default().extend(ids);
        self
    }

    pub fn remove_edge(mut self, edge: &str, ids: &[i64]) -> Self {
        self.edge_removes
            .entry(edge.to_string())
            .or_default()
            .extend(ids);
        self
    }

    /// Detach every target currently attached along the edge.
    pub fn clear_edge(mut self, edge: &str) -> Self {
        self.edge_clears.push(edge.to_string());
        self
    }

    pub async fn save(self, exec: &GraphExecutor) -> EntResult<Node> {
        let layout = self.layout.clone();

        for name in self.sets.keys() {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            if field.def.immutable {
                return Err(EntError::Validation(format!(
                    "field \"{}\" is immutable",
                    name
                )));
            }
        }
        for name in &self.clears {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            if field.def.immutable {
                return Err(EntError::Validation(format!(
                    "field \"{}\" is immutable",
                    name
                )));
            }
            if !field.def.optional {
                return Err(EntError::Validation(format!(
                    "required field \"{}\" cannot be cleared",
                    name
                )));
            }
        }
        for name in self
            .edge_adds
            .keys()
            .chain(self.edge_removes.keys())
            .chain(self.edge_clears.iter())
        {
            let edge = edge_layout(&layout, name)?;
            if edge.immutable {
                return Err(EntError::Validation(format!(
                    "edge \"{}\" is immutable",
                    name
                )));
            }
        }
        for name in &self.edge_clears {
            let edge = edge_layout(&layout, name)?;
            if edge.required {
                return Err(EntError::Validation(format!(
                    "required edge \"{}\" cannot be cleared",
                    name
                )));
            }
        }

        let mut ctx = MutationCtx {
            layout: layout.clone(),
            op: MutationOp::UpdateOne,
            node_id: Some(self.node_id),
            fields: self.sets,
            metadata: HashMap::new(),
        };
        exec.hooks()
            .run(&layout.entity, MutationOp::UpdateOne, HookTiming::Before, &mut ctx)
            .await?;
        let sets = ctx.fields;

        for (name, value) in &sets {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            field.def.check(value)?;
            if !field.def.optional && value.is_null() {
                return Err(EntError::Validation(format!(
                    "required field \"{}\" cannot be set to null",
                    name
                )));
            }
        }

        let mut field_sets = Vec::new();
        for (name, value) in &sets {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            field_sets.push(FieldSet {
                column: field.column.clone(),
                value: value.clone(),
            });
        }
        let mut clear_columns = Vec::new();
        for name in &self.clears {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            clear_columns.push(field.column.clone());
        }

        let mut edge_adds = Vec::new();
        for (name, ids) in &self.edge_adds {
            let edge = edge_layout(&layout, name)?;
            edge_adds.push(EdgeSpec::new(edge, ids.clone())?);
        }
        let mut edge_removes = Vec::new();
        for (name, ids) in &self.edge_removes {
            let edge = edge_layout(&layout, name)?;
            // Removal lists are exempt from the unique-edge arity check.
            let mut spec = EdgeSpec::new(edge, Vec::new())?;
            spec.target_ids = ids.clone();
            edge_removes.push(spec);
        }
        let mut edge_clears = Vec::new();
        for name in &self.edge_clears {
            let edge = edge_layout(&layout, name)?;
            edge_clears.push(EdgeSpec::new(edge, Vec::new())?);
        }

        exec.update_one(UpdateSpec {
            entity: layout.entity.clone(),
            table: layout.table.clone(),
            id_column: layout.id_column.clone(),
            node_id: self.node_id,
            sets: field_sets,
            clears: clear_columns,
            edge_adds,
            edge_removes,
            edge_clears,
        })
        .await?;

        let mut after = MutationCtx {
            layout: layout.clone(),
            op: MutationOp::UpdateOne,
            node_id: Some(self.node_id),
            fields: sets,
            metadata: HashMap::new(),
        };
        exec.hooks()
            .run(&layout.entity, MutationOp::UpdateOne, HookTiming::After, &mut after)
            .await?;

        exec.node_strict(&layout, self.node_id).await
    }
}

/// Builder for predicate-scoped bulk field updates. Edge operations need a
/// node id and go through NodeUpdateOne; hooks do not run for bulk updates.
pub struct NodeUpdate {
    layout: Arc<EntityLayout>,
    filters: Vec<Filter>,
    sets: BTreeMap<String, Value>,
    clears: Vec<String>,
}

/// Accumulated filters, resolved against the layout at save() so unknown
/// field names fail as Schema errors rather than raw SQL errors.
enum Filter {
    Eq(String, Value),
    IsNull(String),
    Ids(Vec<i64>),
}

impl NodeUpdate {
    pub fn new(layout: Arc<EntityLayout>) -> Self {
        Self {
            layout,
            filters: Vec::new(),
            sets: BTreeMap::new(),
            clears: Vec::new(),
        }
    }

    /// Restrict to nodes where `field = value`.
    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// Restrict to nodes where `field IS NULL`.
    pub fn filter_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::IsNull(field.to_string()));
        self
    }

    /// Restrict to the given node ids.
    pub fn filter_ids(mut self, ids: &[i64]) -> Self {
        self.filters.push(Filter::Ids(ids.to_vec()));
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.sets.insert(field.to_string(), value.into());
        self
    }

    pub fn clear(mut self, field: &str) -> Self {
        self.clears.push(field.to_string());
        self
    }

    /// Execute, returning the number of nodes updated.
    pub async fn save(self, exec: &GraphExecutor) -> EntResult<u64> {
        let layout = self.layout.clone();

        let mut field_sets = Vec::new();
        for (name, value) in &self.sets {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            if field.def.immutable {
                return Err(EntError::Validation(format!(
                    "field \"{}\" is immutable",
                    name
                )));
            }
            field.def.check(value)?;
            field_sets.push(FieldSet {
                column: field.column.clone(),
                value: value.clone(),
            });
        }
        let mut clear_columns = Vec::new();
        for name in &self.clears {
            let field = layout.field(name).ok_or_else(|| unknown_field(&layout, name))?;
            if !field.def.optional {
                return Err(EntError::Validation(format!(
                    "required field \"{}\" cannot be cleared",
                    name
                )));
            }
            clear_columns.push(field.column.clone());
        }

        let mut predicates = Vec::new();
        for filter in self.filters {
            predicates.push(match filter {
                Filter::Eq(name, value) => {
                    let field =
                        layout.field(&name).ok_or_else(|| unknown_field(&layout, &name))?;
                    Predicate::FieldEq(field.column.clone(), value)
                }
                Filter::IsNull(name) => {
                    let field =
                        layout.field(&name).ok_or_else(|| unknown_field(&layout, &name))?;
                    Predicate::FieldIsNull(field.column.clone())
                }
                Filter::Ids(ids) => Predicate::IdIn(ids),
            });
        }

        exec.update_many(UpdateManySpec {
            entity: layout.entity.clone(),
            table: layout.table.clone(),
            id_column: layout.id_column.clone(),
            predicates,
            sets: field_sets,
            clears: clear_columns,
        })
        .await
    }
}

/// Builder for node deletion.
pub struct NodeDelete {
    layout: Arc<EntityLayout>,
    node_id: i64,
}

impl NodeDelete {
    pub fn new(layout: Arc<EntityLayout>, node_id: i64) -> Self {
        Self { layout, node_id }
    }

    pub async fn exec(self, exec: &GraphExecutor) -> EntResult<()> {
        let layout = self.layout.clone();

        let mut ctx = MutationCtx {
            layout: layout.clone(),
            op: MutationOp::Delete,
            node_id: Some(self.node_id),
            fields: BTreeMap::new(),
            metadata: HashMap::new(),
        };
        exec.hooks()
            .run(&layout.entity, MutationOp::Delete, HookTiming::Before, &mut ctx)
            .await?;

        let mut edges = Vec::new();
        for edge in &layout.edges {
            edges.push(EdgeSpec::new(edge, Vec::new())?);
        }

        exec.delete(DeleteSpec {
            entity: layout.entity.clone(),
            table: layout.table.clone(),
            id_column: layout.id_column.clone(),
            node_id: self.node_id,
            edges,
        })
        .await?;

        exec.hooks()
            .run(&layout.entity, MutationOp::Delete, HookTiming::After, &mut ctx)
            .await?;
        Ok(())
    }
}
