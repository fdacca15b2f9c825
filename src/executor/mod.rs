// Graph executor - translates mutation specs into SQL statement sequences
// and runs them atomically. This is the runtime half of the framework: the
// generated builders only ever talk to the database through this module.
//
// Execution plan for a create:
//   1. INSERT of the node row, with FK columns folded in from M2O and
//      inverse-O2O edge specs (client-side snowflake id, so the whole plan
//      is known up front).
//   2. One guarded UPDATE per inverse-FK attachment (O2M / owning O2O); a
//      missing child aborts the transaction as NotFound.
//   3. One junction INSERT per M2M attachment.
// Updates and deletes follow the same shape with clears ordered before
// removes and adds.

pub mod driver;
pub mod statement;

pub use driver::{GraphDriver, PostgresDriver, RawRow, SqliteDriver};
pub use statement::{placeholders, Dialect, RowGuard, Statement};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EntError, EntResult};
use crate::hooks::HookRegistry;
use crate::id::NodeIdGenerator;
use crate::schema::registry::{EdgeStorage, EntityLayout};
use crate::spec::{CreateSpec, DeleteSpec, EdgeSpec, Predicate, UpdateManySpec, UpdateSpec};
use crate::value::Value;

/// A hydrated node row: id plus typed field values keyed by field name.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub entity: String,
    pub values: BTreeMap<String, Value>,
}

impl Node {
    fn from_raw(layout: &EntityLayout, raw: RawRow) -> EntResult<Self> {
        let mut by_column: BTreeMap<String, Value> = raw.into_iter().collect();
        let id = by_column
            .remove(&layout.id_column)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                EntError::Database(anyhow::anyhow!(
                    "row for \"{}\" is missing its id column",
                    layout.entity
                ))
            })?;

        let mut values = BTreeMap::new();
        for field in &layout.fields {
            let raw_value = by_column.remove(&field.column).unwrap_or(Value::Null);
            let typed = Value::hydrate(raw_value, &field.def.field_type)?;
            values.insert(field.def.name.clone(), typed);
        }

        Ok(Node {
            id,
            entity: layout.entity.clone(),
            values,
        })
    }

    pub fn get(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn str(&self, field: &str) -> Option<String> {
        self.values
            .get(field)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    pub fn i64(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(|v| v.as_i64())
    }

    pub fn f64(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(|v| v.as_f64())
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(|v| v.as_bool())
    }

    pub fn time(&self, field: &str) -> Option<DateTime<Utc>> {
        self.values.get(field).and_then(|v| v.as_time())
    }

    pub fn uuid(&self, field: &str) -> Option<Uuid> {
        self.values.get(field).and_then(|v| v.as_uuid())
    }

    pub fn json(&self, field: &str) -> Option<serde_json::Value> {
        self.values.get(field).and_then(|v| v.as_json().cloned())
    }

    pub fn bytes(&self, field: &str) -> Option<Vec<u8>> {
        match self.values.get(field) {
            Some(Value::Bytes(b)) => Some(b.clone()),
            _ => None,
        }
    }
}

/// Executes mutation specs against a driver and serves the read-backs the
/// builders need.
pub struct GraphExecutor {
    driver: Arc<dyn GraphDriver>,
    ids: NodeIdGenerator,
    hooks: HookRegistry,
}

impl GraphExecutor {
    pub fn new(driver: Arc<dyn GraphDriver>) -> Self {
        Self {
            driver,
            ids: NodeIdGenerator::new(0),
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_hooks(driver: Arc<dyn GraphDriver>, hooks: HookRegistry) -> Self {
        Self {
            driver,
            ids: NodeIdGenerator::new(0),
            hooks,
        }
    }

    /// Shard-aware constructor for multi-writer deployments.
    pub fn on_shard(driver: Arc<dyn GraphDriver>, shard_id: u16) -> Self {
        Self {
            driver,
            ids: NodeIdGenerator::new(shard_id),
            hooks: HookRegistry::new(),
        }
    }

    pub fn driver(&self) -> &Arc<dyn GraphDriver> {
        &self.driver
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn next_id(&self) -> i64 {
        self.ids.next_id()
    }

    /// Execute a create spec, returning the new node id.
    pub async fn create(&self, spec: CreateSpec) -> EntResult<i64> {
        let mut columns = vec![spec.id_column.clone()];
        let mut args = vec![Value::I64(spec.id)];
        for field in &spec.fields {
            columns.push(field.column.clone());
            args.push(field.value.clone());
        }

        let mut pre = Vec::new();
        let mut post = Vec::new();
        for edge in &spec.edges {
            if edge.target_ids.is_empty() {
                continue;
            }
            match &edge.storage {
                EdgeStorage::FkOnSelf { column } => {
                    // Unique by construction: EdgeSpec rejects multiple ids.
                    // The FK value folds into the INSERT, so the target's
                    // existence is checked with a guarded no-op first.
                    columns.push(column.clone());
                    args.push(Value::I64(edge.target_ids[0]));
                    pre.push(Self::target_exists_check(edge, edge.target_ids[0]));
                }
                EdgeStorage::FkOnTarget { table, column } => {
                    for tid in &edge.target_ids {
                        post.push(Statement::guarded(
                            format!(
                                "UPDATE {} SET {} = ? WHERE id = ?",
                                table, column
                            ),
                            vec![Value::I64(spec.id), Value::I64(*tid)],
                            RowGuard {
                                rows: 1,
                                entity: edge.target_entity.clone(),
                                id: *tid,
                            },
                        ));
                    }
                }
                EdgeStorage::Junction {
                    table,
                    self_column,
                    target_column,
                } => {
                    for tid in &edge.target_ids {
                        post.push(Statement::new(
                            format!(
                                "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                                table, self_column, target_column
                            ),
                            vec![Value::I64(spec.id), Value::I64(*tid)],
                        ));
                    }
                }
            }
        }

        let insert = Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                spec.table,
                columns.join(", "),
                placeholders(args.len())
            ),
            args,
        );

        let mut stmts = pre;
        stmts.push(insert);
        stmts.extend(post);
        tracing::debug!(entity = %spec.entity, id = spec.id, statements = stmts.len(), "create plan");
        self.driver.execute_atomic(&stmts).await?;
        Ok(spec.id)
    }

    /// Execute a single-node update spec. Missing node surfaces as NotFound.
    pub async fn update_one(&self, spec: UpdateSpec) -> EntResult<()> {
        let mut stmts = Vec::new();

        // Field sets, clears and FK-on-self edge changes collapse into one
        // UPDATE on the node row, which doubles as the existence check.
        let mut assignments = Vec::new();
        let mut args = Vec::new();
        for field in &spec.sets {
            assignments.push(format!("{} = ?", field.column));
            args.push(field.value.clone());
        }
        for column in &spec.clears {
            assignments.push(format!("{} = NULL", column));
        }
        for edge in &spec.edge_clears {
            if let EdgeStorage::FkOnSelf { column } = &edge.storage {
                assignments.push(format!("{} = NULL", column));
            }
        }
        for edge in &spec.edge_adds {
            if let EdgeStorage::FkOnSelf { column } = &edge.storage {
                if let Some(tid) = edge.target_ids.first() {
                    assignments.push(format!("{} = ?", column));
                    args.push(Value::I64(*tid));
                    stmts.push(Self::target_exists_check(edge, *tid));
                }
            }
        }
        if assignments.is_empty() {
            // Pure edge mutation; no-op assignment keeps the row guard.
            assignments.push(format!("{} = {}", spec.id_column, spec.id_column));
        }
        args.push(Value::I64(spec.node_id));
        stmts.push(Statement::guarded(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                spec.table,
                assignments.join(", "),
                spec.id_column
            ),
            args,
            RowGuard {
                rows: 1,
                entity: spec.entity.clone(),
                id: spec.node_id,
            },
        ));

        // Clears run before removes and adds so clear-then-add reattaches.
        for edge in &spec.edge_clears {
            self.plan_edge_clear(&spec, edge, &mut stmts);
        }
        for edge in &spec.edge_removes {
            self.plan_edge_remove(&spec, edge, &mut stmts);
        }
        for edge in &spec.edge_adds {
            self.plan_edge_add(&spec, edge, &mut stmts)?;
        }

        tracing::debug!(entity = %spec.entity, id = spec.node_id, statements = stmts.len(), "update plan");
        self.driver.execute_atomic(&stmts).await?;
        Ok(())
    }

    /// Guarded no-op against the target row. FK-on-self attachments write
    /// only this entity's row, so the target's existence must be probed
    /// explicitly; zero affected rows aborts the transaction as NotFound.
    fn target_exists_check(edge: &EdgeSpec, target_id: i64) -> Statement {
        Statement::guarded(
            format!("UPDATE {} SET id = id WHERE id = ?", edge.target_table),
            vec![Value::I64(target_id)],
            RowGuard {
                rows: 1,
                entity: edge.target_entity.clone(),
                id: target_id,
            },
        )
    }

    fn plan_edge_clear(&self, spec: &UpdateSpec, edge: &EdgeSpec, stmts: &mut Vec<Statement>) {
        match &edge.storage {
            EdgeStorage::FkOnSelf { .. } => {} // folded into the node UPDATE
            EdgeStorage::FkOnTarget { table, column } => {
                stmts.push(Statement::new(
                    format!("UPDATE {} SET {} = NULL WHERE {} = ?", table, column, column),
                    vec![Value::I64(spec.node_id)],
                ));
            }
            EdgeStorage::Junction {
                table,
                self_column,
                target_column,
            } => {
                if edge.symmetric {
                    stmts.push(Statement::new(
                        format!(
                            "DELETE FROM {} WHERE {} = ? OR {} = ?",
                            table, self_column, target_column
                        ),
                        vec![Value::I64(spec.node_id), Value::I64(spec.node_id)],
                    ));
                } else {
                    stmts.push(Statement::new(
                        format!("DELETE FROM {} WHERE {} = ?", table, self_column),
                        vec![Value::I64(spec.node_id)],
                    ));
                }
            }
        }
    }

    fn plan_edge_remove(&self, spec: &UpdateSpec, edge: &EdgeSpec, stmts: &mut Vec<Statement>) {
        if edge.target_ids.is_empty() {
            return;
        }
        let id_list = placeholders(edge.target_ids.len());
        let ids: Vec<Value> = edge.target_ids.iter().map(|t| Value::I64(*t)).collect();
        match &edge.storage {
            EdgeStorage::FkOnSelf { column } => {
                // Detach only when the current target is among the given ids.
                let mut args = vec![Value::I64(spec.node_id)];
                args.extend(ids);
                stmts.push(Statement::new(
                    format!(
                        "UPDATE {} SET {} = NULL WHERE {} = ? AND {} IN ({})",
                        spec.table, column, spec.id_column, column, id_list
                    ),
                    args,
                ));
            }
            EdgeStorage::FkOnTarget { table, column } => {
                let mut args = vec![Value::I64(spec.node_id)];
                args.extend(ids);
                stmts.push(Statement::new(
                    format!(
                        "UPDATE {} SET {} = NULL WHERE {} = ? AND id IN ({})",
                        table, column, column, id_list
                    ),
                    args,
                ));
            }
            EdgeStorage::Junction {
                table,
                self_column,
                target_column,
            } => {
                if edge.symmetric {
                    let mut args = vec![Value::I64(spec.node_id)];
                    args.extend(ids.clone());
                    args.push(Value::I64(spec.node_id));
                    args.extend(ids);
                    stmts.push(Statement::new(
                        format!(
                            "DELETE FROM {} WHERE ({} = ? AND {} IN ({})) OR ({} = ? AND {} IN ({}))",
                            table, self_column, target_column, id_list,
                            target_column, self_column, id_list
                        ),
                        args,
                    ));
                } else {
                    let mut args = vec![Value::I64(spec.node_id)];
                    args.extend(ids);
                    stmts.push(Statement::new(
                        format!(
                            "DELETE FROM {} WHERE {} = ? AND {} IN ({})",
                            table, self_column, target_column, id_list
                        ),
                        args,
                    ));
                }
            }
        }
    }

    fn plan_edge_add(
        &self,
        spec: &UpdateSpec,
        edge: &EdgeSpec,
        stmts: &mut Vec<Statement>,
    ) -> EntResult<()> {
        if edge.target_ids.is_empty() {
            return Ok(());
        }
        match &edge.storage {
            EdgeStorage::FkOnSelf { .. } => {} // folded into the node UPDATE
            EdgeStorage::FkOnTarget { table, column } => {
                for tid in &edge.target_ids {
                    stmts.push(Statement::guarded(
                        format!("UPDATE {} SET {} = ? WHERE id = ?", table, column),
                        vec![Value::I64(spec.node_id), Value::I64(*tid)],
                        RowGuard {
                            rows: 1,
                            entity: edge.target_entity.clone(),
                            id: *tid,
                        },
                    ));
                }
            }
            EdgeStorage::Junction {
                table,
                self_column,
                target_column,
            } => {
                for tid in &edge.target_ids {
                    stmts.push(Statement::new(
                        format!(
                            "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                            table, self_column, target_column
                        ),
                        vec![Value::I64(spec.node_id), Value::I64(*tid)],
                    ));
                }
            }
        }
        Ok(())
    }

    /// Execute a predicate-scoped bulk field update, returning the number of
    /// affected nodes. No NotFound semantics: zero matches is a valid result.
    pub async fn update_many(&self, spec: UpdateManySpec) -> EntResult<u64> {
        if spec.sets.is_empty() && spec.clears.is_empty() {
            return Ok(0);
        }
        let mut assignments = Vec::new();
        let mut args = Vec::new();
        for field in &spec.sets {
            assignments.push(format!("{} = ?", field.column));
            args.push(field.value.clone());
        }
        for column in &spec.clears {
            assignments.push(format!("{} = NULL", column));
        }

        let mut conditions = Vec::new();
        for predicate in &spec.predicates {
            match predicate {
                Predicate::FieldEq(column, value) => {
                    conditions.push(format!("{} = ?", column));
                    args.push(value.clone());
                }
                Predicate::FieldIsNull(column) => {
                    conditions.push(format!("{} IS NULL", column));
                }
                Predicate::IdIn(ids) => {
                    conditions.push(format!(
                        "{} IN ({})",
                        spec.id_column,
                        placeholders(ids.len())
                    ));
                    args.extend(ids.iter().map(|id| Value::I64(*id)));
                }
            }
        }

        let mut sql = format!("UPDATE {} SET {}", spec.table, assignments.join(", "));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        tracing::debug!(entity = %spec.entity, "bulk update");
        self.driver.execute(&Statement::new(sql, args)).await
    }

    /// Execute a delete spec: edge storage cleanup plus the row itself.
    pub async fn delete(&self, spec: DeleteSpec) -> EntResult<()> {
        let mut stmts = Vec::new();
        for edge in &spec.edges {
            match &edge.storage {
                EdgeStorage::FkOnSelf { .. } => {} // vanishes with the row
                EdgeStorage::FkOnTarget { table, column } => {
                    stmts.push(Statement::new(
                        format!("UPDATE {} SET {} = NULL WHERE {} = ?", table, column, column),
                        vec![Value::I64(spec.node_id)],
                    ));
                }
                EdgeStorage::Junction {
                    table,
                    self_column,
                    target_column,
                } => {
                    if edge.symmetric {
                        stmts.push(Statement::new(
                            format!(
                                "DELETE FROM {} WHERE {} = ? OR {} = ?",
                                table, self_column, target_column
                            ),
                            vec![Value::I64(spec.node_id), Value::I64(spec.node_id)],
                        ));
                    } else {
                        stmts.push(Statement::new(
                            format!("DELETE FROM {} WHERE {} = ?", table, self_column),
                            vec![Value::I64(spec.node_id)],
                        ));
                    }
                }
            }
        }
        stmts.push(Statement::guarded(
            format!("DELETE FROM {} WHERE {} = ?", spec.table, spec.id_column),
            vec![Value::I64(spec.node_id)],
            RowGuard {
                rows: 1,
                entity: spec.entity.clone(),
                id: spec.node_id,
            },
        ));

        tracing::debug!(entity = %spec.entity, id = spec.node_id, "delete plan");
        self.driver.execute_atomic(&stmts).await?;
        Ok(())
    }

    /// Fetch one node by id.
    pub async fn node(&self, layout: &EntityLayout, id: i64) -> EntResult<Option<Node>> {
        let stmt = Statement::new(
            format!("SELECT * FROM {} WHERE {} = ?", layout.table, layout.id_column),
            vec![Value::I64(id)],
        );
        let mut rows = self.driver.fetch(&stmt).await?;
        match rows.pop() {
            Some(raw) => Ok(Some(Node::from_raw(layout, raw)?)),
            None => Ok(None),
        }
    }

    /// Fetch one node by id, erroring with NotFound when absent.
    pub async fn node_strict(&self, layout: &EntityLayout, id: i64) -> EntResult<Node> {
        self.node(layout, id).await?.ok_or_else(|| EntError::NotFound {
            entity: layout.entity.clone(),
            id,
        })
    }

    /// Ids of the nodes attached along an edge, ordered ascending.
    pub async fn neighbor_ids(
        &self,
        layout: &EntityLayout,
        edge_name: &str,
        id: i64,
    ) -> EntResult<Vec<i64>> {
        let edge = layout.edge(edge_name).ok_or_else(|| {
            EntError::Schema(format!(
                "entity \"{}\" has no edge \"{}\"",
                layout.entity, edge_name
            ))
        })?;

        let stmt = match &edge.storage {
            EdgeStorage::FkOnSelf { column } => Statement::new(
                format!(
                    "SELECT {} AS nid FROM {} WHERE {} = ? AND {} IS NOT NULL",
                    column, layout.table, layout.id_column, column
                ),
                vec![Value::I64(id)],
            ),
            EdgeStorage::FkOnTarget { table, column } => Statement::new(
                format!(
                    "SELECT id AS nid FROM {} WHERE {} = ? ORDER BY id",
                    table, column
                ),
                vec![Value::I64(id)],
            ),
            EdgeStorage::Junction {
                table,
                self_column,
                target_column,
            } => {
                if edge.symmetric {
                    Statement::new(
                        format!(
                            "SELECT {} AS nid FROM {} WHERE {} = ? \
                             UNION SELECT {} FROM {} WHERE {} = ? ORDER BY nid",
                            target_column, table, self_column,
                            self_column, table, target_column
                        ),
                        vec![Value::I64(id), Value::I64(id)],
                    )
                } else {
                    Statement::new(
                        format!(
                            "SELECT {} AS nid FROM {} WHERE {} = ? ORDER BY nid",
                            target_column, table, self_column
                        ),
                        vec![Value::I64(id)],
                    )
                }
            }
        };

        let rows = self.driver.fetch(&stmt).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some((_, value)) = row.into_iter().next() {
                if let Some(nid) = value.as_i64() {
                    ids.push(nid);
                }
            }
        }
        Ok(ids)
    }

    /// Count the nodes attached along an edge.
    pub async fn neighbor_count(
        &self,
        layout: &EntityLayout,
        edge_name: &str,
        id: i64,
    ) -> EntResult<u64> {
        Ok(self.neighbor_ids(layout, edge_name, id).await?.len() as u64)
    }
}
