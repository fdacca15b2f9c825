// Schema migration - derives CREATE TABLE / CREATE INDEX statements from the
// resolved graph layout so the executor's output runs against a fresh
// database. FK columns are collected from both sides of each edge: a target
// table gets its column even when the target entity never declares the
// back-reference itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::EntResult;
use crate::executor::statement::{Dialect, Statement};
use crate::executor::GraphDriver;
use crate::schema::registry::{EdgeStorage, GraphLayout};
use crate::schema::{Cardinality, FieldType};

fn sql_type(ty: &FieldType, dialect: Dialect) -> &'static str {
    match (ty, dialect) {
        (FieldType::String | FieldType::Uuid | FieldType::Json | FieldType::Enum(_), _) => "TEXT",
        (FieldType::Int, _) => "INTEGER",
        (FieldType::Int64 | FieldType::Time, _) => "BIGINT",
        (FieldType::Float, Dialect::Postgres) => "DOUBLE PRECISION",
        (FieldType::Float, Dialect::Sqlite) => "REAL",
        (FieldType::Bool, Dialect::Postgres) => "BOOLEAN",
        (FieldType::Bool, Dialect::Sqlite) => "INTEGER",
        (FieldType::Bytes, Dialect::Postgres) => "BYTEA",
        (FieldType::Bytes, Dialect::Sqlite) => "BLOB",
    }
}

#[derive(Debug, Clone)]
struct ColumnDdl {
    name: String,
    ddl: String,
}

#[derive(Debug, Clone)]
struct JunctionDdl {
    table: String,
    self_column: String,
    target_column: String,
}

/// Emits and applies schema DDL for a resolved layout.
pub struct SchemaMigrator {
    layout: GraphLayout,
}

impl SchemaMigrator {
    pub fn new(layout: GraphLayout) -> Self {
        Self { layout }
    }

    /// All DDL statements, in dependency order: node tables, junction
    /// tables, indexes.
    pub fn statements(&self, dialect: Dialect) -> Vec<Statement> {
        // table -> ordered columns; collected across every entity because
        // FK columns can be contributed by the opposite side of an edge.
        let mut columns: BTreeMap<String, Vec<ColumnDdl>> = BTreeMap::new();
        let mut junctions: BTreeMap<String, JunctionDdl> = BTreeMap::new();
        let mut indexes: Vec<Statement> = Vec::new();

        for name in self.layout.entity_names() {
            let entity = match self.layout.entity(&name) {
                Ok(e) => e,
                Err(_) => continue,
            };
            let table_columns = columns.entry(entity.table.clone()).or_default();

            let id_ddl = format!("{} BIGINT PRIMARY KEY", entity.id_column);
            push_column(table_columns, &entity.id_column, id_ddl);

            for field in &entity.fields {
                let mut ddl = format!("{} {}", field.column, sql_type(&field.def.field_type, dialect));
                if !field.def.optional {
                    ddl.push_str(" NOT NULL");
                }
                if field.def.unique {
                    ddl.push_str(" UNIQUE");
                }
                push_column(table_columns, &field.column, ddl);
            }
        }

        // Second pass for edge storage so every node table already exists in
        // the column map.
        for name in self.layout.entity_names() {
            let entity = match self.layout.entity(&name) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for edge in &entity.edges {
                match &edge.storage {
                    EdgeStorage::FkOnSelf { column } => {
                        let mut ddl = format!("{} BIGINT", column);
                        if edge.required {
                            ddl.push_str(" NOT NULL");
                        }
                        if edge.cardinality == Cardinality::OneToOne {
                            ddl.push_str(" UNIQUE");
                        }
                        let cols = columns.entry(entity.table.clone()).or_default();
                        push_column(cols, column, ddl);
                        indexes.push(index_stmt(&entity.table, column));
                    }
                    EdgeStorage::FkOnTarget { table, column } => {
                        let mut ddl = format!("{} BIGINT", column);
                        if edge.cardinality == Cardinality::OneToOne {
                            ddl.push_str(" UNIQUE");
                        }
                        let cols = columns.entry(table.clone()).or_default();
                        push_column(cols, column, ddl);
                        indexes.push(index_stmt(table, column));
                    }
                    EdgeStorage::Junction {
                        table,
                        self_column,
                        target_column,
                    } => {
                        // Owning and inverse sides resolve to the same table;
                        // keep the owning orientation.
                        if !edge.inverse {
                            junctions.insert(
                                table.clone(),
                                JunctionDdl {
                                    table: table.clone(),
                                    self_column: self_column.clone(),
                                    target_column: target_column.clone(),
                                },
                            );
                        }
                    }
                }
            }

            for index in &entity.indexes {
                let cols: Vec<String> = index
                    .fields
                    .iter()
                    .map(|f| {
                        entity
                            .field(f)
                            .map(|fc| fc.column.clone())
                            .unwrap_or_else(|| f.clone())
                    })
                    .collect();
                let unique = if index.unique { "UNIQUE " } else { "" };
                indexes.push(Statement::new(
                    format!(
                        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                        unique,
                        index.name,
                        entity.table,
                        cols.join(", ")
                    ),
                    Vec::new(),
                ));
            }
        }

        let mut stmts = Vec::new();
        for (table, cols) in &columns {
            let body: Vec<String> = cols.iter().map(|c| c.ddl.clone()).collect();
            stmts.push(Statement::new(
                format!("CREATE TABLE IF NOT EXISTS {} ({})", table, body.join(", ")),
                Vec::new(),
            ));
        }
        for junction in junctions.values() {
            stmts.push(Statement::new(
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({} BIGINT NOT NULL, {} BIGINT NOT NULL, \
                     PRIMARY KEY ({}, {}))",
                    junction.table,
                    junction.self_column,
                    junction.target_column,
                    junction.self_column,
                    junction.target_column
                ),
                Vec::new(),
            ));
            indexes.push(index_stmt(&junction.table, &junction.target_column));
        }
        // Both sides of an FK edge request the same index; emit it once.
        let mut seen = std::collections::HashSet::new();
        stmts.extend(indexes.into_iter().filter(|s| seen.insert(s.sql.clone())));
        stmts
    }

    /// Apply the DDL through a driver.
    pub async fn apply(&self, driver: &Arc<dyn GraphDriver>) -> EntResult<()> {
        for stmt in self.statements(driver.dialect()) {
            tracing::debug!(sql = %stmt.sql, "migrate");
            driver.execute(&stmt).await?;
        }
        Ok(())
    }
}

fn push_column(cols: &mut Vec<ColumnDdl>, name: &str, ddl: String) {
    if !cols.iter().any(|c| c.name == name) {
        cols.push(ColumnDdl {
            name: name.to_string(),
            ddl,
        });
    }
}

fn index_stmt(table: &str, column: &str) -> Statement {
    Statement::new(
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {} ({})",
            table, column, table, column
        ),
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        EdgeDefinition, EntitySchema, FieldDefinition, FieldType, IndexDefinition, SchemaRegistry,
    };

    fn layout() -> GraphLayout {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("user")
                .field(FieldDefinition::new("username", FieldType::String).unique())
                .field(FieldDefinition::new("bio", FieldType::String).optional())
                .edge(EdgeDefinition::to("posts", "post").inverse("author"))
                .index(IndexDefinition::new("idx_user_username", vec!["username"]).unique()),
        );
        reg.register_schema(
            EntitySchema::new("post")
                .field(FieldDefinition::new("content", FieldType::String))
                .edge(EdgeDefinition::from("author", "user", "posts").required()),
        );
        reg.resolve().unwrap()
    }

    #[test]
    fn test_node_table_ddl() {
        let migrator = SchemaMigrator::new(layout());
        let stmts = migrator.statements(Dialect::Sqlite);
        let users = stmts
            .iter()
            .find(|s| s.sql.starts_with("CREATE TABLE IF NOT EXISTS users"))
            .unwrap();
        assert!(users.sql.contains("id BIGINT PRIMARY KEY"));
        assert!(users.sql.contains("username TEXT NOT NULL UNIQUE"));
        assert!(users.sql.contains("bio TEXT,") || users.sql.ends_with("bio TEXT)"));
    }

    #[test]
    fn test_fk_column_contributed_by_owning_side() {
        let migrator = SchemaMigrator::new(layout());
        let stmts = migrator.statements(Dialect::Sqlite);
        let posts = stmts
            .iter()
            .find(|s| s.sql.starts_with("CREATE TABLE IF NOT EXISTS posts"))
            .unwrap();
        // author_id is declared once even though both sides resolve it.
        assert_eq!(posts.sql.matches("author_id").count(), 1);
        assert!(posts.sql.contains("author_id BIGINT NOT NULL"));
    }

    #[test]
    fn test_junction_table_ddl() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("user").edge(EdgeDefinition::many("groups", "group")),
        );
        reg.register_schema(EntitySchema::new("group"));
        let migrator = SchemaMigrator::new(reg.resolve().unwrap());
        let stmts = migrator.statements(Dialect::Sqlite);
        let junction = stmts
            .iter()
            .find(|s| s.sql.starts_with("CREATE TABLE IF NOT EXISTS users_groups"))
            .unwrap();
        assert!(junction.sql.contains("PRIMARY KEY (user_id, group_id)"));
    }
}
