// Database drivers - the dialect boundary of the executor.
// A driver executes pre-bound statements and hands raw storage-class values
// back; everything schema-aware (typing, hydration, planning) stays above
// this trait.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Column, PgPool, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::{EntError, EntResult};
use crate::executor::statement::{Dialect, Statement};
use crate::value::Value;

/// Enforce a statement's affected-row expectation.
fn check_guard(stmt: &Statement, affected: u64) -> EntResult<()> {
    if let Some(guard) = &stmt.guard {
        if affected != guard.rows {
            return Err(EntError::NotFound {
                entity: guard.entity.clone(),
                id: guard.id,
            });
        }
    }
    Ok(())
}

/// A fetched row as (column, raw value) pairs. Values carry SQL storage
/// classes only; `Value::hydrate` applies schema typing.
pub type RawRow = Vec<(String, Value)>;

#[async_trait]
pub trait GraphDriver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Execute one statement, returning the affected row count.
    async fn execute(&self, stmt: &Statement) -> EntResult<u64>;

    /// Execute a statement sequence in a single transaction. The
    /// transaction rolls back if any statement fails.
    async fn execute_atomic(&self, stmts: &[Statement]) -> EntResult<Vec<u64>>;

    /// Run a query and fetch all rows.
    async fn fetch(&self, stmt: &Statement) -> EntResult<Vec<RawRow>>;
}

/// SQLite driver; in-memory databases are the test backend, matching the
/// production Postgres driver statement for statement.
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub async fn connect(url: &str) -> EntResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(EntError::from)?;
        Ok(Self { pool })
    }

    /// A single-connection in-memory database. One connection is required:
    /// each `:memory:` connection is its own database.
    pub async fn in_memory() -> EntResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        args: &[Value],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        for value in args {
            query = match value {
                Value::Null => query.bind(Option::<i64>::None),
                Value::String(s) => query.bind(s.clone()),
                Value::I64(n) => query.bind(*n),
                Value::F64(f) => query.bind(*f),
                Value::Bool(b) => query.bind(*b),
                Value::Time(t) => query.bind(t.timestamp_millis()),
                Value::Uuid(u) => query.bind(u.to_string()),
                Value::Json(j) => query.bind(j.to_string()),
                Value::Bytes(b) => query.bind(b.clone()),
            };
        }
        query
    }

    fn decode_row(row: &SqliteRow) -> EntResult<RawRow> {
        let mut out = Vec::with_capacity(row.columns().len());
        for column in row.columns() {
            let i = column.ordinal();
            let raw = row.try_get_raw(i).map_err(EntError::from)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                match raw.type_info().name() {
                    "INTEGER" | "BOOLEAN" => Value::I64(row.try_get::<i64, _>(i)?),
                    "REAL" => Value::F64(row.try_get::<f64, _>(i)?),
                    "TEXT" => Value::String(row.try_get::<String, _>(i)?),
                    "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(i)?),
                    other => {
                        return Err(EntError::Database(anyhow::anyhow!(
                            "unsupported sqlite column type {} for \"{}\"",
                            other,
                            column.name()
                        )))
                    }
                }
            };
            out.push((column.name().to_string(), value));
        }
        Ok(out)
    }
}

#[async_trait]
impl GraphDriver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, stmt: &Statement) -> EntResult<u64> {
        let sql = stmt.render(Dialect::Sqlite);
        tracing::debug!(sql = %sql, "sqlite execute");
        let result = Self::bind(sqlx::query(&sql), &stmt.args)
            .execute(&self.pool)
            .await
            .map_err(EntError::from)?;
        check_guard(stmt, result.rows_affected())?;
        Ok(result.rows_affected())
    }

    async fn execute_atomic(&self, stmts: &[Statement]) -> EntResult<Vec<u64>> {
        let mut tx = self.pool.begin().await.map_err(EntError::from)?;
        let mut affected = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let sql = stmt.render(Dialect::Sqlite);
            tracing::debug!(sql = %sql, "sqlite tx execute");
            let result = Self::bind(sqlx::query(&sql), &stmt.args)
                .execute(&mut *tx)
                .await
                .map_err(EntError::from)?;
            check_guard(stmt, result.rows_affected())?;
            affected.push(result.rows_affected());
        }
        tx.commit().await.map_err(EntError::from)?;
        Ok(affected)
    }

    async fn fetch(&self, stmt: &Statement) -> EntResult<Vec<RawRow>> {
        let sql = stmt.render(Dialect::Sqlite);
        tracing::debug!(sql = %sql, "sqlite fetch");
        let rows = Self::bind(sqlx::query(&sql), &stmt.args)
            .fetch_all(&self.pool)
            .await
            .map_err(EntError::from)?;
        rows.iter().map(Self::decode_row).collect()
    }
}

/// PostgreSQL driver.
pub struct PostgresDriver {
    pool: PgPool,
}

impl PostgresDriver {
    pub async fn connect(url: &str) -> EntResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(EntError::from)?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        args: &[Value],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        for value in args {
            query = match value {
                Value::Null => query.bind(Option::<i64>::None),
                Value::String(s) => query.bind(s.clone()),
                Value::I64(n) => query.bind(*n),
                Value::F64(f) => query.bind(*f),
                Value::Bool(b) => query.bind(*b),
                Value::Time(t) => query.bind(t.timestamp_millis()),
                Value::Uuid(u) => query.bind(u.to_string()),
                Value::Json(j) => query.bind(j.to_string()),
                Value::Bytes(b) => query.bind(b.clone()),
            };
        }
        query
    }

    fn decode_row(row: &PgRow) -> EntResult<RawRow> {
        let mut out = Vec::with_capacity(row.columns().len());
        for column in row.columns() {
            let i = column.ordinal();
            let raw = row.try_get_raw(i).map_err(EntError::from)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                match raw.type_info().name() {
                    "BOOL" => Value::Bool(row.try_get::<bool, _>(i)?),
                    "INT2" => Value::I64(row.try_get::<i16, _>(i)? as i64),
                    "INT4" => Value::I64(row.try_get::<i32, _>(i)? as i64),
                    "INT8" => Value::I64(row.try_get::<i64, _>(i)?),
                    "FLOAT4" => Value::F64(row.try_get::<f32, _>(i)? as f64),
                    "FLOAT8" => Value::F64(row.try_get::<f64, _>(i)?),
                    "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                        Value::String(row.try_get::<String, _>(i)?)
                    }
                    "BYTEA" => Value::Bytes(row.try_get::<Vec<u8>, _>(i)?),
                    other => {
                        return Err(EntError::Database(anyhow::anyhow!(
                            "unsupported postgres column type {} for \"{}\"",
                            other,
                            column.name()
                        )))
                    }
                }
            };
            out.push((column.name().to_string(), value));
        }
        Ok(out)
    }
}

#[async_trait]
impl GraphDriver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, stmt: &Statement) -> EntResult<u64> {
        let sql = stmt.render(Dialect::Postgres);
        tracing::debug!(sql = %sql, "postgres execute");
        let result = Self::bind(sqlx::query(&sql), &stmt.args)
            .execute(&self.pool)
            .await
            .map_err(EntError::from)?;
        check_guard(stmt, result.rows_affected())?;
        Ok(result.rows_affected())
    }

    async fn execute_atomic(&self, stmts: &[Statement]) -> EntResult<Vec<u64>> {
        let mut tx = self.pool.begin().await.map_err(EntError::from)?;
        let mut affected = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let sql = stmt.render(Dialect::Postgres);
            tracing::debug!(sql = %sql, "postgres tx execute");
            let result = Self::bind(sqlx::query(&sql), &stmt.args)
                .execute(&mut *tx)
                .await
                .map_err(EntError::from)?;
            check_guard(stmt, result.rows_affected())?;
            affected.push(result.rows_affected());
        }
        tx.commit().await.map_err(EntError::from)?;
        Ok(affected)
    }

    async fn fetch(&self, stmt: &Statement) -> EntResult<Vec<RawRow>> {
        let sql = stmt.render(Dialect::Postgres);
        tracing::debug!(sql = %sql, "postgres fetch");
        let rows = Self::bind(sqlx::query(&sql), &stmt.args)
            .fetch_all(&self.pool)
            .await
            .map_err(EntError::from)?;
        rows.iter().map(Self::decode_row).collect()
    }
}
