// SQL statement assembly. Statements are built dialect-neutral with `?`
// placeholders; Postgres rendering rewrites them to $n at execution time.

use crate::value::Value;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// Expected affected-row count for a statement. A mismatch aborts the
/// surrounding transaction with `NotFound` for the named node, which is how
/// UpdateOne detects missing rows and how create detects missing edge
/// targets before anything becomes visible.
#[derive(Debug, Clone)]
pub struct RowGuard {
    pub rows: u64,
    pub entity: String,
    pub id: i64,
}

/// One bound SQL statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
    pub guard: Option<RowGuard>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
            guard: None,
        }
    }

    /// Attach an affected-row expectation.
    pub fn guarded(sql: impl Into<String>, args: Vec<Value>, guard: RowGuard) -> Self {
        Self {
            sql: sql.into(),
            args,
            guard: Some(guard),
        }
    }

    /// Render the SQL for the given dialect. Placeholders never appear
    /// inside literals because all values are bound.
    pub fn render(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Sqlite => self.sql.clone(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(self.sql.len() + 8);
                let mut n = 0usize;
                for ch in self.sql.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

/// `?, ?, ?` for n binds.
pub fn placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_rendering() {
        let stmt = Statement::new(
            "INSERT INTO users (id, username) VALUES (?, ?)",
            vec![Value::I64(1), Value::from("alice")],
        );
        assert_eq!(
            stmt.render(Dialect::Postgres),
            "INSERT INTO users (id, username) VALUES ($1, $2)"
        );
        assert_eq!(stmt.render(Dialect::Sqlite), stmt.sql);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
