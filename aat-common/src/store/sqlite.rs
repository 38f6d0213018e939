//! SQLite-backed content store
//!
//! Records live as JSON text in a single `content_records` table keyed by
//! tenant, collection and record id. Filters compile to `json_extract`
//! predicates so matching happens inside SQLite.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::{query::Query, Row, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Condition, ContentStore, Filter, RetrieveOptions, SortOrder};
use crate::model::{id_string, Record};
use crate::{Error, Result};

/// Content store over a SQLite connection pool
#[derive(Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
}

/// Value bound into a compiled filter
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Int(i64),
    Real(f64),
}

impl SqliteContentStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new content database: {}", db_path.display());
        } else {
            info!("Opened existing content database: {}", db_path.display());
        }

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the records table if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_content_records_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a record, assigning a UUID `_id` when absent
    ///
    /// Returns the record id.
    pub async fn insert(&self, tenant_id: &str, collection: &str, mut record: Record) -> Result<String> {
        let record_id = match record.get("_id").and_then(id_string) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("_id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let doc = serde_json::to_string(&record)?;
        sqlx::query(
            "INSERT OR REPLACE INTO content_records (tenant_id, collection, record_id, doc) VALUES (?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(collection)
        .bind(&record_id)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(record_id)
    }
}

async fn create_content_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_records (
            tenant_id TEXT NOT NULL,
            collection TEXT NOT NULL,
            record_id TEXT NOT NULL,
            doc TEXT NOT NULL,
            PRIMARY KEY (tenant_id, collection, record_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Field names are interpolated into JSON paths, so only identifier characters pass
fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn field_path(field: &str) -> Result<String> {
    if !is_valid_field_name(field) {
        return Err(Error::Retrieval(format!("Invalid field name: {}", field)));
    }
    Ok(format!("json_extract(doc, '$.{}')", field))
}

fn bind_for(value: &Value) -> Option<Bind> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Bind::Int(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Bind::Int(i)),
            None => n.as_f64().map(Bind::Real),
        },
        Value::String(s) => Some(Bind::Text(s.clone())),
        other => Some(Bind::Text(other.to_string())),
    }
}

/// Compile a filter to a SQL predicate plus its bound values
fn compile_filter(filter: &Filter) -> Result<(String, Vec<Bind>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    for (field, condition) in &filter.conditions {
        let path = field_path(field)?;
        match condition {
            Condition::Eq(value) => match bind_for(value) {
                Some(bind) => {
                    clauses.push(format!("{} = ?", path));
                    binds.push(bind);
                }
                None => clauses.push(format!("{} IS NULL", path)),
            },
            Condition::Ne(value) => match bind_for(value) {
                Some(bind) => {
                    clauses.push(format!("({0} IS NULL OR {0} != ?)", path));
                    binds.push(bind);
                }
                None => clauses.push(format!("{} IS NOT NULL", path)),
            },
            Condition::In(values) => {
                let bound: Vec<Bind> = values.iter().filter_map(bind_for).collect();
                if bound.is_empty() {
                    clauses.push("0".to_string());
                } else {
                    let placeholders = vec!["?"; bound.len()].join(", ");
                    clauses.push(format!("{} IN ({})", path, placeholders));
                    binds.extend(bound);
                }
            }
        }
    }

    Ok((clauses.join(" AND "), binds))
}

fn apply_bind<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    bind: Bind,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match bind {
        Bind::Text(s) => query.bind(s),
        Bind::Int(i) => query.bind(i),
        Bind::Real(f) => query.bind(f),
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn retrieve(
        &self,
        tenant_id: &str,
        collection: &str,
        filter: &Filter,
        options: &RetrieveOptions,
    ) -> Result<Vec<Record>> {
        let (predicate, binds) = compile_filter(filter)?;

        let mut sql =
            "SELECT doc FROM content_records WHERE tenant_id = ? AND collection = ?".to_string();
        if !predicate.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&predicate);
        }

        match &options.sort {
            Some((field, order)) => {
                let direction = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                sql.push_str(&format!(" ORDER BY {} {}, rowid ASC", field_path(field)?, direction));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        debug!("content query on {}/{}: {}", tenant_id, collection, sql);

        let mut query = sqlx::query(&sql).bind(tenant_id).bind(collection);
        for bind in binds {
            query = apply_bind(query, bind);
        }

        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let doc: String = row.get("doc");
                match serde_json::from_str::<Value>(&doc)? {
                    Value::Object(record) => Ok(record),
                    _ => Err(Error::Retrieval(format!(
                        "Stored {} record is not a JSON object",
                        collection
                    ))),
                }
            })
            .collect()
    }
}
