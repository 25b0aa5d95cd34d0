//! Minimal async backing store for modelkit (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! db.execute("CREATE TABLE ...").await?;
//! db.fetch_all("SELECT ...").await?
use chrono::{DateTime, Utc};
pub use futures::future::BoxFuture;
use log::{debug, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::sync::Arc;

use crate::constraint::UniqueConstraint;

/// Meta table tracking which model schemas have been applied.
const META_TABLE: &str = "__modelkit_migrations";

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// A dynamically typed value bound into a query.
///
/// Values are always bound, never spliced into the SQL text, so callers
/// never need to quote or escape anything.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    fn bind_query<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        match self {
            Self::Null => query.bind(None::<i64>),
            Self::Integer(v) => query.bind(*v),
            Self::Real(v) => query.bind(*v),
            Self::Text(v) => query.bind(v.clone()),
            Self::Timestamp(v) => query.bind(*v),
        }
    }

    fn bind_query_as<'q, T>(
        &self,
        query: sqlx::query::QueryAs<'q, sqlx::Sqlite, T, SqliteArguments<'q>>,
    ) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, T, SqliteArguments<'q>> {
        match self {
            Self::Null => query.bind(None::<i64>),
            Self::Integer(v) => query.bind(*v),
            Self::Real(v) => query.bind(*v),
            Self::Text(v) => query.bind(v.clone()),
            Self::Timestamp(v) => query.bind(*v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

pub struct Migration(pub fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>);

impl std::ops::Deref for Migration {
    type Target = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A table-backed model: declares its name, columns and unique constraints.
///
/// An `id INTEGER PRIMARY KEY AUTOINCREMENT` column is always emitted and
/// must not appear in `columns()`.
#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn columns() -> Vec<(String, String)>;

    /// Unique constraints declared on this model. See [`crate::auto_unique!`].
    fn constraints() -> Vec<UniqueConstraint> {
        Vec::new()
    }

    fn create_table_sql() -> String {
        let mut defs = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        defs.extend(
            Self::columns()
                .into_iter()
                .map(|(name, sqltype)| format!("{} {}", name, sqltype)),
        );
        defs.extend(Self::constraints().iter().map(UniqueConstraint::sql));
        format!("CREATE TABLE {} ({})", Self::table_name(), defs.join(", "))
    }

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        ensure_meta_table(&db).await?;

        // Read migration hash from the meta table
        let recorded: Vec<(String,)> = db
            .fetch_where(
                &format!("SELECT hash FROM {} WHERE table_name = ?", META_TABLE),
                &[Value::from(table_name)],
            )
            .await?;

        if recorded.is_empty() {
            db.execute(&create_sql).await?;
            db.execute_with(
                &format!(
                    "INSERT INTO {} (table_name, schema_sql, hash) VALUES (?, ?, ?)",
                    META_TABLE
                ),
                &[
                    Value::from(table_name),
                    Value::from(create_sql),
                    Value::from(schema_hash),
                ],
            )
            .await?;
            info!(
                "Migrated `{}` (table created, initial schema applied).",
                table_name
            );
            return Ok(());
        }

        // Get existing cols from DB
        let pragma_sql = format!("PRAGMA table_info({})", table_name);
        let existing: Vec<String> = sqlx::query(&pragma_sql)
            .fetch_all(&db.pool)
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !existing.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table_name, name, sqltype
                ))
                .await?;
                added.push(format!("{} {}", name, sqltype));
            }
        }

        if added.is_empty() {
            info!("No schema changes detected for `{}`.", table_name);
        } else {
            info!(
                "Schema changes detected for `{}`, columns added: {}",
                table_name,
                added.join(", ")
            );
            db.execute_with(
                &format!(
                    "UPDATE {} SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
                     WHERE table_name = ?",
                    META_TABLE
                ),
                &[
                    Value::from(create_sql),
                    Value::from(schema_hash),
                    Value::from(table_name),
                ],
            )
            .await?;
        }
        Ok(())
    }
}

async fn ensure_meta_table(db: &Db) -> Result<(), sqlx::Error> {
    db.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT UNIQUE,
            schema_sql TEXT,
            hash TEXT,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        META_TABLE
    ))
    .await
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let pool = SqlitePool::connect(uri).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => info!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result.map(|_| ())
    }

    /// Execute a statement with `?` placeholders bound to `binds`, in order.
    ///
    /// Returns the raw result so callers can read `last_insert_rowid`.
    pub async fn execute_with(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> Result<SqliteQueryResult, sqlx::Error> {
        debug!("Executing SQL: {} ({} binds)", sql, binds.len());
        let mut query = sqlx::query(sql);
        for value in binds {
            query = value.bind_query(query);
        }
        let result = query.execute(&self.pool).await;
        match &result {
            Ok(_) => info!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => info!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result
    }

    /// Fetch rows with `?` placeholders bound to `binds`, in order.
    pub async fn fetch_where<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
        binds: &[Value],
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {} ({} binds)", sql, binds.len());
        let mut query = sqlx::query_as::<_, T>(sql);
        for value in binds {
            query = value.bind_query_as(query);
        }
        let result = query.fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => info!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result
    }
}

/// Migration function pointer for a model.
/// Each model should register a `fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>` for migration.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = m(db.clone()).await {
            log::error!("Auto-migration failed for a model: {}", e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}
