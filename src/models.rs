//! Reusable model mixins.
//!
//! Each trait attaches one small, independently composable capability to a
//! concrete record type, playing the role of an abstract base model:
//! a typed id ([`WithId`]), row persistence ([`Record`]), information
//! timestamps with staleness checks ([`WithTimestamps`] / [`TimestampOps`])
//! and a lookup-or-construct operation ([`GetOrNew`]).
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::sqlite::SqliteRow;

use crate::error::OrmError;
use crate::orm::{Db, FromRow, Model, Value};

/// Read access to the framework-assigned integer id.
///
/// `None` until the record has been saved for the first time; assigned by
/// the database and never reassigned afterwards.
pub trait WithId {
    fn id(&self) -> Option<i64>;
}

/// A model instance that can be written back to its table.
#[async_trait]
pub trait Record: Model + WithId + Sized + Send + Sync {
    /// Column/value pairs for every column except `id`, in declaration order.
    fn values(&self) -> Vec<(&'static str, Value)>;

    fn set_id(&mut self, id: i64);

    /// Insert the record if it has no id yet, update the existing row otherwise.
    ///
    /// On insert the database-assigned id is written back into the record.
    async fn save(&mut self, db: &Db) -> Result<(), OrmError> {
        let values = self.values();
        let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        match self.id() {
            None => {
                let placeholders = vec!["?"; names.len()].join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    Self::table_name(),
                    names.join(", "),
                    placeholders
                );
                let binds: Vec<Value> = values.into_iter().map(|(_, value)| value).collect();
                let result = db.execute_with(&sql, &binds).await?;
                self.set_id(result.last_insert_rowid());
            }
            Some(id) => {
                let assignments: Vec<String> =
                    names.iter().map(|name| format!("{} = ?", name)).collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?",
                    Self::table_name(),
                    assignments.join(", ")
                );
                let mut binds: Vec<Value> =
                    values.into_iter().map(|(_, value)| value).collect();
                binds.push(Value::Integer(id));
                db.execute_with(&sql, &binds).await?;
            }
        }
        Ok(())
    }
}

/// Field access for the two information timestamps.
///
/// `info_timestamp` records when the real-world fact was observed,
/// `info_modified_timestamp` when the stored row was last edited. Both are
/// unset on a new record and both are set once [`TimestampOps::add_timestamps`]
/// has run. Saving never touches them implicitly: information edited by hand
/// keeps its timestamps until the caller stamps it again.
pub trait WithTimestamps {
    fn info_timestamp(&self) -> Option<DateTime<Utc>>;
    fn info_modified_timestamp(&self) -> Option<DateTime<Utc>>;
    fn set_info_timestamp(&mut self, ts: Option<DateTime<Utc>>);
    fn set_info_modified_timestamp(&mut self, ts: Option<DateTime<Utc>>);
}

/// Staleness checks and timestamp mutation on top of [`WithTimestamps`].
pub trait TimestampOps: WithTimestamps {
    /// Check whether the stored information satisfies the given thresholds.
    ///
    /// A record whose timestamps were never set is never up to date. Each
    /// threshold is optional and checked independently; passing `None`
    /// disables that check. A timestamp equal to its threshold counts as up
    /// to date.
    fn is_up_to_date(
        &self,
        minimum_info_timestamp: Option<DateTime<Utc>>,
        minimum_modified_timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        // If no timestamp is present the information has to be outdated
        let (Some(info), Some(modified)) =
            (self.info_timestamp(), self.info_modified_timestamp())
        else {
            return false;
        };

        if minimum_info_timestamp.is_some_and(|minimum| minimum > info) {
            return false;
        }

        !minimum_modified_timestamp.is_some_and(|minimum| minimum > modified)
    }

    /// Exact negation of [`TimestampOps::is_up_to_date`].
    fn is_outdated(
        &self,
        minimum_info_timestamp: Option<DateTime<Utc>>,
        minimum_modified_timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        !self.is_up_to_date(minimum_info_timestamp, minimum_modified_timestamp)
    }

    /// Store `info_timestamp` and stamp the modified timestamp with the
    /// current UTC wall-clock time. Pure mutation, nothing is persisted.
    fn add_timestamps(&mut self, info_timestamp: DateTime<Utc>) {
        self.set_info_timestamp(Some(info_timestamp));
        self.set_info_modified_timestamp(Some(Utc::now()));
    }
}

impl<T: WithTimestamps> TimestampOps for T {}

/// [`TimestampOps::add_timestamps`] plus an immediate save, for records.
#[async_trait]
pub trait TimestampedRecord: Record + WithTimestamps {
    async fn add_timestamps_and_save(
        &mut self,
        db: &Db,
        info_timestamp: DateTime<Utc>,
    ) -> Result<(), OrmError> {
        self.add_timestamps(info_timestamp);
        self.save(db).await
    }
}

impl<T: Record + WithTimestamps> TimestampedRecord for T {}

/// Result of a [`GetOrNew::get_or_new`] lookup.
#[derive(Debug)]
pub struct Lookup<T> {
    pub record: T,
    /// True iff no matching row existed and `record` is transient (unsaved).
    pub created: bool,
}

/// Lookup-or-construct without implicit persistence.
///
/// Similar to a fused get-or-create, except that a missing row is never
/// written: the caller receives a transient instance carrying the filter
/// values, fills in any remaining required fields, and calls
/// [`Record::save`] when ready.
#[async_trait]
pub trait GetOrNew: Record + for<'r> FromRow<'r, SqliteRow> + Unpin {
    /// Build a transient instance populated with the filter values.
    fn hydrate(values: &[(&'static str, Value)]) -> Self;

    /// Fetch the single row matching `values`, or hand back an unsaved
    /// instance built by [`GetOrNew::hydrate`].
    ///
    /// An empty filter list selects the whole table. More than one matching
    /// row is an error ([`OrmError::MultipleRecords`]); nothing is retried
    /// or recovered.
    async fn get_or_new(
        db: &Db,
        values: &[(&'static str, Value)],
    ) -> Result<Lookup<Self>, OrmError> {
        let mut sql = format!("SELECT * FROM {}", Self::table_name());
        if !values.is_empty() {
            let clause: Vec<String> = values
                .iter()
                .map(|(name, _)| format!("{} = ?", name))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clause.join(" AND "));
        }
        let binds: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();

        let mut rows: Vec<Self> = db.fetch_where(&sql, &binds).await?;
        match rows.len() {
            0 => {
                debug!(
                    "No `{}` row matched, handing back a transient instance",
                    Self::table_name()
                );
                Ok(Lookup {
                    record: Self::hydrate(values),
                    created: true,
                })
            }
            1 => Ok(Lookup {
                record: rows.remove(0),
                created: false,
            }),
            matched => Err(OrmError::MultipleRecords {
                table: Self::table_name(),
                matched,
            }),
        }
    }
}
