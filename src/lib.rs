pub mod constraint;
pub mod error;
pub mod models;
pub mod orm;

pub use constraint::{ConstraintError, UniqueConstraint};
pub use error::OrmError;
pub use models::{GetOrNew, Lookup, Record, TimestampOps, TimestampedRecord, WithId, WithTimestamps};
pub use orm::{Db, Migration, Model, Value, auto_migrate};

inventory::collect!(crate::orm::Migration);
