//! Unique-constraint declarations with generated names.
//!
//! A `UNIQUE` constraint needs a name, and hand-written names drift into
//! collisions. [`UniqueConstraint::auto`] derives the name from the model
//! and field names instead; the [`crate::auto_unique!`] macro captures both
//! at the declaration site so the model name is never repeated as a string.
use thiserror::Error;

/// Raised when a constraint name cannot be derived from the declaration.
///
/// Always fatal, meant to be hit in development rather than at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("auto_unique needs the enclosing model's name to derive a constraint name")]
    MissingModelName,
    #[error("auto_unique needs at least one field")]
    NoFields,
}

/// A named UNIQUE constraint over a set of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub fields: Vec<String>,
}

impl UniqueConstraint {
    /// Derive a constraint over `fields` named `UQ_<model>_<f1>_<f2>..`.
    ///
    /// Two generated names only collide when they cover the same fields of
    /// the same model, which is the same constraint.
    pub fn auto(model: &str, fields: &[&str]) -> Result<Self, ConstraintError> {
        if model.is_empty() {
            return Err(ConstraintError::MissingModelName);
        }
        if fields.is_empty() {
            return Err(ConstraintError::NoFields);
        }
        Ok(Self {
            name: format!("UQ_{}_{}", model, fields.join("_")),
            fields: fields.iter().map(|field| (*field).to_string()).collect(),
        })
    }

    /// Render as a table-level constraint clause.
    pub fn sql(&self) -> String {
        format!("CONSTRAINT {} UNIQUE ({})", self.name, self.fields.join(", "))
    }
}

/// Declare a unique constraint from inside a model's `constraints()` without
/// repeating the model name as a string.
///
/// ```
/// use modelkit::auto_unique;
///
/// let uq = auto_unique!(Contact, name, email).unwrap();
/// assert_eq!(uq.name, "UQ_Contact_name_email");
/// ```
#[macro_export]
macro_rules! auto_unique {
    ($model:ident, $($field:ident),+ $(,)?) => {
        $crate::constraint::UniqueConstraint::auto(
            stringify!($model),
            &[$(stringify!($field)),+],
        )
    };
}
