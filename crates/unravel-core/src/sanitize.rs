//! Volatile-field stripping for user records.
//!
//! The forum bumps `days` and `views` on every page load, so a raw record
//! diff would flag the whole roster every cycle. Stripping is strict: a
//! missing volatile field means the upstream schema changed and the diff can
//! no longer be trusted, so it is an error rather than a silent no-op.

use crate::model::UserRecord;

/// Fields removed from every user record before comparison.
pub const VOLATILE_FIELDS: [&str; 4] = ["lti_ids", "user_id", "days", "views"];

/// A user record arrived without one of the [`VOLATILE_FIELDS`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user record for {name:?} is missing volatile field {field:?}")]
pub struct MissingField {
    pub name: String,
    pub field: &'static str,
}

/// Strip the volatile fields from `user` in place.
///
/// # Errors
///
/// Returns [`MissingField`] if any volatile field is absent, including when
/// the record was already sanitized (the fields are gone on a second pass).
pub fn sanitize(user: &mut UserRecord) -> Result<(), MissingField> {
    for field in VOLATILE_FIELDS {
        if user.extra.remove(field).is_none() {
            return Err(MissingField {
                name: user.name.clone(),
                field,
            });
        }
    }
    Ok(())
}
