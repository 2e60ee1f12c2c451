//! UUID parameters (uuid crate).
//!
//! Sent as the hyphenated string form, which the server's UUID type and
//! CHAR(36) columns both accept.

use super::Value;

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::String(v.hyphenated().to_string())
    }
}
