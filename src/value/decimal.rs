//! Decimal parameters (rust_decimal crate).

use rust_decimal::Decimal;

use super::Value;

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v.to_string())
    }
}
