//! Cached receiver property

use crate::command::PropertyCode;
use std::time::Instant;

/// Last observed value of a receiver property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub code: PropertyCode,
    pub value: String,
    pub updated_at: Instant,
}

impl Property {
    /// Create a property observed now
    pub fn new(code: PropertyCode, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
            updated_at: Instant::now(),
        }
    }

    /// Value parsed as a hexadecimal integer
    ///
    /// Receivers report levels and indexes in hex (`MVL2A` is volume 42).
    pub fn hex_value(&self) -> Option<i64> {
        i64::from_str_radix(&self.value, 16).ok()
    }

    /// Value parsed as a decimal integer
    pub fn decimal_value(&self) -> Option<i64> {
        self.value.parse().ok()
    }
}
