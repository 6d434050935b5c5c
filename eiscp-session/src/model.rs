//! Receiver model profiles
//!
//! Each receiver family expects its own version/reserved bytes in the frame
//! header. Their meaning is not interpreted here; they are configuration data
//! copied into every outbound header.

use eiscp_core::{EiscpError, EiscpResult};
use std::collections::HashMap;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "TX-NR616";

/// Header bytes and terminator for one receiver model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    name: String,
    header_tail: [u8; 4],
    terminator: Vec<u8>,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, header_tail: [u8; 4], terminator: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            header_tail,
            terminator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version and reserved bytes written after the length fields
    pub fn header_tail(&self) -> &[u8; 4] {
        &self.header_tail
    }

    /// Bytes appended to outbound command text
    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL, [0x01, 0x00, 0x00, 0x00], b"\r".to_vec())
    }
}

/// Profiles keyed by model name
#[derive(Debug, Clone)]
pub struct ModelTable {
    profiles: HashMap<String, ModelProfile>,
}

impl ModelTable {
    /// Table holding only the default model
    pub fn new() -> Self {
        let mut table = Self {
            profiles: HashMap::new(),
        };
        table.register(ModelProfile::default());
        table
    }

    /// Add or replace a profile
    pub fn register(&mut self, profile: ModelProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Look up a profile by model name
    pub fn get(&self, name: &str) -> EiscpResult<&ModelProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| EiscpError::UnknownModel(name.to_string()))
    }
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = ModelTable::new();
        let profile = table.get(DEFAULT_MODEL).unwrap();
        assert_eq!(profile.header_tail(), &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(profile.terminator(), b"\r");
        assert!(matches!(table.get("TX-XXXX"), Err(EiscpError::UnknownModel(_))));
    }

    #[test]
    fn test_register_replaces() {
        let mut table = ModelTable::new();
        table.register(ModelProfile::new("TX-NR616", [0x01, 0x00, 0x00, 0x01], b"\r\n".to_vec()));
        table.register(ModelProfile::new("TX-SR508", [0x01, 0x00, 0x00, 0x00], b"\x1a".to_vec()));
        assert_eq!(table.get("TX-NR616").unwrap().header_tail()[3], 0x01);
        assert_eq!(table.get("TX-SR508").unwrap().terminator(), b"\x1a");
    }
}
