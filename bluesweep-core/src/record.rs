//! Discovered-device records

use serde::Serialize;

/// Name used until a real name has been observed for a device
pub const PLACEHOLDER_NAME: &str = "Unknown Device";

/// True if `name` carries no real device name
pub fn is_placeholder(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name == PLACEHOLDER_NAME
}

/// Normalize an observed name: empty names become the placeholder
pub fn name_or_placeholder(name: &str) -> String {
    if is_placeholder(name) {
        PLACEHOLDER_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// One physically distinct device seen during a scan session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    /// Stable identity, shared key across both discovery sources
    pub id: String,
    pub name: String,
    /// Short descriptor, newest observation wins
    pub status: String,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>, name: &str, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name_or_placeholder(name),
            status: status.into(),
        }
    }

    pub fn has_placeholder_name(&self) -> bool {
        is_placeholder(&self.name)
    }

    /// Merge a newer observation into this record.
    ///
    /// Status is replaced unconditionally. The name only moves from the
    /// placeholder to a real name, never back.
    pub fn merge(&mut self, name: &str, status: impl Into<String>) {
        if self.has_placeholder_name() && !is_placeholder(name) {
            self.name = name.to_string();
        }
        self.status = status.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_becomes_placeholder() {
        let record = DeviceRecord::new("A", "  ", "Available");
        assert_eq!(record.name, PLACEHOLDER_NAME);
        assert!(record.has_placeholder_name());
    }

    #[test]
    fn merge_upgrades_placeholder_only() {
        let mut record = DeviceRecord::new("A", "", "S1");
        record.merge("Speaker", "S2");
        assert_eq!(record.name, "Speaker");
        assert_eq!(record.status, "S2");

        record.merge("Other", "S3");
        assert_eq!(record.name, "Speaker");

        record.merge(PLACEHOLDER_NAME, "S4");
        assert_eq!(record.name, "Speaker");
        assert_eq!(record.status, "S4");
    }
}
