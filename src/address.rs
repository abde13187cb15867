use std::collections::BTreeMap; // BTreeMap so Debug output is sorted

/// address fields that point nowhere hold all ones
pub const UNDEFINED_ADDRESS: u64 = 0xFFFF_FFFF_FFFF_FFFF;

pub const KEY_SUPERBLOCK: &str = "superblock";
pub const KEY_ROOT_GROUP: &str = "rootGroup";
pub const KEY_END_OF_FILE: &str = "endOfFile";

/// Symbolic name -> file offset map built up during one emission pass.
///
/// Well-known keys: `superblock`, `rootGroup`, `endOfFile`, plus
/// `dataset_<path>`, `group_<path>` and `chunkindex_<path>` per object.
/// Every recorded offset lies in [0, image length]; only `endOfFile` may
/// equal the image length. Cleared between builds.
#[derive(Debug, Clone, Default)]
pub struct AddressLedger {
    entries: BTreeMap<String, u64>,
}

impl AddressLedger {
    pub fn new() -> AddressLedger {
        AddressLedger::default()
    }

    pub fn record(&mut self, name: impl Into<String>, offset: u64) {
        self.entries.insert(name.into(), offset);
    }

    pub fn record_dataset(&mut self, path: &str, offset: u64) {
        self.record(format!("dataset_{path}"), offset);
    }

    pub fn record_group(&mut self, path: &str, offset: u64) {
        self.record(format!("group_{path}"), offset);
    }

    pub fn record_chunk_index(&mut self, path: &str, offset: u64) {
        self.record(format!("chunkindex_{path}"), offset);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn dataset(&self, path: &str) -> Option<u64> {
        self.get(&format!("dataset_{path}"))
    }

    pub fn group(&self, path: &str) -> Option<u64> {
        self.get(&format!("group_{path}"))
    }

    pub fn chunk_index(&self, path: &str) -> Option<u64> {
        self.get(&format!("chunkindex_{path}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_and_derived_keys() {
        let mut ledger = AddressLedger::new();
        ledger.record(KEY_SUPERBLOCK, 0);
        ledger.record_dataset("/a/b", 1024);
        ledger.record_group("/a", 2048);
        assert_eq!(ledger.get("superblock"), Some(0));
        assert_eq!(ledger.dataset("/a/b"), Some(1024));
        assert_eq!(ledger.group("/a"), Some(2048));
        assert_eq!(ledger.get("dataset_/a"), None);
        assert_eq!(ledger.len(), 3);
    }
}
