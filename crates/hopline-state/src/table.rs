use hopline_model::HopRecord;
use std::collections::BTreeMap;

/// Mapping from hop `ip` to its record.
///
/// Iteration follows `ip` order, which also settles ties between records
/// sharing a hop number in the sorted views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopTable {
    records: BTreeMap<String, HopRecord>,
}

impl HopTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, replacing any record with the same `ip`.
    pub fn upsert(&mut self, record: HopRecord) -> Option<HopRecord> {
        self.records.insert(record.ip.clone(), record)
    }

    pub fn get(&self, ip: &str) -> Option<&HopRecord> {
        self.records.get(ip)
    }

    pub fn get_mut(&mut self, ip: &str) -> Option<&mut HopRecord> {
        self.records.get_mut(ip)
    }

    /// Record for `ip`, created unclassified when missing.
    pub fn entry_for(&mut self, ip: &str) -> &mut HopRecord {
        self.records
            .entry(ip.to_string())
            .or_insert_with(|| HopRecord::new(ip))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HopRecord> {
        self.records.values()
    }
}

impl FromIterator<HopRecord> for HopTable {
    fn from_iter<I: IntoIterator<Item = HopRecord>>(iter: I) -> Self {
        let mut table = HopTable::new();
        for record in iter {
            table.upsert(record);
        }
        table
    }
}
