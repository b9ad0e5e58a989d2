use serde::{Deserialize, Serialize};

use crate::model::EmployeeRecord;

/// In-memory filter over a full listing: case-insensitive substring match on the full
/// name, and an exact department match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct EmployeeFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl EmployeeFilter {
    #[must_use]
    pub fn matches(&self, record: &EmployeeRecord) -> bool {
        let department_match = match self.department.as_deref() {
            None | Some("") => true,
            Some(department) => record.department() == Some(department),
        };
        let search_match = match self.search.as_deref() {
            None | Some("") => true,
            Some(search) => record.full_name().to_lowercase().contains(&search.to_lowercase()),
        };
        department_match && search_match
    }

    #[must_use]
    pub fn apply(&self, records: &[EmployeeRecord]) -> Vec<EmployeeRecord> {
        records.iter().filter(|record| self.matches(record)).cloned().collect()
    }
}
