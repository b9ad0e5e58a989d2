use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::EmployeeRecord;

/// Which materialized collection a facet set was projected from.
///
/// Sets from different origins are computed over different subsets and timings of
/// the source data and are never reconciled with each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FacetOrigin {
    DashboardSnapshot,
    FullListing,
    AccumulatedPages,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DepartmentFacet {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FacetSet {
    pub origin: FacetOrigin,
    pub departments: Vec<DepartmentFacet>,
}

impl FacetSet {
    #[must_use]
    pub fn empty(origin: FacetOrigin) -> Self {
        Self { origin, departments: Vec::new() }
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.departments.iter().any(|facet| facet.value == value)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.departments.iter().map(|facet| facet.value.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.departments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }
}

/// Unique departments in first-seen order. Records without a department are skipped.
pub fn department_facets<'a>(
    origin: FacetOrigin,
    records: impl IntoIterator<Item = &'a EmployeeRecord>,
) -> FacetSet {
    let mut seen = HashSet::new();
    let departments = records
        .into_iter()
        .filter_map(EmployeeRecord::department)
        .filter(|department| seen.insert(department.to_string()))
        .map(|department| DepartmentFacet {
            value: department.to_string(),
            label: display_label(department),
        })
        .collect();
    FacetSet { origin, departments }
}

/// `"human-resources"` becomes `"Human resources"`: first letter upper-cased, first
/// hyphen after it turned into a space.
#[must_use]
pub fn display_label(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.collect();
            first.to_uppercase().chain(rest.replacen('-', " ", 1).chars()).collect()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::sample_employee;
    use crate::model::EmployeeId;

    #[test]
    fn labels_capitalize_and_replace_first_hyphen_only() {
        assert_eq!(display_label("human-resources"), "Human resources");
        assert_eq!(display_label("home-decoration-tools"), "Home decoration-tools");
        assert_eq!(display_label("Engineering"), "Engineering");
        assert_eq!(display_label(""), "");
    }

    #[test]
    fn facets_keep_first_seen_order_and_skip_missing_departments() {
        let mut first = sample_employee(EmployeeId(2));
        first.company.department = Some("Support".to_string());
        let mut second = sample_employee(EmployeeId(3));
        second.company.department = None;
        let mut third = sample_employee(EmployeeId(4));
        third.company.department = Some("Engineering".to_string());
        let mut fourth = sample_employee(EmployeeId(5));
        fourth.company.department = Some("Support".to_string());

        let facets =
            department_facets(FacetOrigin::FullListing, &[first, second, third, fourth]);

        assert_eq!(facets.origin, FacetOrigin::FullListing);
        assert_eq!(facets.values().collect::<Vec<_>>(), vec!["Support", "Engineering"]);
        assert!(facets.contains("Engineering"));
        assert!(!facets.contains("Legal"));
    }
}
