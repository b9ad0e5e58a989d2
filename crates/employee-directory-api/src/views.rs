use std::fmt::{Display, Formatter};
use std::str::FromStr;

use employee_directory_core::{
    Category, DetailOrigin, EmployeeFilter, EmployeeRecord, FacetSet, LoadState, OverlayState,
    PageAccumulator,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionId(pub Ulid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(value).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FeedId(pub Ulid);

impl FeedId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for FeedId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FeedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FeedId {
    type Err = ulid::DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(value).map(Self)
    }
}

/// Aggregate numbers behind the dashboard, refreshed on the revalidation window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardData {
    pub total_employees: usize,
    pub departments: FacetSet,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardView {
    pub total_employees: usize,
    pub departments: FacetSet,
    #[serde(with = "time::serde::rfc3339")]
    pub produced_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RandomEmployeeView {
    pub employee: Option<EmployeeRecord>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedView {
    pub feed_id: FeedId,
    pub state: LoadState,
    pub loaded: usize,
    pub total: Option<usize>,
    pub has_more: bool,
    pub employees: Vec<EmployeeRecord>,
    pub departments: FacetSet,
    pub notice: Option<String>,
}

impl FeedView {
    pub(crate) fn of(feed_id: FeedId, accumulator: &PageAccumulator, notice: Option<String>) -> Self {
        Self {
            feed_id,
            state: accumulator.state(),
            loaded: accumulator.len(),
            total: accumulator.total(),
            has_more: accumulator.has_more(),
            employees: accumulator.records().to_vec(),
            departments: accumulator.departments(),
            notice,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryView {
    pub employees: Vec<EmployeeRecord>,
    /// Size of the listing before filtering.
    pub total: usize,
    pub departments: FacetSet,
    pub filter: EmployeeFilter,
    #[serde(with = "time::serde::rfc3339::option")]
    pub produced_at: Option<OffsetDateTime>,
    pub notice: Option<String>,
}

/// Per-employee data captured in one detail snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailData {
    pub employee: EmployeeRecord,
    /// `None` when the category list came back empty.
    pub assigned_department: Option<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailView {
    pub session_id: SessionId,
    /// Current local value; `None` once deleted in this session.
    pub employee: Option<EmployeeRecord>,
    pub overlay: OverlayState,
    pub assigned_department: Option<Category>,
    pub origin: DetailOrigin,
    #[serde(with = "time::serde::rfc3339")]
    pub produced_at: OffsetDateTime,
    pub notice: Option<String>,
}
