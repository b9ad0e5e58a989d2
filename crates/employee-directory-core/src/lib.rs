//! Data synchronization and incremental-load layer for the employee directory.
//!
//! Every view acquires its records through a [`RecordSource`] and then layers one of
//! three freshness regimes on top: a [`SnapshotCache`] (periodic or per-request), a
//! [`DetailCache`] for per-employee snapshots, or a [`PageAccumulator`] for incremental
//! scrolling. Local edits live in an [`OverlayStore`] and never reach the source.

pub mod accumulator;
pub mod assign;
pub mod clock;
pub mod error;
pub mod facets;
pub mod filter;
pub mod memory;
pub mod model;
pub mod overlay;
pub mod preferences;
pub mod snapshot;
pub mod source;

pub use accumulator::{LoadOutcome, LoadState, PageAccumulator, PageRequest, DEFAULT_PAGE_SIZE};
pub use assign::assign_department;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DirectoryError;
pub use facets::{department_facets, DepartmentFacet, FacetOrigin, FacetSet};
pub use filter::EmployeeFilter;
pub use memory::{sample_employee, CallCounts, InMemorySource};
pub use model::{Address, Category, Company, EmployeeId, EmployeeRecord, UsersPage};
pub use overlay::{EmployeePatch, OverlayRecord, OverlayState, OverlayStore};
pub use preferences::{Preferences, Theme, GUEST_NAME};
pub use snapshot::{
    DetailCache, DetailOrigin, FreshnessPolicy, ResolvedDetail, Snapshot, SnapshotCache,
};
pub use source::{enumerate_ids, RecordSource};
