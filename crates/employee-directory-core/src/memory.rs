//! In-process [`RecordSource`] backed by a fixed record list.
//!
//! Used by tests and demos to reproduce remote behavior deterministically: it counts
//! requests per operation, can fail the next N requests with a transport error, and can
//! shift the listing between calls the way a live upstream does.

use std::sync::{Mutex, PoisonError};

use crate::error::DirectoryError;
use crate::model::{Address, Category, Company, EmployeeId, EmployeeRecord, UsersPage};
use crate::source::RecordSource;

const SAMPLE_DEPARTMENTS: [&str; 5] =
    ["Engineering", "Support", "Marketing", "Human Resources", "Legal"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub by_id: usize,
    pub page: usize,
    pub all: usize,
    pub categories: usize,
}

impl CallCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.by_id + self.page + self.all + self.categories
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<EmployeeRecord>,
    categories: Vec<Category>,
    pending_failures: usize,
    calls: CallCounts,
}

impl MemoryState {
    fn take_failure(&mut self) -> Result<(), DirectoryError> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(DirectoryError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySource {
    state: Mutex<MemoryState>,
}

impl InMemorySource {
    #[must_use]
    pub fn new(records: Vec<EmployeeRecord>, categories: Vec<Category>) -> Self {
        Self {
            state: Mutex::new(MemoryState { records, categories, ..MemoryState::default() }),
        }
    }

    /// `count` sample employees with ids `1..=count` and a small category list.
    #[must_use]
    pub fn with_sample_employees(count: u64) -> Self {
        let records = (1..=count).map(|id| sample_employee(EmployeeId(id))).collect();
        let categories = ["beauty", "fragrances", "furniture", "groceries"]
            .iter()
            .map(|slug| Category::named(slug, &capitalize(slug)))
            .collect();
        Self::new(records, categories)
    }

    fn with_state<T>(&self, apply: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state)
    }

    /// The next `count` requests of any kind fail with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.with_state(|state| state.pending_failures = count);
    }

    /// Inserts a record at the head of the listing, shifting every later page by one.
    pub fn insert_front(&self, record: EmployeeRecord) {
        self.with_state(|state| state.records.insert(0, record));
    }

    pub fn remove(&self, id: EmployeeId) {
        self.with_state(|state| state.records.retain(|record| record.id != id));
    }

    pub fn set_categories(&self, categories: Vec<Category>) {
        self.with_state(|state| state.categories = categories);
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.with_state(|state| state.calls)
    }
}

impl RecordSource for InMemorySource {
    async fn fetch_by_id(&self, id: EmployeeId) -> Result<EmployeeRecord, DirectoryError> {
        self.with_state(|state| {
            state.calls.by_id += 1;
            state.take_failure()?;
            state
                .records
                .iter()
                .find(|record| record.id == id)
                .cloned()
                .ok_or(DirectoryError::NotFound(id))
        })
    }

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<UsersPage, DirectoryError> {
        self.with_state(|state| {
            state.calls.page += 1;
            state.take_failure()?;
            let users: Vec<EmployeeRecord> =
                state.records.iter().skip(offset).take(limit).cloned().collect();
            Ok(UsersPage { users, total: state.records.len(), skip: offset, limit })
        })
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        self.with_state(|state| {
            state.calls.all += 1;
            state.take_failure()?;
            Ok(state.records.iter().take(limit).cloned().collect())
        })
    }

    async fn fetch_category_list(&self) -> Result<Vec<Category>, DirectoryError> {
        self.with_state(|state| {
            state.calls.categories += 1;
            state.take_failure()?;
            Ok(state.categories.clone())
        })
    }
}

/// A plausible employee for `id`; departments rotate through a fixed list.
#[must_use]
pub fn sample_employee(id: EmployeeId) -> EmployeeRecord {
    let slot = usize::try_from(id.0 % 5).unwrap_or(0);
    let department = SAMPLE_DEPARTMENTS[slot];
    EmployeeRecord {
        id,
        first_name: format!("First{}", id.0),
        last_name: format!("Last{}", id.0),
        email: format!("employee{}@example.com", id.0),
        phone: format!("+1 555-01{:02}", id.0 % 100),
        age: 20 + u32::try_from(id.0 % 40).unwrap_or(0),
        image: format!("https://example.com/avatars/{}.png", id.0),
        address: Address { address: format!("{} Main Street", id.0), city: "Springfield".to_string() },
        company: Company {
            name: "Example Corp".to_string(),
            title: "Analyst".to_string(),
            department: Some(department.to_string()),
        },
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
