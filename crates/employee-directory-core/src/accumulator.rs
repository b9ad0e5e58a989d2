use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::facets::{department_facets, FacetOrigin, FacetSet};
use crate::model::{EmployeeId, EmployeeRecord, UsersPage};
use crate::source::RecordSource;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Exhausted,
    Failed,
}

/// Ticket for the single in-flight page request of an accumulator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LoadOutcome {
    /// A page landed; `added` counts records that were not already present.
    Appended { added: usize },
    /// Another request is in flight; nothing was issued.
    AlreadyLoading,
    /// Every page has been loaded; nothing was issued.
    Exhausted,
}

/// Incrementally loaded, de-duplicated employee sequence for a scrolling list.
///
/// At most one page request is in flight. The offset moves only when a page lands, so
/// a failed load can be retried and resumes at exactly the same page.
#[derive(Debug, Clone)]
pub struct PageAccumulator {
    page_size: usize,
    offset: usize,
    total: Option<usize>,
    state: LoadState,
    records: Vec<EmployeeRecord>,
    seen: HashSet<EmployeeId>,
    generation: u64,
    last_error: Option<DirectoryError>,
}

impl Default for PageAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageAccumulator {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            offset: 0,
            total: None,
            state: LoadState::Idle,
            records: Vec::new(),
            seen: HashSet::new(),
            generation: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[EmployeeRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Upstream total as of the last page that landed; `None` before the first one.
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&DirectoryError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.state != LoadState::Exhausted
    }

    /// Departments seen across the pages loaded so far.
    #[must_use]
    pub fn departments(&self) -> FacetSet {
        department_facets(FacetOrigin::AccumulatedPages, &self.records)
    }

    /// Claims the in-flight slot. Returns `None` while loading or once exhausted.
    ///
    /// From `Failed` this re-issues the page that failed.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        match self.state {
            LoadState::Loading | LoadState::Exhausted => None,
            LoadState::Idle | LoadState::Failed => {
                self.state = LoadState::Loading;
                Some(PageRequest {
                    limit: self.page_size,
                    offset: self.offset,
                    generation: self.generation,
                })
            }
        }
    }

    /// Applies the result of a request obtained from [`Self::begin_load`].
    ///
    /// # Errors
    /// [`DirectoryError::StaleResponseDiscarded`] when the accumulator was reset after
    /// the request was issued; otherwise the fetch error, after moving to `Failed`.
    pub fn complete(
        &mut self,
        request: PageRequest,
        result: Result<UsersPage, DirectoryError>,
    ) -> Result<LoadOutcome, DirectoryError> {
        if request.generation != self.generation || self.state != LoadState::Loading {
            tracing::debug!(offset = request.offset, "discarding page for a reset accumulator");
            return Err(DirectoryError::StaleResponseDiscarded);
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                tracing::debug!(offset = self.offset, error = %err, "page load failed");
                self.state = LoadState::Failed;
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let fetched = page.users.len();
        let room = page.total.saturating_sub(self.records.len());
        let mut added = 0;
        for record in page.users {
            if added == room {
                break;
            }
            if self.seen.insert(record.id) {
                self.records.push(record);
                added += 1;
            }
        }

        self.offset += fetched;
        // a total that shrank below what is already loaded cannot un-load records
        let total = page.total.max(self.records.len());
        self.total = Some(total);
        self.last_error = None;
        self.state = if fetched == 0 || self.offset >= total || self.records.len() >= total {
            LoadState::Exhausted
        } else {
            LoadState::Idle
        };

        tracing::debug!(
            offset = self.offset,
            loaded = self.records.len(),
            total,
            added,
            "page landed"
        );
        Ok(LoadOutcome::Appended { added })
    }

    /// Loads the next page from `source`, or does nothing if a load is in flight or
    /// every page is already loaded.
    ///
    /// # Errors
    /// The fetch error; the accumulator is left in `Failed` with records and offset
    /// untouched.
    pub async fn load<S: RecordSource>(&mut self, source: &S) -> Result<LoadOutcome, DirectoryError> {
        let Some(request) = self.begin_load() else {
            return Ok(self.skipped());
        };
        let result = source.fetch_page(request.limit, request.offset).await;
        self.complete(request, result)
    }

    /// Drops everything loaded so far. Requests issued before the reset are discarded
    /// when they complete.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.offset = 0;
        self.total = None;
        self.state = LoadState::Idle;
        self.records.clear();
        self.seen.clear();
        self.last_error = None;
    }

    fn skipped(&self) -> LoadOutcome {
        if self.state == LoadState::Exhausted {
            LoadOutcome::Exhausted
        } else {
            LoadOutcome::AlreadyLoading
        }
    }
}
