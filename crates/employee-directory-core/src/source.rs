use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::error::DirectoryError;
use crate::model::{Category, EmployeeId, EmployeeRecord, UsersPage};

/// Read-only access to the remote user-record API.
///
/// Implementations hold no cache and never retry; freshness and retry policy belong to
/// the caller. Every failure that is not an upstream "absent" signal is a
/// [`DirectoryError::Transport`].
pub trait RecordSource: Send + Sync {
    /// Looks up one employee. Absence upstream is [`DirectoryError::NotFound`].
    fn fetch_by_id(
        &self,
        id: EmployeeId,
    ) -> impl Future<Output = Result<EmployeeRecord, DirectoryError>> + Send;

    /// One page of the users collection. `total` may drift between calls.
    fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<UsersPage, DirectoryError>> + Send;

    /// A single bulk request for callers that filter in memory.
    fn fetch_all(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EmployeeRecord>, DirectoryError>> + Send;

    fn fetch_category_list(
        &self,
    ) -> impl Future<Output = Result<Vec<Category>, DirectoryError>> + Send;
}

impl<S: RecordSource> RecordSource for Arc<S> {
    fn fetch_by_id(
        &self,
        id: EmployeeId,
    ) -> impl Future<Output = Result<EmployeeRecord, DirectoryError>> + Send {
        (**self).fetch_by_id(id)
    }

    fn fetch_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<UsersPage, DirectoryError>> + Send {
        (**self).fetch_page(limit, offset)
    }

    fn fetch_all(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EmployeeRecord>, DirectoryError>> + Send {
        (**self).fetch_all(limit)
    }

    fn fetch_category_list(
        &self,
    ) -> impl Future<Output = Result<Vec<Category>, DirectoryError>> + Send {
        (**self).fetch_category_list()
    }
}

/// Ids to materialize ahead of time: whatever the first `upper_bound` users are.
///
/// Ids outside this set are still reachable; detail lookups fall back to an on-demand
/// fetch for them.
///
/// # Errors
/// Propagates the source failure.
pub async fn enumerate_ids<S: RecordSource>(
    source: &S,
    upper_bound: usize,
) -> Result<BTreeSet<EmployeeId>, DirectoryError> {
    let records = source.fetch_all(upper_bound).await?;
    Ok(records.into_iter().map(|record| record.id).collect())
}
