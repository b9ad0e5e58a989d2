use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::DirectoryError;
use crate::model::EmployeeId;

/// Data materialized once, stamped with when it was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub data: T,
    #[serde(with = "time::serde::rfc3339")]
    pub produced_at: OffsetDateTime,
}

impl<T> Snapshot<T> {
    #[must_use]
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.produced_at
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FreshnessPolicy {
    /// Reuse a snapshot until it is `max_age` old, then refetch on the next access.
    Revalidate { max_age: Duration },
    /// Fetch for every activation; nothing is reused.
    PerRequest,
}

impl FreshnessPolicy {
    #[must_use]
    pub fn revalidate_every(seconds: i64) -> Self {
        Self::Revalidate { max_age: Duration::seconds(seconds) }
    }
}

/// Per-view snapshot holder.
#[derive(Debug, Clone)]
pub struct SnapshotCache<T> {
    policy: FreshnessPolicy,
    current: Option<Snapshot<T>>,
}

impl<T: Clone> SnapshotCache<T> {
    #[must_use]
    pub fn new(policy: FreshnessPolicy) -> Self {
        Self { policy, current: None }
    }

    #[must_use]
    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// The last snapshot produced, fresh or not.
    #[must_use]
    pub fn get(&self) -> Option<&Snapshot<T>> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_stale(&self, now: OffsetDateTime) -> bool {
        match (self.policy, &self.current) {
            (FreshnessPolicy::PerRequest, _) | (_, None) => true,
            (FreshnessPolicy::Revalidate { max_age }, Some(snapshot)) => {
                snapshot.age(now) >= max_age
            }
        }
    }

    /// Returns the current snapshot if still fresh, otherwise fetches a new one.
    ///
    /// Under [`FreshnessPolicy::Revalidate`] a failed refetch serves the previous
    /// snapshot when there is one.
    ///
    /// # Errors
    /// The fetch error when nothing can be served.
    pub async fn resolve<F, Fut>(
        &mut self,
        now: OffsetDateTime,
        fetch: F,
    ) -> Result<Snapshot<T>, DirectoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        if !self.is_stale(now) {
            if let Some(snapshot) = &self.current {
                return Ok(snapshot.clone());
            }
        }

        match fetch().await {
            Ok(data) => {
                let snapshot = Snapshot { data, produced_at: now };
                if let FreshnessPolicy::Revalidate { .. } = self.policy {
                    tracing::info!(produced_at = %now, "snapshot refreshed");
                }
                self.current = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => match (self.policy, &self.current) {
                (FreshnessPolicy::Revalidate { .. }, Some(previous)) if err.is_retryable() => {
                    tracing::warn!(
                        error = %err,
                        produced_at = %previous.produced_at,
                        "revalidation failed; serving previous snapshot"
                    );
                    Ok(previous.clone())
                }
                _ => Err(err),
            },
        }
    }
}

/// How a detail snapshot was obtained for one access.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetailOrigin {
    /// Materialized ahead of time for an enumerated id.
    Prebuilt,
    /// Not materialized ahead of time; fetched on demand for this access.
    Fallback,
    /// Reused from an earlier on-demand or revalidating fetch.
    Cached,
    /// The previous snapshot had expired and was fetched again.
    Revalidated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDetail<T> {
    pub snapshot: Snapshot<T>,
    pub origin: DetailOrigin,
}

#[derive(Debug, Clone)]
struct DetailEntry<T> {
    snapshot: Snapshot<T>,
    produced_by: DetailOrigin,
}

/// Per-employee snapshots with a short staleness window.
#[derive(Debug, Clone)]
pub struct DetailCache<T> {
    max_age: Duration,
    prebuilt: BTreeSet<EmployeeId>,
    entries: HashMap<EmployeeId, DetailEntry<T>>,
}

impl<T: Clone> DetailCache<T> {
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age, prebuilt: BTreeSet::new(), entries: HashMap::new() }
    }

    #[must_use]
    pub fn is_prebuilt(&self, id: EmployeeId) -> bool {
        self.prebuilt.contains(&id)
    }

    #[must_use]
    pub fn get(&self, id: EmployeeId) -> Option<&Snapshot<T>> {
        self.entries.get(&id).map(|entry| &entry.snapshot)
    }

    /// Materializes `ids` up front. Ids whose fetch fails are skipped and later resolve
    /// through the on-demand path. Returns how many were materialized.
    pub async fn prebuild<F, Fut>(
        &mut self,
        ids: impl IntoIterator<Item = EmployeeId>,
        now: OffsetDateTime,
        mut fetch: F,
    ) -> usize
    where
        F: FnMut(EmployeeId) -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        let mut built = 0;
        for id in ids {
            match fetch(id).await {
                Ok(data) => {
                    self.prebuilt.insert(id);
                    self.entries.insert(
                        id,
                        DetailEntry {
                            snapshot: Snapshot { data, produced_at: now },
                            produced_by: DetailOrigin::Prebuilt,
                        },
                    );
                    built += 1;
                }
                Err(err) => {
                    tracing::warn!(%id, error = %err, "skipping prebuild; will fetch on demand");
                }
            }
        }
        tracing::info!(built, "detail snapshots prebuilt");
        built
    }

    /// The snapshot for `id` if one exists and is still inside the staleness window.
    #[must_use]
    pub fn fresh(&self, id: EmployeeId, now: OffsetDateTime) -> Option<ResolvedDetail<T>> {
        let entry = self.entries.get(&id).filter(|entry| entry.snapshot.age(now) < self.max_age)?;
        let origin = match entry.produced_by {
            DetailOrigin::Prebuilt => DetailOrigin::Prebuilt,
            _ => DetailOrigin::Cached,
        };
        Some(ResolvedDetail { snapshot: entry.snapshot.clone(), origin })
    }

    /// Serves the snapshot for `id`, fetching it on first access or after expiry.
    ///
    /// # Errors
    /// The fetch error when no snapshot can be served. A `NotFound` on revalidation
    /// also evicts the old snapshot.
    pub async fn resolve<F, Fut>(
        &mut self,
        id: EmployeeId,
        now: OffsetDateTime,
        fetch: F,
    ) -> Result<ResolvedDetail<T>, DirectoryError>
    where
        F: FnOnce(EmployeeId) -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        if let Some(resolved) = self.fresh(id, now) {
            return Ok(resolved);
        }
        let previous = self.entries.get(&id).map(|entry| entry.snapshot.clone());

        let produced_by =
            if previous.is_some() { DetailOrigin::Revalidated } else { DetailOrigin::Fallback };

        match fetch(id).await {
            Ok(data) => {
                let snapshot = Snapshot { data, produced_at: now };
                self.entries.insert(id, DetailEntry { snapshot: snapshot.clone(), produced_by });
                tracing::debug!(%id, origin = ?produced_by, "detail snapshot produced");
                Ok(ResolvedDetail { snapshot, origin: produced_by })
            }
            Err(DirectoryError::NotFound(missing)) => {
                self.entries.remove(&id);
                Err(DirectoryError::NotFound(missing))
            }
            Err(err) => match previous {
                Some(snapshot) if err.is_retryable() => {
                    tracing::warn!(%id, error = %err, "detail revalidation failed; serving previous snapshot");
                    Ok(ResolvedDetail { snapshot, origin: DetailOrigin::Cached })
                }
                _ => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn start() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_000)
    }

    async fn resolve_ok(
        cache: &mut SnapshotCache<u32>,
        now: OffsetDateTime,
        calls: &Cell<u32>,
    ) -> Snapshot<u32> {
        let result = cache
            .resolve(now, || async {
                calls.set(calls.get() + 1);
                Ok(calls.get())
            })
            .await;
        match result {
            Ok(snapshot) => snapshot,
            Err(err) => panic!("snapshot should resolve: {err}"),
        }
    }

    #[tokio::test]
    async fn revalidating_snapshot_is_reused_inside_the_window() {
        let mut cache = SnapshotCache::new(FreshnessPolicy::revalidate_every(3600));
        let calls = Cell::new(0);

        let first = resolve_ok(&mut cache, start(), &calls).await;
        let second = resolve_ok(&mut cache, start() + Duration::minutes(59), &calls).await;

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert!(!cache.is_stale(start() + Duration::minutes(59)));
    }

    #[tokio::test]
    async fn expired_snapshot_is_refetched_on_next_access() {
        let mut cache = SnapshotCache::new(FreshnessPolicy::revalidate_every(3600));
        let calls = Cell::new(0);

        resolve_ok(&mut cache, start(), &calls).await;
        let later = start() + Duration::hours(1);
        assert!(cache.is_stale(later));

        let refreshed = resolve_ok(&mut cache, later, &calls).await;
        assert_eq!(refreshed.data, 2);
        assert_eq!(refreshed.produced_at, later);
        assert_eq!(cache.get().map(|snapshot| snapshot.data), Some(2));
    }

    #[tokio::test]
    async fn per_request_snapshot_always_refetches() {
        let mut cache = SnapshotCache::new(FreshnessPolicy::PerRequest);
        let calls = Cell::new(0);

        resolve_ok(&mut cache, start(), &calls).await;
        resolve_ok(&mut cache, start(), &calls).await;

        assert_eq!(calls.get(), 2);
        assert!(cache.is_stale(start()));
    }

    #[tokio::test]
    async fn failed_revalidation_serves_previous_snapshot() {
        let mut cache = SnapshotCache::new(FreshnessPolicy::revalidate_every(60));
        let calls = Cell::new(0);
        resolve_ok(&mut cache, start(), &calls).await;

        let served = cache
            .resolve(start() + Duration::minutes(5), || async {
                Err(DirectoryError::Transport("offline".to_string()))
            })
            .await;

        assert_eq!(served.map(|snapshot| snapshot.produced_at), Ok(start()));
    }

    #[tokio::test]
    async fn failure_without_previous_snapshot_surfaces() {
        let mut cache: SnapshotCache<u32> =
            SnapshotCache::new(FreshnessPolicy::revalidate_every(60));
        let served = cache
            .resolve(start(), || async { Err(DirectoryError::Transport("offline".to_string())) })
            .await;
        assert_eq!(served, Err(DirectoryError::Transport("offline".to_string())));
    }

    #[tokio::test]
    async fn per_request_failure_never_serves_previous_data() {
        let mut cache = SnapshotCache::new(FreshnessPolicy::PerRequest);
        let calls = Cell::new(0);
        resolve_ok(&mut cache, start(), &calls).await;

        let served = cache
            .resolve(start(), || async { Err(DirectoryError::Transport("offline".to_string())) })
            .await;
        assert!(served.is_err());
    }

    async fn detail(
        cache: &mut DetailCache<String>,
        id: u64,
        now: OffsetDateTime,
        calls: &Cell<u32>,
    ) -> Result<ResolvedDetail<String>, DirectoryError> {
        cache
            .resolve(EmployeeId(id), now, |id| async move {
                calls.set(calls.get() + 1);
                if id.0 > 50 {
                    Err(DirectoryError::NotFound(id))
                } else {
                    Ok(format!("employee-{id}-v{}", calls.get()))
                }
            })
            .await
    }

    #[tokio::test]
    async fn prebuilt_ids_are_served_without_fetching() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let built = cache
            .prebuild([EmployeeId(1), EmployeeId(2)], start(), |id| async move {
                Ok(format!("employee-{id}-v0"))
            })
            .await;
        assert_eq!(built, 2);

        let calls = Cell::new(0);
        let resolved = match detail(&mut cache, 1, start() + Duration::seconds(30), &calls).await {
            Ok(resolved) => resolved,
            Err(err) => panic!("prebuilt id should resolve: {err}"),
        };

        assert_eq!(resolved.origin, DetailOrigin::Prebuilt);
        assert_eq!(resolved.snapshot.data, "employee-1-v0");
        assert_eq!(calls.get(), 0);
        assert!(cache.is_prebuilt(EmployeeId(1)));
    }

    #[tokio::test]
    async fn unknown_id_falls_back_then_behaves_like_any_snapshot() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let calls = Cell::new(0);

        let first = detail(&mut cache, 40, start(), &calls).await;
        let second = detail(&mut cache, 40, start() + Duration::seconds(10), &calls).await;
        let third = detail(&mut cache, 40, start() + Duration::seconds(61), &calls).await;

        assert_eq!(first.map(|resolved| resolved.origin), Ok(DetailOrigin::Fallback));
        assert_eq!(second.map(|resolved| resolved.origin), Ok(DetailOrigin::Cached));
        assert_eq!(third.map(|resolved| resolved.origin), Ok(DetailOrigin::Revalidated));
        assert_eq!(calls.get(), 2);
        assert!(!cache.is_prebuilt(EmployeeId(40)));
    }

    #[tokio::test]
    async fn failed_prebuild_resolves_through_fallback() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let built = cache
            .prebuild([EmployeeId(3)], start(), |_| async {
                Err(DirectoryError::Transport("timeout".to_string()))
            })
            .await;
        assert_eq!(built, 0);

        let calls = Cell::new(0);
        let resolved = detail(&mut cache, 3, start(), &calls).await;
        assert_eq!(resolved.map(|resolved| resolved.origin), Ok(DetailOrigin::Fallback));
    }

    #[tokio::test]
    async fn missing_employee_is_not_cached() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let calls = Cell::new(0);

        let first = detail(&mut cache, 77, start(), &calls).await;
        let second = detail(&mut cache, 77, start(), &calls).await;

        assert_eq!(first, Err(DirectoryError::NotFound(EmployeeId(77))));
        assert_eq!(second, Err(DirectoryError::NotFound(EmployeeId(77))));
        assert_eq!(calls.get(), 2);
        assert!(cache.get(EmployeeId(77)).is_none());
    }

    #[tokio::test]
    async fn transport_failure_on_revalidation_serves_previous_detail() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let calls = Cell::new(0);
        let first = detail(&mut cache, 1, start(), &calls).await;
        assert_eq!(first.map(|resolved| resolved.origin), Ok(DetailOrigin::Fallback));

        let served = cache
            .resolve(EmployeeId(1), start() + Duration::seconds(61), |_| async {
                Err(DirectoryError::Transport("offline".to_string()))
            })
            .await;
        let served = match served {
            Ok(served) => served,
            Err(err) => panic!("previous detail should be served: {err}"),
        };

        assert_eq!(served.origin, DetailOrigin::Cached);
        assert_eq!(served.snapshot.produced_at, start());
        assert_eq!(served.snapshot.data, "employee-1-v1");
        assert!(cache.get(EmployeeId(1)).is_some());
    }

    #[tokio::test]
    async fn not_found_on_revalidation_evicts_the_entry() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let calls = Cell::new(0);
        assert!(detail(&mut cache, 1, start(), &calls).await.is_ok());

        let gone = cache
            .resolve(EmployeeId(1), start() + Duration::seconds(61), |id| async move {
                Err(DirectoryError::NotFound(id))
            })
            .await;

        assert_eq!(gone, Err(DirectoryError::NotFound(EmployeeId(1))));
        assert!(cache.get(EmployeeId(1)).is_none());
    }

    #[tokio::test]
    async fn fresh_reports_only_entries_inside_the_window() {
        let mut cache = DetailCache::new(Duration::seconds(60));
        let calls = Cell::new(0);
        assert!(cache.fresh(EmployeeId(2), start()).is_none());
        assert!(detail(&mut cache, 2, start(), &calls).await.is_ok());

        let hit = cache.fresh(EmployeeId(2), start() + Duration::seconds(59));
        assert_eq!(hit.map(|resolved| resolved.origin), Some(DetailOrigin::Cached));
        assert!(cache.fresh(EmployeeId(2), start() + Duration::seconds(60)).is_none());
    }
}
