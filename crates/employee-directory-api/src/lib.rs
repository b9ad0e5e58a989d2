//! View composition over the sync layer: dashboard, full directory, incremental feed
//! and detail sessions with local edits.

mod config;
mod views;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use employee_directory_core::{
    assign_department, department_facets, enumerate_ids, Category, Clock, DetailCache,
    DetailOrigin, DirectoryError, EmployeeFilter, EmployeeId, EmployeePatch, FacetOrigin,
    FacetSet, FreshnessPolicy, OverlayStore, PageAccumulator, Preferences, RecordSource,
    SnapshotCache, SystemClock,
};
use rand::Rng;
use time::{Duration, OffsetDateTime};

pub use config::{AppConfig, DirectoryConfig};
pub use views::{
    DashboardData, DashboardView, DetailData, DetailView, DirectoryView, FeedId, FeedView,
    RandomEmployeeView, SessionId,
};

pub const API_CONTRACT_VERSION: &str = "api.v1";

pub const NOTICE_RANDOM_FAILED: &str = "Failed to fetch random employee.";
pub const NOTICE_LOAD_MORE_FAILED: &str = "Failed to load more employees.";
pub const NOTICE_UPDATED: &str = "Employee details updated!";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("unknown detail session {0}")]
    UnknownSession(SessionId),
    #[error("unknown feed {0}")]
    UnknownFeed(FeedId),
}

impl ApiError {
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Directory(err) => err.notice(),
            Self::UnknownSession(_) => "This employee view has been closed.".to_string(),
            Self::UnknownFeed(_) => "This employee list has been closed.".to_string(),
        }
    }
}

#[derive(Debug)]
struct FeedEntry {
    accumulator: PageAccumulator,
    last_touched: OffsetDateTime,
}

#[derive(Debug)]
struct DetailSession {
    store: OverlayStore,
    assigned_department: Option<Category>,
    origin: DetailOrigin,
    produced_at: OffsetDateTime,
    last_touched: OffsetDateTime,
}

impl DetailSession {
    fn view(&self, session_id: SessionId, notice: Option<String>) -> DetailView {
        DetailView {
            session_id,
            employee: self.store.materialize(),
            overlay: self.store.current().state().clone(),
            assigned_department: self.assigned_department.clone(),
            origin: self.origin,
            produced_at: self.produced_at,
            notice,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops entries untouched for `idle` or longer. Returns how many were dropped.
fn sweep_idle<K, V>(
    entries: &mut HashMap<K, V>,
    now: OffsetDateTime,
    idle: Duration,
    last_touched: impl Fn(&V) -> OffsetDateTime,
) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| now - last_touched(entry) < idle);
    before - entries.len()
}

/// Shared entry point for every view.
///
/// Snapshot caches sit behind async mutexes so concurrent callers coalesce onto one
/// refresh. Feeds and detail sessions sit behind plain mutexes that are never held
/// across a fetch; the ones nobody closed are swept once idle for
/// [`DirectoryConfig::idle_timeout`].
#[derive(Debug)]
pub struct DirectoryApi<S, C = SystemClock> {
    source: S,
    clock: C,
    config: DirectoryConfig,
    dashboard: tokio::sync::Mutex<SnapshotCache<DashboardData>>,
    details: tokio::sync::Mutex<DetailCache<DetailData>>,
    feeds: Mutex<HashMap<FeedId, FeedEntry>>,
    sessions: Mutex<HashMap<SessionId, DetailSession>>,
    preferences: Mutex<Preferences>,
}

impl<S: RecordSource> DirectoryApi<S, SystemClock> {
    #[must_use]
    pub fn new(source: S, config: DirectoryConfig) -> Self {
        Self::with_clock(source, config, SystemClock)
    }
}

impl<S: RecordSource, C: Clock> DirectoryApi<S, C> {
    #[must_use]
    pub fn with_clock(source: S, config: DirectoryConfig, clock: C) -> Self {
        Self {
            dashboard: tokio::sync::Mutex::new(SnapshotCache::new(config.dashboard_policy())),
            details: tokio::sync::Mutex::new(DetailCache::new(config.detail_max_age())),
            feeds: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            preferences: Mutex::new(Preferences::default()),
            source,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Materializes detail snapshots for the leading employees, as a static build would.
    ///
    /// # Errors
    /// Fails only if the id enumeration itself fails; individual ids that fail are
    /// skipped and served on demand later.
    pub async fn prebuild(&self) -> Result<usize, ApiError> {
        let ids = enumerate_ids(&self.source, self.config.prebuild_limit).await?;
        let now = self.clock.now();
        let mut details = self.details.lock().await;
        Ok(details.prebuild(ids, now, |id| self.fetch_detail(id)).await)
    }

    // ----- dashboard -----

    /// # Errors
    /// The fetch error when no dashboard snapshot has ever been produced.
    pub async fn dashboard(&self) -> Result<DashboardView, ApiError> {
        let now = self.clock.now();
        let snapshot = {
            let mut cache = self.dashboard.lock().await;
            cache.resolve(now, || self.fetch_dashboard()).await?
        };
        Ok(DashboardView {
            total_employees: snapshot.data.total_employees,
            departments: snapshot.data.departments,
            produced_at: snapshot.produced_at,
        })
    }

    async fn fetch_dashboard(&self) -> Result<DashboardData, DirectoryError> {
        let page = self.source.fetch_page(self.config.dashboard_sample_limit, 0).await?;
        Ok(DashboardData {
            total_employees: page.total,
            departments: department_facets(FacetOrigin::DashboardSnapshot, &page.users),
        })
    }

    /// Fetches a random employee, never cached.
    pub async fn employee_of_the_day(&self) -> RandomEmployeeView {
        let max = self.config.employee_of_the_day_max_id.max(1);
        let id = EmployeeId(rand::thread_rng().gen_range(1..=max));
        match self.source.fetch_by_id(id).await {
            Ok(employee) => RandomEmployeeView { employee: Some(employee), notice: None },
            Err(err) => {
                tracing::warn!(%id, error = %err, "employee of the day unavailable");
                RandomEmployeeView { employee: None, notice: Some(NOTICE_RANDOM_FAILED.to_string()) }
            }
        }
    }

    // ----- incremental feed -----

    /// Opens a feed and loads its first page.
    pub async fn open_feed(&self) -> FeedView {
        let feed_id = FeedId::new();
        let now = self.clock.now();
        {
            let mut feeds = lock(&self.feeds);
            let swept = sweep_idle(&mut feeds, now, self.config.idle_timeout(), |entry| {
                entry.last_touched
            });
            if swept > 0 {
                tracing::info!(swept, "idle feeds discarded");
            }
            let accumulator = PageAccumulator::new(self.config.page_size);
            feeds.insert(feed_id, FeedEntry { accumulator, last_touched: now });
        }
        tracing::info!(%feed_id, "feed opened");
        match self.load_more(feed_id).await {
            Ok(view) => view,
            // only reachable if the feed was closed while its first page was in flight
            Err(_) => FeedView::of(feed_id, &PageAccumulator::new(self.config.page_size), None),
        }
    }

    /// Loads the next page of a feed. A call while another is in flight, or after the
    /// last page, returns the current view without fetching.
    ///
    /// # Errors
    /// [`ApiError::UnknownFeed`] for a closed feed, and
    /// [`DirectoryError::StaleResponseDiscarded`] if the feed was closed while this
    /// page was in flight. A failed fetch is not an error: the view carries a notice
    /// and the next call retries the same page.
    pub async fn load_more(&self, feed_id: FeedId) -> Result<FeedView, ApiError> {
        let request = {
            let mut feeds = lock(&self.feeds);
            let entry = feeds.get_mut(&feed_id).ok_or(ApiError::UnknownFeed(feed_id))?;
            entry.last_touched = self.clock.now();
            match entry.accumulator.begin_load() {
                Some(request) => request,
                None => return Ok(FeedView::of(feed_id, &entry.accumulator, None)),
            }
        };

        let result = self.source.fetch_page(request.limit, request.offset).await;

        let mut feeds = lock(&self.feeds);
        let Some(entry) = feeds.get_mut(&feed_id) else {
            tracing::debug!(%feed_id, "feed closed mid-fetch; discarding page");
            return Err(DirectoryError::StaleResponseDiscarded.into());
        };
        entry.last_touched = self.clock.now();
        let accumulator = &mut entry.accumulator;
        match accumulator.complete(request, result) {
            Ok(_) => Ok(FeedView::of(feed_id, accumulator, None)),
            Err(DirectoryError::StaleResponseDiscarded) => {
                Err(DirectoryError::StaleResponseDiscarded.into())
            }
            Err(_) => Ok(FeedView::of(
                feed_id,
                accumulator,
                Some(NOTICE_LOAD_MORE_FAILED.to_string()),
            )),
        }
    }

    /// # Errors
    /// [`ApiError::UnknownFeed`] if the feed is not open.
    pub fn feed(&self, feed_id: FeedId) -> Result<FeedView, ApiError> {
        let mut feeds = lock(&self.feeds);
        let entry = feeds.get_mut(&feed_id).ok_or(ApiError::UnknownFeed(feed_id))?;
        entry.last_touched = self.clock.now();
        Ok(FeedView::of(feed_id, &entry.accumulator, None))
    }

    /// # Errors
    /// [`ApiError::UnknownFeed`] if the feed is not open.
    pub fn close_feed(&self, feed_id: FeedId) -> Result<(), ApiError> {
        lock(&self.feeds).remove(&feed_id).ok_or(ApiError::UnknownFeed(feed_id))?;
        tracing::info!(%feed_id, "feed closed");
        Ok(())
    }

    // ----- full directory -----

    /// Fetches the full listing for this call only and filters it in memory.
    ///
    /// Without an explicit department the preferred one is applied. A transport failure
    /// yields an empty listing with a notice.
    pub async fn directory(&self, filter: EmployeeFilter) -> DirectoryView {
        let selected = lock(&self.preferences).selected_department.clone();
        let filter = EmployeeFilter { department: filter.department.or(selected), ..filter };

        let mut activation = SnapshotCache::new(FreshnessPolicy::PerRequest);
        let limit = self.config.directory_limit;
        match activation.resolve(self.clock.now(), || self.source.fetch_all(limit)).await {
            Ok(snapshot) => DirectoryView {
                employees: filter.apply(&snapshot.data),
                total: snapshot.data.len(),
                departments: department_facets(FacetOrigin::FullListing, &snapshot.data),
                filter,
                produced_at: Some(snapshot.produced_at),
                notice: None,
            },
            Err(err) => {
                tracing::warn!(error = %err, "directory listing unavailable");
                DirectoryView {
                    employees: Vec::new(),
                    total: 0,
                    departments: FacetSet::empty(FacetOrigin::FullListing),
                    filter,
                    produced_at: None,
                    notice: Some(format!("Server failed to load data: {err}")),
                }
            }
        }
    }

    // ----- detail sessions -----

    async fn fetch_detail(&self, id: EmployeeId) -> Result<DetailData, DirectoryError> {
        let (employee, categories) = futures::try_join!(
            self.source.fetch_by_id(id),
            self.source.fetch_category_list()
        )?;
        let assigned_department = match assign_department(employee.id, &categories) {
            Ok(category) => Some(category.clone()),
            Err(err) => {
                tracing::warn!(%id, error = %err, "no department assigned");
                None
            }
        };
        Ok(DetailData { employee, assigned_department })
    }

    /// Opens a detail session seeded from the employee's snapshot.
    ///
    /// # Errors
    /// [`DirectoryError::NotFound`] for an unknown employee, or the transport error when
    /// no snapshot can be served.
    pub async fn open_detail(&self, id: EmployeeId) -> Result<DetailView, ApiError> {
        let now = self.clock.now();
        // the cache lock is never held across the upstream fetch; two concurrent misses
        // for the same id may both fetch, and the later one is discarded by `resolve`
        let cached = self.details.lock().await.fresh(id, now);
        let resolved = match cached {
            Some(resolved) => resolved,
            None => {
                let fetched = self.fetch_detail(id).await;
                let mut details = self.details.lock().await;
                details.resolve(id, now, |_| std::future::ready(fetched)).await?
            }
        };

        let session_id = SessionId::new();
        let session = DetailSession {
            store: OverlayStore::open(resolved.snapshot.data.employee),
            assigned_department: resolved.snapshot.data.assigned_department,
            origin: resolved.origin,
            produced_at: resolved.snapshot.produced_at,
            last_touched: now,
        };
        let view = session.view(session_id, None);
        {
            let mut sessions = lock(&self.sessions);
            let swept = sweep_idle(&mut sessions, now, self.config.idle_timeout(), |session| {
                session.last_touched
            });
            if swept > 0 {
                tracing::info!(swept, "idle detail sessions discarded");
            }
            sessions.insert(session_id, session);
        }
        tracing::info!(%session_id, %id, origin = ?resolved.origin, "detail session opened");
        Ok(view)
    }

    /// # Errors
    /// [`ApiError::UnknownSession`] if the session is closed.
    pub fn detail(&self, session_id: SessionId) -> Result<DetailView, ApiError> {
        let mut sessions = lock(&self.sessions);
        let session =
            sessions.get_mut(&session_id).ok_or(ApiError::UnknownSession(session_id))?;
        session.last_touched = self.clock.now();
        Ok(session.view(session_id, None))
    }

    /// Applies a local edit. Nothing is sent upstream.
    ///
    /// # Errors
    /// [`ApiError::UnknownSession`], or [`DirectoryError::InvalidPatch`] for a rejected
    /// edit.
    pub fn patch_detail(
        &self,
        session_id: SessionId,
        patch: EmployeePatch,
    ) -> Result<DetailView, ApiError> {
        let mut sessions = lock(&self.sessions);
        let session =
            sessions.get_mut(&session_id).ok_or(ApiError::UnknownSession(session_id))?;
        session.last_touched = self.clock.now();
        session.store.patch(patch)?;
        Ok(session.view(session_id, Some(NOTICE_UPDATED.to_string())))
    }

    /// Marks the employee deleted for this session only.
    ///
    /// # Errors
    /// [`ApiError::UnknownSession`], or [`DirectoryError::InvalidPatch`] if already
    /// deleted.
    pub fn delete_detail(&self, session_id: SessionId) -> Result<DetailView, ApiError> {
        let mut sessions = lock(&self.sessions);
        let session =
            sessions.get_mut(&session_id).ok_or(ApiError::UnknownSession(session_id))?;
        session.last_touched = self.clock.now();
        let first_name = session.store.current().base().first_name.clone();
        session.store.delete()?;
        Ok(session.view(
            session_id,
            Some(format!("{first_name} has been removed from the local list.")),
        ))
    }

    /// Discards the session and every local edit in it.
    ///
    /// # Errors
    /// [`ApiError::UnknownSession`] if it was already closed.
    pub fn close_detail(&self, session_id: SessionId) -> Result<(), ApiError> {
        lock(&self.sessions).remove(&session_id).ok_or(ApiError::UnknownSession(session_id))?;
        tracing::info!(%session_id, "detail session closed");
        Ok(())
    }

    // ----- preferences -----

    #[must_use]
    pub fn preferences(&self) -> Preferences {
        lock(&self.preferences).clone()
    }

    pub fn toggle_theme(&self) -> Preferences {
        let mut preferences = lock(&self.preferences);
        preferences.toggle_theme();
        preferences.clone()
    }

    pub fn login(&self, name: &str) -> Preferences {
        let mut preferences = lock(&self.preferences);
        preferences.login(name);
        preferences.clone()
    }

    pub fn logout(&self) -> Preferences {
        let mut preferences = lock(&self.preferences);
        preferences.logout();
        preferences.clone()
    }

    pub fn select_department(&self, department: Option<String>) -> Preferences {
        let mut preferences = lock(&self.preferences);
        preferences.select_department(department);
        preferences.clone()
    }
}
