use crate::model::EmployeeId;

/// Failure kinds shared by every component of the sync layer.
///
/// Nothing here is fatal to the process. Each consuming view maps the kind to a
/// notice via [`DirectoryError::notice`] and carries on.
#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DirectoryError {
    /// Network or decode failure talking to the record source.
    #[error("transport error: {0}")]
    Transport(String),
    /// The source reported that the employee does not exist.
    #[error("employee {0} not found")]
    NotFound(EmployeeId),
    /// Department assignment was attempted against an empty category list.
    #[error("category list is empty")]
    EmptyCategoryList,
    /// A fetch resolved after its owning view was torn down.
    #[error("response discarded: owning view is gone")]
    StaleResponseDiscarded,
    /// A local edit was rejected before touching the overlay.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

impl DirectoryError {
    /// Whether re-issuing the same idempotent operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the error should be shown to the user at all.
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::StaleResponseDiscarded)
    }

    /// User-visible message for the error kind.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Transport(_) => "Could not reach the employee service. Try again.".to_string(),
            Self::NotFound(id) => format!("Employee {id} was not found."),
            Self::EmptyCategoryList => "No departments are available right now.".to_string(),
            Self::StaleResponseDiscarded => String::new(),
            Self::InvalidPatch(reason) => format!("Could not update employee: {reason}."),
        }
    }
}
