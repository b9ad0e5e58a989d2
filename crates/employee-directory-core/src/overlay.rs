use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::model::EmployeeRecord;

/// Fields a user may edit locally. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl EmployeePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Same rules as the edit form: a first name cannot be blank and an email must
    /// look like one.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidPatch`] naming the offending field.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if let Some(first_name) = &self.first_name {
            if first_name.trim().is_empty() {
                return Err(DirectoryError::InvalidPatch("first name is required".to_string()));
            }
        }
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                return Err(DirectoryError::InvalidPatch(format!("`{email}` is not a valid email")));
            }
        }
        Ok(())
    }

    /// Later values win field by field.
    fn merge(&mut self, newer: Self) {
        if newer.first_name.is_some() {
            self.first_name = newer.first_name;
        }
        if newer.last_name.is_some() {
            self.last_name = newer.last_name;
        }
        if newer.email.is_some() {
            self.email = newer.email;
        }
        if newer.phone.is_some() {
            self.phone = newer.phone;
        }
        if newer.age.is_some() {
            self.age = newer.age;
        }
    }

    fn apply_to(&self, record: &EmployeeRecord) -> EmployeeRecord {
        let mut merged = record.clone();
        if let Some(first_name) = &self.first_name {
            merged.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &self.last_name {
            merged.last_name.clone_from(last_name);
        }
        if let Some(email) = &self.email {
            merged.email.clone_from(email);
        }
        if let Some(phone) = &self.phone {
            merged.phone.clone_from(phone);
        }
        if let Some(age) = self.age {
            merged.age = age;
        }
        merged
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case", tag = "state", content = "fields")]
pub enum OverlayState {
    Unchanged,
    Patched(EmployeePatch),
    Deleted,
}

/// A server-sourced record plus the local mutations applied to it in this session.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct OverlayRecord {
    base: EmployeeRecord,
    state: OverlayState,
}

impl OverlayRecord {
    #[must_use]
    pub fn base(&self) -> &EmployeeRecord {
        &self.base
    }

    #[must_use]
    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state == OverlayState::Deleted
    }

    /// The record as the user currently sees it; `None` once deleted.
    #[must_use]
    pub fn materialize(&self) -> Option<EmployeeRecord> {
        match &self.state {
            OverlayState::Unchanged => Some(self.base.clone()),
            OverlayState::Patched(patch) => Some(patch.apply_to(&self.base)),
            OverlayState::Deleted => None,
        }
    }
}

/// Session-scoped edit/delete layer for one detail view.
///
/// Nothing here is written back to the record source; dropping the store discards
/// every edit.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct OverlayStore {
    current: OverlayRecord,
}

impl OverlayStore {
    #[must_use]
    pub fn open(record: EmployeeRecord) -> Self {
        Self { current: OverlayRecord { base: record, state: OverlayState::Unchanged } }
    }

    #[must_use]
    pub fn current(&self) -> &OverlayRecord {
        &self.current
    }

    /// # Errors
    /// [`DirectoryError::InvalidPatch`] if the patch fails validation or the record was
    /// already deleted; the overlay is unchanged in both cases.
    pub fn patch(&mut self, fields: EmployeePatch) -> Result<&OverlayRecord, DirectoryError> {
        fields.validate()?;
        let state = match &self.current.state {
            OverlayState::Deleted => {
                return Err(DirectoryError::InvalidPatch(
                    "employee was deleted in this session".to_string(),
                ));
            }
            OverlayState::Unchanged => OverlayState::Patched(fields),
            OverlayState::Patched(existing) => {
                let mut merged = existing.clone();
                merged.merge(fields);
                OverlayState::Patched(merged)
            }
        };
        self.current.state = state;
        Ok(&self.current)
    }

    /// # Errors
    /// [`DirectoryError::InvalidPatch`] if the record was already deleted.
    pub fn delete(&mut self) -> Result<&OverlayRecord, DirectoryError> {
        if self.current.is_deleted() {
            return Err(DirectoryError::InvalidPatch("employee was already deleted".to_string()));
        }
        self.current.state = OverlayState::Deleted;
        Ok(&self.current)
    }

    #[must_use]
    pub fn materialize(&self) -> Option<EmployeeRecord> {
        self.current.materialize()
    }
}
