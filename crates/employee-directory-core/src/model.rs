use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct EmployeeId(pub u64);

impl Display for EmployeeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Address {
    pub address: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Company {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// One user record as delivered by the source. Never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
    pub image: String,
    pub address: Address,
    pub company: Company,
}

impl EmployeeRecord {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    #[must_use]
    pub fn department(&self) -> Option<&str> {
        self.company.department.as_deref().filter(|department| !department.is_empty())
    }
}

/// Body of the users collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UsersPage {
    pub users: Vec<EmployeeRecord>,
    pub total: usize,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: usize,
}

/// Product category borrowed as a department name.
///
/// Older upstream versions return bare strings; both shapes decode to the same value.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(from = "CategoryWire")]
pub struct Category {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Category {
    #[must_use]
    pub fn named(slug: &str, name: &str) -> Self {
        Self { slug: slug.to_string(), name: name.to_string(), url: None }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryWire {
    Bare(String),
    Full {
        slug: String,
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
}

impl From<CategoryWire> for Category {
    fn from(wire: CategoryWire) -> Self {
        match wire {
            CategoryWire::Bare(value) => Self { slug: value.clone(), name: value, url: None },
            CategoryWire::Full { slug, name, url } => Self { slug, name, url },
        }
    }
}
