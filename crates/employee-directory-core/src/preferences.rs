use serde::{Deserialize, Serialize};

pub const GUEST_NAME: &str = "Guest";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Process-wide UI preferences. Passed explicitly to whatever needs them.
///
/// Login is cosmetic: it only changes the displayed name.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Preferences {
    pub theme: Theme,
    pub is_logged_in: bool,
    pub user_name: String,
    pub selected_department: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            is_logged_in: false,
            user_name: GUEST_NAME.to_string(),
            selected_department: None,
        }
    }
}

impl Preferences {
    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn login(&mut self, name: &str) {
        self.is_logged_in = true;
        self.user_name = name.to_string();
    }

    pub fn logout(&mut self) {
        self.is_logged_in = false;
        self.user_name = GUEST_NAME.to_string();
    }

    pub fn select_department(&mut self, department: Option<String>) {
        self.selected_department = department.filter(|department| !department.is_empty());
    }
}
