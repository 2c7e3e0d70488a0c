//! Forum member types and the directory payload derived from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DIRECTORY_USER_KIND, DIRECTORY_USER_PHONE};
use crate::impl_label_conversions;

/// Identity provider a member signs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityProvider {
    MagicLink,
    InclusionConnect,
    ProConnect,
}

impl_label_conversions!(IdentityProvider {
    MagicLink => "magic_link",
    InclusionConnect => "inclusion_connect",
    ProConnect => "pro_connect",
});

impl IdentityProvider {
    /// Label the Nexus directory expects in the `auth` field.
    pub const fn directory_label(self) -> &'static str {
        match self {
            Self::MagicLink => "MAGIC_LINK",
            Self::InclusionConnect => "INCLUSION_CONNECT",
            Self::ProConnect => "PRO_CONNECT",
        }
    }
}

/// Persisted forum member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub last_login: Option<DateTime<Utc>>,
    pub identity_provider: IdentityProvider,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Whether the external directory should know about this member.
    ///
    /// Inactive members, staff and members without an email are not
    /// published.
    pub fn is_published(&self) -> bool {
        self.is_active && !self.is_staff && !self.email.trim().is_empty()
    }

    /// True when any directory-tracked field differs between two versions.
    pub fn tracked_fields_differ(&self, other: &Self) -> bool {
        self.id != other.id
            || self.first_name != other.first_name
            || self.last_name != other.last_name
            || self.email != other.email
            || self.last_login != other.last_login
            || self.identity_provider != other.identity_provider
            || self.is_active != other.is_active
            || self.is_staff != other.is_staff
    }
}

/// Member about to be inserted; the id is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub identity_provider: IdentityProvider,
    pub is_active: bool,
    pub is_staff: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: email.into(),
            identity_provider: IdentityProvider::ProConnect,
            is_active: true,
            is_staff: false,
        }
    }

    #[must_use]
    pub fn with_names(
        mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn into_user(self, id: i64, date_joined: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            last_login: None,
            identity_provider: self.identity_provider,
            is_active: self.is_active,
            is_staff: self.is_staff,
            date_joined,
        }
    }
}

/// Column assignments applied by a bulk update.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<Option<DateTime<Utc>>>,
    pub identity_provider: Option<IdentityProvider>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

impl UserChanges {
    pub fn apply(&self, user: &User) -> User {
        let mut updated = user.clone();
        if let Some(username) = &self.username {
            updated.username.clone_from(username);
        }
        if let Some(first_name) = &self.first_name {
            updated.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &self.last_name {
            updated.last_name.clone_from(last_name);
        }
        if let Some(email) = &self.email {
            updated.email.clone_from(email);
        }
        if let Some(last_login) = self.last_login {
            updated.last_login = last_login;
        }
        if let Some(provider) = self.identity_provider {
            updated.identity_provider = provider;
        }
        if let Some(is_active) = self.is_active {
            updated.is_active = is_active;
        }
        if let Some(is_staff) = self.is_staff {
            updated.is_staff = is_staff;
        }
        updated
    }
}

/// Row selection for bulk update/delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserFilter {
    All,
    Ids(Vec<i64>),
    IsActive(bool),
}

/// Upsert payload for the Nexus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub last_login: Option<String>,
    pub auth: String,
}

impl From<&User> for DirectoryUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            kind: DIRECTORY_USER_KIND.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: DIRECTORY_USER_PHONE.to_string(),
            last_login: user.last_login.map(|at| at.to_rfc3339()),
            auth: user.identity_provider.directory_label().to_string(),
        }
    }
}

/// Delete payload entry for the Nexus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUserRef {
    pub id: String,
}

impl From<i64> for DirectoryUserRef {
    fn from(id: i64) -> Self {
        Self { id: id.to_string() }
    }
}
