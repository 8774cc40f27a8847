//! Domain model structs persisted by every store backend.
//!
//! Every struct derives `Serialize` so it can be returned directly from the
//! HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered platform user. Keyed by the platform's own identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// External platform identity (decimal string).
    pub user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// When the user was first seen.
    pub created_at: DateTime<Utc>,
}

/// Attributes needed to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl NewUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            first_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Close person
// ---------------------------------------------------------------------------

/// A contact owned by a user, used later for gift recommendations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClosePerson {
    /// Store-generated identifier.
    pub id: i64,
    /// The user who owns this entry.
    pub owner_id: String,
    /// Set when the close person is a registered user themselves.
    pub person_id: Option<String>,
    pub name: String,
    pub gender: Option<String>,
    /// Free-form, as typed by the owner.
    pub birthdate: Option<String>,
    pub interests: Option<String>,
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
}

fn empty_text() -> Option<String> {
    Some(String::new())
}

/// Fields of a close person to be created.
///
/// Optional text fields left out of a request are stored as empty strings;
/// an explicit `null` is stored as NULL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewClosePerson {
    pub name: String,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default = "empty_text")]
    pub gender: Option<String>,
    #[serde(default = "empty_text")]
    pub birthdate: Option<String>,
    #[serde(default = "empty_text")]
    pub interests: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}

impl NewClosePerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            person_id: None,
            gender: empty_text(),
            birthdate: empty_text(),
            interests: empty_text(),
            age: None,
        }
    }

    pub fn linked_to(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }
}

/// Partial update of a close person. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClosePersonUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}

impl ClosePersonUpdate {
    /// `true` when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.gender.is_none()
            && self.birthdate.is_none()
            && self.interests.is_none()
            && self.age.is_none()
    }

    /// Text columns present in this update, in a stable order.
    pub(crate) fn text_columns(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", self.name.as_deref()),
            ("gender", self.gender.as_deref()),
            ("birthdate", self.birthdate.as_deref()),
            ("interests", self.interests.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Invitation
// ---------------------------------------------------------------------------

/// A directed record that `inviter_id` brought `invited_id` in through a
/// shared link. At most one exists per ordered pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitation {
    pub id: i64,
    pub inviter_id: String,
    pub invited_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input of the compound accept-invitation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationAcceptance {
    pub inviter_id: String,
    pub invited: NewUser,
    /// Name under which the invited user appears in the inviter's list.
    pub contact_name: String,
}

/// What an invitation acceptance changed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// `false` when the pair had already been recorded.
    pub invitation_created: bool,
    /// The inviter's new close-person entry, if one was created.
    pub close_person_id: Option<i64>,
}
