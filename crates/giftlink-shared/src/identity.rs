use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_INVITED_NAME;

/// Identity asserted by the messaging platform for the current user.
///
/// Decoded from the `user` field of the launch data. Unknown fields are
/// ignored so new platform attributes do not break verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl UserClaims {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
        }
    }

    /// The external identity as stored in the `users` table.
    pub fn user_id(&self) -> String {
        self.id.to_string()
    }

    /// Name used when this user is added to someone's close people.
    pub fn contact_name(&self) -> String {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_INVITED_NAME)
            .to_string()
    }

    /// Name used when telling other people about this user.
    pub fn display_name(&self) -> String {
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => username.to_string(),
            None => self.contact_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let claims: UserClaims = serde_json::from_str(
            r#"{"id":42,"first_name":"Ann","is_premium":true,"allows_write_to_pm":true}"#,
        )
        .unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.first_name.as_deref(), Some("Ann"));
        assert_eq!(claims.username, None);
        assert_eq!(claims.user_id(), "42");
    }

    #[test]
    fn test_contact_name_falls_back() {
        let mut claims = UserClaims::new(7);
        assert_eq!(claims.contact_name(), "User");

        claims.first_name = Some("   ".into());
        assert_eq!(claims.contact_name(), "User");

        claims.first_name = Some("Maria".into());
        assert_eq!(claims.contact_name(), "Maria");
    }

    #[test]
    fn test_display_name_prefers_username() {
        let mut claims = UserClaims::new(7);
        claims.first_name = Some("Maria".into());
        assert_eq!(claims.display_name(), "Maria");

        claims.username = Some("maria_k".into());
        assert_eq!(claims.display_name(), "maria_k");
    }
}
