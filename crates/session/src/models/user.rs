//! User profile types.

use serde::{Deserialize, Serialize};

use pharmadesk_core::{Email, PharmacyId, UserId, UserRole};

/// Profile of the signed-in user.
///
/// Owned by the session manager; consumers receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Backend user ID.
    #[serde(alias = "userId", alias = "customerId")]
    pub id: UserId,
    /// Login email.
    pub email: Email,
    /// Full display name, when the backend sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Account kind. Sign-in responses that omit it are customer sessions.
    #[serde(default = "default_user_type", alias = "role")]
    pub user_type: UserRole,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    /// Pharmacy the staff member belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacy_id: Option<PharmacyId>,
    /// Name of that pharmacy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacy_name: Option<String>,
    /// Staff permission codes (e.g. `FULL_ACCESS`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

const fn default_user_type() -> UserRole {
    UserRole::Customer
}

impl UserProfile {
    /// Best available human-readable name.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().map(str::trim)
            && !full.is_empty()
        {
            return full.to_string();
        }

        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Whether the staff member holds full pharmacy access.
    #[must_use]
    pub fn has_full_access(&self) -> bool {
        self.user_type.is_pharmacy_staff() && self.permissions.iter().any(|p| p == "FULL_ACCESS")
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(full_name) = patch.full_name {
            self.full_name = Some(full_name);
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(url) = patch.profile_picture_url {
            self.profile_picture_url = Some(url);
        }
    }
}

/// Fields a consumer may change on the cached profile.
///
/// Identity fields (`id`, `email`, `user_type`) cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
}
