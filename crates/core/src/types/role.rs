//! User roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not one of the known roles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid user role: {0}")]
pub struct RoleParseError(pub String);

/// The kind of account behind a session.
///
/// The set is closed: every place that branches on a role matches all four
/// variants rather than comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UserRole {
    /// A patient ordering from pharmacies.
    Customer,
    /// The administrator of a registered pharmacy.
    PharmacyAdmin,
    /// Pharmacy staff reviewing prescriptions.
    Pharmacist,
    /// Platform administrator.
    Admin,
}

impl UserRole {
    /// Every role, in display order.
    pub const ALL: [Self; 4] = [
        Self::Customer,
        Self::PharmacyAdmin,
        Self::Pharmacist,
        Self::Admin,
    ];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::PharmacyAdmin => "pharmacy-admin",
            Self::Pharmacist => "pharmacist",
            Self::Admin => "admin",
        }
    }

    /// Whether the role belongs to a pharmacy's staff.
    #[must_use]
    pub const fn is_pharmacy_staff(self) -> bool {
        matches!(self, Self::PharmacyAdmin | Self::Pharmacist)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = RoleParseError;

    /// Accepts the wire names plus the upper/snake-case spellings some
    /// backend endpoints return (`PHARMACY_ADMIN`, `pharmacy_admin`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "customer" => Ok(Self::Customer),
            "pharmacy-admin" | "pharmacy" => Ok(Self::PharmacyAdmin),
            "pharmacist" => Ok(Self::Pharmacist),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = RoleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_accepts_backend_spellings() {
        assert_eq!(
            "PHARMACY_ADMIN".parse::<UserRole>().unwrap(),
            UserRole::PharmacyAdmin
        );
        assert_eq!("Pharmacist".parse::<UserRole>().unwrap(), UserRole::Pharmacist);
        assert_eq!("pharmacy".parse::<UserRole>().unwrap(), UserRole::PharmacyAdmin);
    }

    #[test]
    fn test_rejects_unknown() {
        assert_eq!(
            "driver".parse::<UserRole>(),
            Err(RoleParseError("driver".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&UserRole::PharmacyAdmin).unwrap();
        assert_eq!(json, "\"pharmacy-admin\"");

        let role: UserRole = serde_json::from_str("\"CUSTOMER\"").unwrap();
        assert_eq!(role, UserRole::Customer);
    }

    #[test]
    fn test_pharmacy_staff() {
        assert!(UserRole::Pharmacist.is_pharmacy_staff());
        assert!(UserRole::PharmacyAdmin.is_pharmacy_staff());
        assert!(!UserRole::Customer.is_pharmacy_staff());
        assert!(!UserRole::Admin.is_pharmacy_staff());
    }
}
