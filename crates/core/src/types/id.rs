//! Numeric identities issued by the auth backend.
//!
//! Each kind of identity gets its own wrapper so a pharmacy id cannot be
//! passed where a user id is expected.

/// Declare an `i64` identity wrapper that serializes as a bare number.
///
/// ```rust
/// # use pharmadesk_core::define_id;
/// define_id!(PrescriptionId);
///
/// let id = PrescriptionId::new(31);
/// assert_eq!(id.as_i64(), 31);
/// assert_eq!(id.to_string(), "31");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The number as the backend sent it.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(UserId);
define_id!(PharmacyId);
