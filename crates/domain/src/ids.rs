use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rolegate_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value)
                    .map(Self)
                    .map_err(|error| AppError::Validation(format!("invalid {}: {error}", $label)))
            }
        }
    };
}

uuid_identifier!(
    /// Surrogate identifier of a role.
    ///
    /// Ordering follows the lowercase hyphenated string form, which makes it usable as the
    /// final lexicographic tie-break between roles.
    RoleId,
    "role_id"
);
uuid_identifier!(
    /// Surrogate identifier of a permission.
    PermissionId,
    "permission_id"
);
uuid_identifier!(
    /// Surrogate identifier of a user role assignment.
    AssignmentId,
    "assignment_id"
);
uuid_identifier!(
    /// Surrogate identifier of a conflict policy.
    PolicyId,
    "policy_id"
);
uuid_identifier!(
    /// Surrogate identifier of an audit history row.
    AuditEntryId,
    "audit_entry_id"
);
