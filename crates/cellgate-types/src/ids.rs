//! String-backed identifiers.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// End-user identity.
    UserId
);
string_id!(
    /// Logical shard from the fixed, ordered shard set.
    ShardId
);
string_id!(
    /// Data-residency region (`us`, `eu`, `apac`, ...).
    Region
);
string_id!(
    /// Physical cell inside a region.
    CellId
);
string_id!(
    /// Regulated data object.
    ObjectId
);
string_id!(
    /// Tenant owning a data object.
    TenantId
);
string_id!(
    /// Share grant.
    GrantId
);
