// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions shared by every newtype identifier in this crate.

/// Trait for truncating identifiers to a short prefix, used when logging or
/// rendering an id to a human (e.g. in an injected reply line).
pub trait ShortId {
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype identifier wrapped around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self, n: usize) -> &str {
                $crate::id::ShortId::short(self.0.as_str(), n)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

/// Generate a fresh 8-character lowercase-hex session id.
///
/// Local uniqueness only (collisions are a Storage Layer concern via the
/// primary key, not this generator's), matching the short, pane-friendly
/// ids described in the data model.
pub fn new_short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    define_id! {
        /// test id
        pub struct TestId;
    }

    #[test]
    fn short_truncates() {
        let id = TestId::new("abcdefghij");
        assert_eq!(id.short(4), "abcd");
    }

    #[test]
    fn short_id_is_eight_chars() {
        assert_eq!(new_short_id().len(), 8);
    }

    #[test]
    fn display_matches_inner_string() {
        let id = TestId::new("xyz");
        assert_eq!(id.to_string(), "xyz");
        assert_eq!(id, "xyz");
    }
}
