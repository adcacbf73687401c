//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
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

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Key of a service under the manifest's `services` mapping.
    ServiceName
);

string_newtype!(
    /// Local identifier of a catalog artifact, e.g. `postgres:offline` or a
    /// volume capture directory name.
    ArtifactId
);

string_newtype!(
    /// Sanitized `{service}_{destination}` name a volume was captured under.
    CaptureId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_display_and_as_ref() {
        let name = ServiceName::new("api");
        assert_eq!(name.to_string(), "api");
        assert_eq!(name.as_str(), "api");
        assert_eq!(AsRef::<str>::as_ref(&name), "api");
    }

    #[test]
    fn artifact_id_serde_is_transparent() {
        let id = ArtifactId::new("postgres:offline");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"postgres:offline\"");
        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn capture_id_ordering_is_lexicographic() {
        let mut ids = vec![CaptureId::from("web_data"), CaptureId::from("api_data")];
        ids.sort();
        assert_eq!(ids[0], "api_data");
    }
}
