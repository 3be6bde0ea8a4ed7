use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifiers assigned outside the core (salon registration, auth).
macro_rules! named_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Identifiers minted by the core when it creates a document.
macro_rules! generated_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(value: &str) -> Option<Self> {
                Uuid::parse_str(value).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

named_id!(SalonId);
named_id!(UserId);
named_id!(StylistId);
named_id!(ServiceId);

generated_id!(
    /// Identity of a queue ticket (a QueueItem document).
    CheckInId
);
generated_id!(AppointmentId);
generated_id!(RatingId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_parse_back() {
        let id = CheckInId::generate();
        assert_eq!(CheckInId::parse(&id.to_string()), Some(id));
        assert_eq!(CheckInId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_named_ids_serialize_transparently() {
        let id = SalonId::from("downtown");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"downtown\"");
    }
}
