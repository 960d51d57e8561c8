//! Identity derivation.
//!
//! Every record is addressed by a canonical UUID. The mapping from a
//! caller-supplied identifier to that UUID is total: no identifier yields a
//! fresh random id, an identifier that already is a UUID is adopted as-is,
//! and any other string hashes deterministically to the same UUID on every
//! run.

use uuid::Uuid;

/// Length of the canonical 36-char hyphenated UUID text form.
pub const UUID_LEN: usize = 36;

///
/// UuidVersion
///
/// How a UUID was obtained from the caller's identifier.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UuidVersion {
    /// The identifier was already a valid UUID and was adopted verbatim
    /// (normalised to lower case).
    Copied,
    /// No identifier was given; a random version 4 UUID was generated.
    Random,
    /// The identifier was hashed to a version 5 UUID in the DNS namespace.
    Hashed,
}

impl UuidVersion {
    /// The version number reported to callers: 0 for adopted ids,
    /// otherwise the RFC 4122 version of the generated UUID.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Copied => 0,
            Self::Random => 4,
            Self::Hashed => 5,
        }
    }
}

/// Derive a UUID from an optional identifier.
///
/// - `None` or empty: random version 4.
/// - A canonical 36-char UUID string: adopted, reported as [`UuidVersion::Copied`].
/// - Anything else: version 5 SHA-1 over the identifier in the DNS namespace.
///
/// The canonical text form of the returned UUID is always lower case.
#[must_use]
pub fn derive_uuid(id: Option<&str>) -> (Uuid, UuidVersion) {
    match id {
        None | Some("") => (Uuid::new_v4(), UuidVersion::Random),
        Some(s) => match parse_canonical(s) {
            Some(uuid) => (uuid, UuidVersion::Copied),
            None => (
                Uuid::new_v5(&Uuid::NAMESPACE_DNS, s.as_bytes()),
                UuidVersion::Hashed,
            ),
        },
    }
}

/// Parse only the canonical hyphenated form; shorter or decorated spellings
/// are treated as names to hash, not as UUIDs.
fn parse_canonical(s: &str) -> Option<Uuid> {
    if s.len() != UUID_LEN {
        return None;
    }
    Uuid::try_parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_yields_random_v4() {
        let (uuid, version) = derive_uuid(None);
        assert_eq!(version, UuidVersion::Random);
        assert_eq!(uuid.get_version_num(), 4);

        let (_, version) = derive_uuid(Some(""));
        assert_eq!(version, UuidVersion::Random);
    }

    #[test]
    fn names_hash_deterministically() {
        let (a, version) = derive_uuid(Some("http://x.org/0.1/Foo"));
        let (b, _) = derive_uuid(Some("http://x.org/0.1/Foo"));
        assert_eq!(version, UuidVersion::Hashed);
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 5);
    }

    #[test]
    fn valid_uuids_are_adopted_lowercase() {
        let (uuid, version) = derive_uuid(Some("550E8400-E29B-41D4-A716-446655440000"));
        assert_eq!(version, UuidVersion::Copied);
        assert_eq!(uuid.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn undashed_hex_is_a_name_not_a_uuid() {
        let (_, version) = derive_uuid(Some("550e8400e29b41d4a716446655440000"));
        assert_eq!(version, UuidVersion::Hashed);
    }

    proptest! {
        /// UUIDs are fixed points of derivation.
        #[test]
        fn derivation_fixpoint(id in ".{0,40}") {
            let input = if id.is_empty() { None } else { Some(id.as_str()) };
            let (uuid, _) = derive_uuid(input);
            let (again, version) = derive_uuid(Some(uuid.to_string().as_str()));
            prop_assert_eq!(version, UuidVersion::Copied);
            prop_assert_eq!(uuid, again);
        }

        /// Hashing is deterministic for every non-uuid input.
        #[test]
        fn hashing_is_stable(name in "[a-z/:.]{1,40}") {
            prop_assume!(name.len() != UUID_LEN);
            let (a, _) = derive_uuid(Some(&name));
            let (b, _) = derive_uuid(Some(&name));
            prop_assert_eq!(a, b);
        }
    }
}
