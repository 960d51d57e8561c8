//! Metadata URI tools.
//!
//! Entity URIs have the form `namespace/version/name`. The namespace may
//! itself contain slashes; splitting therefore anchors on the *last* two
//! separators.

use crate::error::{Error, Result};
use std::{fmt, str::FromStr};

///
/// MetaUri
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetaUri {
    pub namespace: String,
    pub version: String,
    pub name: String,
}

impl MetaUri {
    /// Build a URI from its components. Segments must be non-empty, and
    /// `version` and `name` must not contain `/` (the namespace may).
    pub fn new(name: &str, version: &str, namespace: &str) -> Result<Self> {
        if name.is_empty() || version.is_empty() || namespace.is_empty() {
            return Err(Error::InvalidArg(
                "metadata uri segments must be non-empty".to_string(),
            ));
        }
        if name.contains('/') || version.contains('/') {
            return Err(Error::InvalidArg(format!(
                "metadata name '{name}' and version '{version}' must not contain '/'"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            version: version.to_string(),
            name: name.to_string(),
        })
    }

    /// Format `namespace/version/name`.
    #[must_use]
    pub fn join(name: &str, version: &str, namespace: &str) -> String {
        format!("{namespace}/{version}/{name}")
    }

    /// Split a metadata URI on its last two `/` separators.
    pub fn split(uri: &str) -> Result<Self> {
        let fail = || Error::Format(format!("invalid metadata uri: '{uri}'"));

        let last = uri.rfind('/').ok_or_else(fail)?;
        let second = uri[..last].rfind('/').ok_or_else(fail)?;

        let namespace = &uri[..second];
        let version = &uri[second + 1..last];
        let name = &uri[last + 1..];

        if namespace.is_empty() || version.is_empty() || name.is_empty() {
            return Err(fail());
        }

        Ok(Self {
            namespace: namespace.to_string(),
            version: version.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for MetaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.version, self.name)
    }
}

impl FromStr for MetaUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::split(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn join_and_split() {
        let uri = MetaUri::join("Chemistry", "0.1", "http://www.sintef.no/calm");
        assert_eq!(uri, "http://www.sintef.no/calm/0.1/Chemistry");

        let parts = MetaUri::split(&uri).unwrap();
        assert_eq!(parts.name, "Chemistry");
        assert_eq!(parts.version, "0.1");
        assert_eq!(parts.namespace, "http://www.sintef.no/calm");
    }

    #[test]
    fn split_rejects_missing_or_empty_segments() {
        assert!(MetaUri::split("no-separators").is_err());
        assert!(MetaUri::split("only/one").is_err());
        assert!(MetaUri::split("ns//name").is_err());
        assert!(MetaUri::split("ns/0.1/").is_err());
        assert!(MetaUri::split("/0.1/name").is_err());
    }

    #[test]
    fn display_round_trips() {
        let uri: MetaUri = "a/b/0.2/Thing".parse().unwrap();
        assert_eq!(uri.namespace, "a/b");
        assert_eq!(uri.to_string(), "a/b/0.2/Thing");
    }

    proptest! {
        #[test]
        fn split_inverts_join(
            name in "[a-zA-Z0-9._-]{1,12}",
            version in "[a-zA-Z0-9._-]{1,8}",
            namespace in "[a-zA-Z0-9._/-]{1,24}",
        ) {
            prop_assume!(!namespace.starts_with('/') && !namespace.ends_with('/'));
            prop_assume!(!namespace.contains("//"));
            let parts = MetaUri::split(&MetaUri::join(&name, &version, &namespace)).unwrap();
            prop_assert_eq!(parts.name, name);
            prop_assert_eq!(parts.version, version);
            prop_assert_eq!(parts.namespace, namespace);
        }
    }
}
