//! Parsing of `secret` field tags.
//!
//! Tag format: `[scheme://]key[#fragment][,option...]` with options
//! `optional` and `version=X`.

use crate::error::TagError;

/// Components extracted from a `secret` field tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedTag {
    /// URI scheme (e.g. `awssm`), `None` for bare keys.
    pub scheme: Option<String>,
    /// Secret key or path.
    pub key: String,
    /// JSON field to extract, from `#fragment`.
    pub fragment: Option<String>,
    /// Whether `,optional` is set.
    pub optional: bool,
    /// Version identifier from `,version=X`.
    pub version: Option<String>,
}

impl ParsedTag {
    /// The canonical URI used to deduplicate fetches.
    ///
    /// `scheme://key` for scheme-based tags, the bare key otherwise. The
    /// fragment is never part of the canonical URI, so two fields that
    /// address different fragments of the same secret share one fetch.
    pub fn uri(&self) -> String {
        match &self.scheme {
            Some(scheme) => format!("{scheme}://{}", self.key),
            None => self.key.clone(),
        }
    }
}

/// Parses a `secret` tag value.
///
/// If `version=` appears more than once the last occurrence wins, matching
/// the silent-overwrite behavior of comma-option lists elsewhere.
pub(crate) fn parse_tag(raw: &str) -> Result<ParsedTag, TagError> {
    if raw.is_empty() {
        return Err(TagError::Empty);
    }

    let mut parts = raw.split(',');
    let mut uri = parts.next().unwrap_or_default();

    let mut optional = false;
    let mut version = None;
    for opt in parts {
        if opt == "optional" {
            optional = true;
        } else if let Some(v) = opt.strip_prefix("version=") {
            version = Some(v.to_string());
        } else {
            return Err(TagError::UnknownOption(opt.to_string()));
        }
    }

    // The fragment is everything after the last '#'.
    let mut fragment = None;
    if let Some(idx) = uri.rfind('#') {
        let frag = &uri[idx + 1..];
        if !frag.is_empty() {
            fragment = Some(frag.to_string());
        }
        uri = &uri[..idx];
    }

    let (scheme, key) = match uri.split_once("://") {
        Some((scheme, rest)) => {
            if !is_valid_scheme(scheme) {
                return Err(TagError::InvalidScheme(scheme.to_string()));
            }
            (Some(scheme.to_string()), rest)
        }
        None => (None, uri),
    };

    if key.is_empty() {
        return Err(TagError::EmptyKey(raw.to_string()));
    }

    Ok(ParsedTag {
        scheme,
        key: key.to_string(),
        fragment,
        optional,
        version,
    })
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key() {
        let tag = parse_tag("db-pass").unwrap();
        assert_eq!(tag.scheme, None);
        assert_eq!(tag.key, "db-pass");
        assert_eq!(tag.fragment, None);
        assert!(!tag.optional);
        assert_eq!(tag.version, None);
    }

    #[test]
    fn uri_with_scheme() {
        let tag = parse_tag("awssm://prod/db").unwrap();
        assert_eq!(tag.scheme.as_deref(), Some("awssm"));
        assert_eq!(tag.key, "prod/db");
    }

    #[test]
    fn fragment() {
        let tag = parse_tag("awssm://prod/db#password").unwrap();
        assert_eq!(tag.key, "prod/db");
        assert_eq!(tag.fragment.as_deref(), Some("password"));
    }

    #[test]
    fn nested_fragment() {
        let tag = parse_tag("shared#db.credentials.password").unwrap();
        assert_eq!(tag.key, "shared");
        assert_eq!(tag.fragment.as_deref(), Some("db.credentials.password"));
    }

    #[test]
    fn file_uri_keeps_leading_slash() {
        let tag = parse_tag("file:///etc/tls/cert.pem").unwrap();
        assert_eq!(tag.scheme.as_deref(), Some("file"));
        assert_eq!(tag.key, "/etc/tls/cert.pem");
    }

    #[test]
    fn optional_flag() {
        let tag = parse_tag("db-pass,optional").unwrap();
        assert!(tag.optional);
    }

    #[test]
    fn version_option() {
        let tag = parse_tag("api-key,version=2").unwrap();
        assert_eq!(tag.version.as_deref(), Some("2"));
    }

    #[test]
    fn all_options() {
        let tag = parse_tag("awssm://prod/db#password,optional,version=2").unwrap();
        assert_eq!(tag.scheme.as_deref(), Some("awssm"));
        assert_eq!(tag.key, "prod/db");
        assert_eq!(tag.fragment.as_deref(), Some("password"));
        assert!(tag.optional);
        assert_eq!(tag.version.as_deref(), Some("2"));
    }

    #[test]
    fn duplicate_version_last_wins() {
        let tag = parse_tag("key,version=1,version=2").unwrap();
        assert_eq!(tag.version.as_deref(), Some("2"));
    }

    #[test]
    fn empty_tag() {
        assert_eq!(parse_tag(""), Err(TagError::Empty));
    }

    #[test]
    fn empty_key() {
        assert!(matches!(parse_tag(",optional"), Err(TagError::EmptyKey(_))));
    }

    #[test]
    fn empty_key_with_scheme() {
        assert!(matches!(parse_tag("awssm://"), Err(TagError::EmptyKey(_))));
    }

    #[test]
    fn unknown_option() {
        assert!(matches!(
            parse_tag("key,bogus"),
            Err(TagError::UnknownOption(_))
        ));
    }

    #[test]
    fn invalid_scheme() {
        assert!(matches!(
            parse_tag("9bad://key"),
            Err(TagError::InvalidScheme(_))
        ));
    }

    #[test]
    fn bare_key_with_fragment() {
        let tag = parse_tag("shared#a").unwrap();
        assert_eq!(tag.key, "shared");
        assert_eq!(tag.fragment.as_deref(), Some("a"));
    }

    #[test]
    fn trailing_empty_fragment_ignored() {
        let tag = parse_tag("shared#").unwrap();
        assert_eq!(tag.key, "shared");
        assert_eq!(tag.fragment, None);
    }

    #[test]
    fn canonical_uri_bare() {
        assert_eq!(parse_tag("db-pass").unwrap().uri(), "db-pass");
    }

    #[test]
    fn canonical_uri_with_scheme() {
        assert_eq!(
            parse_tag("awssm://prod/db#password").unwrap().uri(),
            "awssm://prod/db"
        );
    }

    #[test]
    fn canonical_uri_excludes_fragment_and_options() {
        let a = parse_tag("shared#a,optional").unwrap();
        let b = parse_tag("shared#b").unwrap();
        assert_eq!(a.uri(), b.uri());
    }
}
