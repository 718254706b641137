//! URI normalization and the crawl graph data types
//!
//! Every URI entering the crawler goes through [`normalize_uri`], which makes
//! the normalized string form usable as a deduplication key:
//!
//! - an empty scheme becomes `http`
//! - an empty path becomes `/`
//! - the fragment is always stripped

mod base;
mod crawl_uri;

pub use base::BaseUriCollection;
pub use crawl_uri::CrawlUri;

use url::Url;

use crate::utils::error::UriError;

/// Normalize an already parsed URI
///
/// `Url` cannot represent a missing scheme, so scheme defaulting happens in
/// [`parse_uri`]. Normalization is idempotent.
pub fn normalize_uri(mut uri: Url) -> Url {
    if uri.path().is_empty() && !uri.cannot_be_a_base() {
        uri.set_path("/");
    }

    uri.set_fragment(None);
    uri
}

/// Parse and normalize a URI string
///
/// Scheme-relative (`//host/path`) and scheme-less (`host/path`) inputs are
/// treated as `http`.
pub fn parse_uri(input: &str) -> Result<Url, UriError> {
    let input = input.trim();

    let parsed = if let Some(rest) = input.strip_prefix("//") {
        Url::parse(&format!("http://{rest}"))
    } else {
        match Url::parse(input) {
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{input}")),
            other => other,
        }
    };

    parsed.map(normalize_uri).map_err(|e| UriError::Invalid {
        uri: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a URI that must use the `http` or `https` scheme
pub fn http_uri(input: &str) -> Result<Url, UriError> {
    let lower = input.trim_start().to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(UriError::NotHttp(input.to_string()));
    }

    parse_uri(input)
}

/// Whether the URI uses a scheme the crawler can request
pub fn is_http(uri: &Url) -> bool {
    matches!(uri.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_path_becomes_slash() {
        let uri = parse_uri("https://www.terminal42.ch").unwrap();
        assert_eq!(uri.as_str(), "https://www.terminal42.ch/");
    }

    #[test]
    fn test_fragment_is_stripped() {
        let uri = parse_uri("https://a.test/page?x=1#section").unwrap();
        assert_eq!(uri.as_str(), "https://a.test/page?x=1");
    }

    #[test]
    fn test_missing_scheme_defaults_to_http() {
        assert_eq!(parse_uri("//a.test/b").unwrap().as_str(), "http://a.test/b");
        assert_eq!(parse_uri("a.test/b").unwrap().as_str(), "http://a.test/b");
    }

    #[test]
    fn test_non_base_uri_is_left_alone() {
        let uri = parse_uri("mailto:info@a.test").unwrap();
        assert_eq!(uri.as_str(), "mailto:info@a.test");
        assert!(!is_http(&uri));
    }

    #[test]
    fn test_http_uri_rejects_other_schemes() {
        assert!(http_uri("HTTPS://a.test/").is_ok());
        assert!(matches!(
            http_uri("ftp://a.test/"),
            Err(UriError::NotHttp(_))
        ));
        assert!(matches!(http_uri("a.test"), Err(UriError::NotHttp(_))));
    }

    #[test]
    fn test_invalid_uri() {
        assert!(matches!(
            parse_uri("http://"),
            Err(UriError::Invalid { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_normalization_is_idempotent(
            scheme in prop::sample::select(vec!["", "http://", "https://", "//"]),
            host in "[a-z]{1,10}\\.(test|ch|com)",
            path in "(/[a-zA-Z0-9_-]{0,8}){0,3}",
            query in prop::option::of("[a-z]{1,5}=[a-z0-9]{0,5}"),
            fragment in prop::option::of("[a-z]{0,6}"),
        ) {
            let mut raw = format!("{scheme}{host}{path}");
            if let Some(query) = query {
                raw.push('?');
                raw.push_str(&query);
            }
            if let Some(fragment) = fragment {
                raw.push('#');
                raw.push_str(&fragment);
            }

            let once = parse_uri(&raw).unwrap();
            let twice = parse_uri(once.as_str()).unwrap();
            prop_assert_eq!(once.as_str(), twice.as_str());
            let normalized = normalize_uri(once.clone());
            prop_assert_eq!(normalized.as_str(), once.as_str());
            prop_assert!(once.fragment().is_none());
            prop_assert!(!once.path().is_empty());
            prop_assert!(is_http(&once));
        }
    }
}
