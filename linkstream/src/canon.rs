use std::fmt;

use thiserror::Error;
use url::{Host, Url};

pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 2000;

/// Canonical, sort-friendly form of a URL. Two URLs refer to the same graph
/// node iff their identifiers are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a URL was dropped rather than canonicalized. Rejects are per-outlink
/// (or per-record for target URIs) and never abort processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Reject {
    #[error("failed to parse url: {0}")]
    Unparseable(String),
    #[error("scheme {0:?} is not http or https")]
    Scheme(String),
    #[error("canonical identifier exceeds {limit} bytes")]
    TooLong { limit: usize },
}

/// The normalized URL together with its identifier. The URL is kept so a
/// record's outlinks can be resolved against its target URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub url: Url,
    pub identifier: Identifier,
}

#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    max_identifier_length: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDENTIFIER_LENGTH)
    }
}

impl Canonicalizer {
    pub fn new(max_identifier_length: usize) -> Self {
        Self {
            max_identifier_length,
        }
    }

    /// WHATWG-normalize `raw` (resolving it against `base` when given) and
    /// serialize it into the sort-friendly identifier form.
    pub fn canonicalize(&self, raw: &str, base: Option<&Url>) -> Result<Canonical, Reject> {
        let url = match base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        }
        .map_err(|e| Reject::Unparseable(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(Reject::Scheme(other.to_string())),
        }

        let identifier = ssurt(&url);
        if identifier.len() > self.max_identifier_length {
            return Err(Reject::TooLong {
                limit: self.max_identifier_length,
            });
        }

        Ok(Canonical {
            url,
            identifier: Identifier(identifier),
        })
    }
}

/// Serialize a normalized URL with the authority reordered ahead of the path
/// so identifiers for one site sort together: host labels reversed and
/// comma-joined, then `//`, the non-default port, the scheme, path and query.
/// `http://www.example.com/a?b` becomes `com,example,www,//http:/a?b`.
fn ssurt(url: &Url) -> String {
    let mut out = String::new();

    match url.host() {
        Some(Host::Domain(host)) => {
            for label in host.rsplit('.') {
                out.push_str(label);
                out.push(',');
            }
        }
        // IP literals are kept verbatim; reversing labels would not help sorting.
        Some(other) => out.push_str(&other.to_string()),
        None => {}
    }

    out.push_str("//");
    if let Some(port) = url.port() {
        out.push_str(&port.to_string());
        out.push(':');
    }
    out.push_str(url.scheme());
    out.push(':');
    out.push_str(url.path());
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Canonicalizer {
        Canonicalizer::default()
    }

    #[test]
    fn normalizes_scheme_host_and_default_port() {
        let a = canon()
            .canonicalize("HTTP://WWW.Example.COM:80/a/../b", None)
            .unwrap();
        let b = canon().canonicalize("http://www.example.com/b", None).unwrap();
        assert_eq!(a.identifier, b.identifier);
        assert_eq!(a.identifier.as_str(), "com,example,www,//http:/b");
    }

    #[test]
    fn identifier_is_stable_across_calls() {
        let first = canon().canonicalize("https://example.com/x?y=1", None).unwrap();
        let second = canon().canonicalize("https://example.com/x?y=1", None).unwrap();
        assert_eq!(first.identifier, second.identifier);
    }

    #[test]
    fn keeps_non_default_port_and_query() {
        let c = canon()
            .canonicalize("http://example.com:8080/p?q=1", None)
            .unwrap();
        assert_eq!(c.identifier.as_str(), "com,example,//8080:http:/p?q=1");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(
            canon().canonicalize("ftp://example.com/file", None),
            Err(Reject::Scheme("ftp".to_string()))
        );
        assert!(matches!(
            canon().canonicalize("mailto:someone@example.com", None),
            Err(Reject::Scheme(_))
        ));
    }

    #[test]
    fn rejects_over_length_identifiers() {
        let canon = Canonicalizer::new(40);
        let long = format!("http://example.com/{}", "x".repeat(100));
        assert_eq!(
            canon.canonicalize(&long, None),
            Err(Reject::TooLong { limit: 40 })
        );
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("http://example.com/dir/page.html").unwrap();
        let c = canon().canonicalize("../other.html", Some(&base)).unwrap();
        assert_eq!(c.identifier.as_str(), "com,example,//http:/other.html");
    }

    #[test]
    fn relative_without_base_is_unparseable() {
        assert!(matches!(
            canon().canonicalize("/just/a/path", None),
            Err(Reject::Unparseable(_))
        ));
    }

    #[test]
    fn ip_hosts_are_not_reversed() {
        let c = canon().canonicalize("http://192.168.0.1/x", None).unwrap();
        assert_eq!(c.identifier.as_str(), "192.168.0.1//http:/x");
    }
}
