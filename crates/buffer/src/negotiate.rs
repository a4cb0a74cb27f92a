//! `Accept-Encoding` negotiation against a [`Registry`].
//!
//! The header is a comma separated list of codings with optional weights
//! (`gzip;q=0.8, br, *;q=0.1`). Candidates are tried by descending weight, ties in header
//! order, and the first one present in the registry wins. A weight of zero rejects a coding.
//!
//! Identity is only selected when the client allows it: an absent or blank header (bare
//! commas count as blank), an `identity` entry, or a `*` entry while identity is not
//! rejected. A `*` match is reported as [`Match::Wildcard`] so callers can tell it apart
//! from a concrete match.
//!
//! When `*` is listed but identity is rejected, the first registered non-identity encoding
//! (by token order) that the header does not mention is chosen instead.

use crate::encoding::Encoding;
use crate::error::BufferError;
use crate::registry::{IDENTITY, Registry};
use http::HeaderMap;
use http::header::ACCEPT_ENCODING;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const WILDCARD: &str = "*";
const MAX_QUALITY: u16 = 1000;

/// How the selected encoding was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The client named the coding (or sent no preference at all).
    Concrete,
    /// The coding was picked through a `*` entry.
    Wildcard,
}

/// The outcome of a successful negotiation.
#[derive(Clone)]
pub struct Negotiated {
    encoding: Arc<dyn Encoding>,
    matched: Match,
}

impl Negotiated {
    pub fn encoding(&self) -> &Arc<dyn Encoding> {
        &self.encoding
    }

    pub fn into_encoding(self) -> Arc<dyn Encoding> {
        self.encoding
    }

    pub fn matched(&self) -> Match {
        self.matched
    }

    pub fn is_wildcard(&self) -> bool {
        self.matched == Match::Wildcard
    }

    /// Wire name of the selected encoding, empty for identity.
    pub fn name(&self) -> &str {
        self.encoding.name()
    }
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated").field("encoding", &self.encoding.name()).field("matched", &self.matched).finish()
    }
}

/// One `coding;q=...` element of an `Accept-Encoding` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preference<'a> {
    pub token: &'a str,
    /// Weight in thousandths, 0..=1000.
    pub quality: u16,
}

impl Preference<'_> {
    fn is_rejection(&self) -> bool {
        self.quality == 0
    }

    fn is_wildcard(&self) -> bool {
        self.token == WILDCARD
    }

    fn names(&self, token: &str) -> bool {
        self.token.eq_ignore_ascii_case(token)
    }
}

/// Parses an `Accept-Encoding` value into its elements, in header order.
///
/// Empty list elements and elements with a malformed weight are skipped.
pub fn parse_accept_encoding(value: &str) -> Vec<Preference<'_>> {
    value
        .split(',')
        .filter_map(|element| {
            let mut parts = element.split(';');
            let token = parts.next()?.trim();
            if token.is_empty() {
                return None;
            }

            let mut quality = MAX_QUALITY;
            for param in parts {
                let Some((name, value)) = param.split_once('=') else {
                    continue;
                };
                if name.trim().eq_ignore_ascii_case("q") {
                    match parse_quality(value.trim()) {
                        Some(q) => quality = q,
                        None => {
                            debug!(element, "ignoring accept-encoding element with invalid weight");
                            return None;
                        }
                    }
                }
            }

            Some(Preference { token, quality })
        })
        .collect()
}

/// `qvalue = ( "0" [ "." 0*3DIGIT ] ) / ( "1" [ "." 0*3("0") ] )`
fn parse_quality(value: &str) -> Option<u16> {
    let (int, frac) = match value.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (value, ""),
    };
    if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut thousandths: u16 = 0;
    for (i, digit) in frac.bytes().enumerate() {
        let scale = [100, 10, 1][i];
        thousandths += u16::from(digit - b'0') * scale;
    }

    match int {
        "0" => Some(thousandths),
        "1" if thousandths == 0 => Some(MAX_QUALITY),
        _ => None,
    }
}

impl Registry {
    /// Selects an encoding for a request carrying `headers`.
    pub fn negotiate(&self, headers: &HeaderMap) -> Result<Negotiated, BufferError> {
        let mut accept = String::new();
        for value in headers.get_all(ACCEPT_ENCODING) {
            match value.to_str() {
                Ok(value) => {
                    if !accept.is_empty() {
                        accept.push(',');
                    }
                    accept.push_str(value);
                }
                Err(_) => debug!(?value, "ignoring non-ascii accept-encoding header"),
            }
        }
        self.negotiate_str(&accept)
    }

    /// Selects an encoding for a raw `Accept-Encoding` value.
    pub fn negotiate_str(&self, accept_encoding: &str) -> Result<Negotiated, BufferError> {
        let mut preferences = parse_accept_encoding(accept_encoding);
        // a list of nothing but separators declares no preference at all
        if preferences.is_empty() && accept_encoding.split(',').all(|e| e.trim().is_empty()) {
            return Ok(Negotiated { encoding: Arc::clone(self.identity()), matched: Match::Concrete });
        }

        let identity_rejected = is_identity_rejected(&preferences);
        let listed = preferences.clone();

        preferences.retain(|p| !p.is_rejection());
        // stable, so equal weights keep header order
        preferences.sort_by(|a, b| b.quality.cmp(&a.quality));

        for preference in &preferences {
            if preference.is_wildcard() {
                if let Some(encoding) = self.wildcard(identity_rejected, &listed) {
                    debug!(encoding = encoding.name(), "negotiated encoding through wildcard");
                    return Ok(Negotiated { encoding: Arc::clone(encoding), matched: Match::Wildcard });
                }
                continue;
            }

            if let Some(encoding) = self.get(preference.token) {
                debug!(encoding = encoding.name(), "negotiated encoding");
                return Ok(Negotiated { encoding: Arc::clone(encoding), matched: Match::Concrete });
            }
        }

        warn!(accept_encoding, "no acceptable encoding");
        Err(BufferError::not_acceptable(accept_encoding))
    }

    fn wildcard(&self, identity_rejected: bool, listed: &[Preference<'_>]) -> Option<&Arc<dyn Encoding>> {
        if !identity_rejected {
            return Some(self.identity());
        }
        self.encodings()
            .filter(|(token, _)| !token.is_empty())
            .find(|(token, _)| !listed.iter().any(|p| p.names(token)))
            .map(|(_, encoding)| encoding)
    }
}

fn is_identity_rejected(preferences: &[Preference<'_>]) -> bool {
    let mut identity = None;
    let mut wildcard = None;
    for p in preferences {
        if p.names(IDENTITY) {
            identity = Some(p.quality);
        } else if p.is_wildcard() {
            wildcard = Some(p.quality);
        }
    }
    match (identity, wildcard) {
        (Some(q), _) => q == 0,
        (None, Some(q)) => q == 0,
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Gzip;
    use http::HeaderValue;

    fn name(registry: &Registry, accept: &str) -> Option<String> {
        registry.negotiate_str(accept).ok().map(|n| n.name().to_string())
    }

    #[test]
    fn parses_weights() {
        let prefs = parse_accept_encoding("gzip;q=0.8, br , deflate; q=1.0 ,, *;q=0");
        assert_eq!(
            prefs,
            vec![
                Preference { token: "gzip", quality: 800 },
                Preference { token: "br", quality: 1000 },
                Preference { token: "deflate", quality: 1000 },
                Preference { token: "*", quality: 0 },
            ]
        );
    }

    #[test]
    fn malformed_weights_are_skipped() {
        let prefs = parse_accept_encoding("gzip;q=2, br;q=0.1234, zstd;q=abc, deflate;q=0.5");
        assert_eq!(prefs, vec![Preference { token: "deflate", quality: 500 }]);
    }

    #[test]
    fn quality_grammar() {
        assert_eq!(parse_quality("0"), Some(0));
        assert_eq!(parse_quality("0."), Some(0));
        assert_eq!(parse_quality("0.5"), Some(500));
        assert_eq!(parse_quality("0.05"), Some(50));
        assert_eq!(parse_quality("0.001"), Some(1));
        assert_eq!(parse_quality("1"), Some(1000));
        assert_eq!(parse_quality("1.000"), Some(1000));
        assert_eq!(parse_quality("1.5"), None);
        assert_eq!(parse_quality(""), None);
    }

    #[test]
    fn empty_header_is_identity() {
        let registry = Registry::with_defaults();
        for accept in ["", "   ", ",", " , ,"] {
            let negotiated = registry.negotiate_str(accept).unwrap();
            assert_eq!(negotiated.name(), "");
            assert_eq!(negotiated.matched(), Match::Concrete);
        }
        let negotiated = registry.negotiate(&HeaderMap::new()).unwrap();
        assert_eq!(negotiated.name(), "");
    }

    #[test]
    fn first_registered_token_wins() {
        let registry = Registry::with_defaults();
        assert_eq!(name(&registry, "unknown, br, gzip").as_deref(), Some("br"));
        assert_eq!(name(&registry, "gzip;q=0.5, br;q=0.9").as_deref(), Some("br"));
        assert_eq!(name(&registry, "gzip, br").as_deref(), Some("gzip"));
        assert_eq!(name(&registry, "GZIP").as_deref(), Some("gzip"));
        assert_eq!(name(&registry, "x-gzip").as_deref(), Some("x-gzip"));
        assert_eq!(name(&registry, "identity").as_deref(), Some(""));
    }

    #[test]
    fn rejected_tokens_are_skipped() {
        let registry = Registry::with_defaults();
        assert_eq!(name(&registry, "gzip;q=0, deflate").as_deref(), Some("deflate"));
    }

    #[test]
    fn unregistered_only_is_not_acceptable() {
        let registry = Registry::new();
        let err = registry.negotiate_str("gzip").unwrap_err();
        assert!(err.is_not_acceptable());
    }

    #[test]
    fn wildcard_falls_back_to_identity() {
        let registry = Registry::with_defaults();
        let negotiated = registry.negotiate_str("unknown, *;q=0.1").unwrap();
        assert_eq!(negotiated.name(), "");
        assert!(negotiated.is_wildcard());
    }

    #[test]
    fn concrete_match_beats_lower_weighted_wildcard() {
        let registry = Registry::with_defaults();
        let negotiated = registry.negotiate_str("*;q=0.1, gzip").unwrap();
        assert_eq!(negotiated.name(), "gzip");
        assert_eq!(negotiated.matched(), Match::Concrete);
    }

    #[test]
    fn wildcard_with_identity_rejected() {
        let registry = Registry::with_defaults();
        let negotiated = registry.negotiate_str("*, identity;q=0").unwrap();
        assert_eq!(negotiated.name(), "br");
        assert!(negotiated.is_wildcard());

        let negotiated = registry.negotiate_str("*, identity;q=0, br;q=0").unwrap();
        assert_eq!(negotiated.name(), "deflate");

        let identity_only = Registry::new();
        assert!(identity_only.negotiate_str("*, identity;q=0").unwrap_err().is_not_acceptable());
    }

    #[test]
    fn identity_rejection() {
        let registry = Registry::new();
        assert!(registry.negotiate_str("identity;q=0").is_err());
        assert!(registry.negotiate_str("*;q=0").is_err());
        assert_eq!(name(&registry, "*;q=0, identity").as_deref(), Some(""));
    }

    #[test]
    fn joins_multiple_header_lines() {
        let mut registry = Registry::new();
        registry.register(Gzip::default());

        let mut headers = HeaderMap::new();
        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("unknown"));
        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        assert_eq!(registry.negotiate(&headers).unwrap().name(), "gzip");
    }

    #[test]
    fn deterministic() {
        let registry = Registry::with_defaults();
        let accept = "deflate;q=0.5, gzip;q=0.5, br;q=0.5, *";
        let first = name(&registry, accept);
        for _ in 0..16 {
            assert_eq!(name(&registry, accept), first);
        }
    }
}
