//! The set of encodings a buffering handler may negotiate.
//!
//! A [`Registry`] always holds the identity encoding under the empty token. Encodings are
//! registered while the registry is being built and the registry is shared read-only
//! (behind an [`Arc`]) afterwards.

use crate::encoding::{Brotli, Deflate, Encoding, Gzip, Identity, Zstd};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The token clients use to name the identity encoding.
pub const IDENTITY: &str = "identity";

#[derive(Clone)]
pub struct Registry {
    encodings: BTreeMap<String, Arc<dyn Encoding>>,
}

static SHARED: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::with_defaults()));

impl Registry {
    /// A registry containing only identity.
    pub fn new() -> Self {
        let mut registry = Self { encodings: BTreeMap::new() };
        registry.register(Identity);
        registry
    }

    /// A registry with identity, gzip, x-gzip, deflate, br and zstd at their default levels.
    pub fn with_defaults() -> Self {
        let gzip = Gzip::default();
        let mut registry = Self::new();
        registry.register(gzip.x_gzip());
        registry.register(gzip);
        registry.register(Deflate::default());
        registry.register(Brotli::default());
        registry.register(Zstd::default());
        registry
    }

    /// A process-wide registry built with [`Registry::with_defaults`] on first use.
    pub fn shared() -> Arc<Registry> {
        Arc::clone(&SHARED)
    }

    /// Adds `encoding` under its lowercased name, replacing any previous entry.
    pub fn register<E: Encoding + 'static>(&mut self, encoding: E) -> &mut Self {
        self.register_arc(Arc::new(encoding))
    }

    pub fn register_arc(&mut self, encoding: Arc<dyn Encoding>) -> &mut Self {
        let token = encoding.name().to_ascii_lowercase();
        self.encodings.insert(token, encoding);
        self
    }

    /// Looks up an `Accept-Encoding` token, ignoring case. `identity` and the empty token
    /// both resolve to the identity entry.
    pub fn get(&self, token: &str) -> Option<&Arc<dyn Encoding>> {
        if token.is_empty() || token.eq_ignore_ascii_case(IDENTITY) {
            return self.encodings.get("");
        }
        if token.bytes().any(|b| b.is_ascii_uppercase()) {
            self.encodings.get(&token.to_ascii_lowercase())
        } else {
            self.encodings.get(token)
        }
    }

    pub fn identity(&self) -> &Arc<dyn Encoding> {
        self.encodings.get("").unwrap_or_else(|| unreachable!("registry always holds identity"))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Registered tokens in lexicographic order; identity is the empty string.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.encodings.keys().map(String::as_str)
    }

    pub(crate) fn encodings(&self) -> impl Iterator<Item = (&str, &Arc<dyn Encoding>)> {
        self.encodings.iter().map(|(token, encoding)| (token.as_str(), encoding))
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    /// Always false, identity is never removed.
    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.encodings.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_has_identity() {
        let registry = Registry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.identity().name(), "");
        assert!(registry.contains("identity"));
        assert!(registry.contains("IDENTITY"));
        assert!(registry.contains(""));
        assert!(!registry.contains("gzip"));
    }

    #[test]
    fn defaults() {
        let registry = Registry::with_defaults();
        let tokens: Vec<_> = registry.tokens().collect();
        assert_eq!(tokens, vec!["", "br", "deflate", "gzip", "x-gzip", "zstd"]);
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.get("GZip").map(|e| e.name()), Some("gzip"));
        assert_eq!(registry.get("BR").map(|e| e.name()), Some("br"));
    }

    #[test]
    fn register_overwrites() {
        let mut registry = Registry::new();
        registry.register(Gzip::new(1)).register(Gzip::new(9));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn shared_is_a_single_instance() {
        assert!(Arc::ptr_eq(&Registry::shared(), &Registry::shared()));
    }
}
