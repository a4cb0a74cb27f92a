use crate::encoding::{Brotli, Deflate, Gzip, Zstd};
use crate::pool::DEFAULT_MAX_IDLE;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};

/// Starting capacity of a pooled body buffer, 128 KiB.
pub const DEFAULT_INITIAL_CAPACITY: usize = 128 << 10;

/// Settings for a [`BufferHandler`](crate::BufferHandler) and the encodings it registers.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// # use micro_buffer::BufferConfig;
/// let config: BufferConfig = serde_json::from_str(r#"{ "gzip_level": 6 }"#).unwrap();
/// assert_eq!(config.gzip_level, 6);
/// assert_eq!(config.deflate_level, 9);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Capacity reserved in each body buffer before a request starts.
    pub initial_capacity: usize,
    /// Upper bound on idle objects kept per pool.
    pub max_idle: usize,
    pub gzip_level: u32,
    pub deflate_level: u32,
    pub brotli_quality: u32,
    pub zstd_level: i32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_idle: DEFAULT_MAX_IDLE,
            gzip_level: 9,
            deflate_level: 9,
            brotli_quality: 4,
            zstd_level: 3,
        }
    }
}

impl BufferConfig {
    /// Builds a registry with identity, gzip, x-gzip, deflate, br and zstd at the configured levels.
    pub fn registry(&self) -> Registry {
        let gzip = Gzip::new(self.gzip_level);
        let mut registry = Registry::new();
        registry
            .register(gzip.x_gzip())
            .register(gzip)
            .register(Deflate::new(self.deflate_level))
            .register(Brotli::new(self.brotli_quality))
            .register(Zstd::new(self.zstd_level));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config: BufferConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BufferConfig::default());
        assert_eq!(config.initial_capacity, 128 * 1024);
    }

    #[test]
    fn round_trips_through_json() {
        let config = BufferConfig { initial_capacity: 4096, zstd_level: 19, ..BufferConfig::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<BufferConfig>(&json).unwrap(), config);
    }

    #[test]
    fn registry_has_all_encodings() {
        let registry = BufferConfig::default().registry();
        let tokens: Vec<_> = registry.tokens().collect();
        assert_eq!(tokens, vec!["", "br", "deflate", "gzip", "x-gzip", "zstd"]);
    }
}
