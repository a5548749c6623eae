//! Configuration types for StrataDB

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of rows per chunk; 0 means unbounded (a single chunk)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Memory limit in bytes for hash and sort operators of a single query
    #[serde(default = "default_query_memory_limit")]
    pub query_memory_limit: usize,

    /// Wrap stored-table reads in a Validate node so deleted rows are
    /// filtered out
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_chunk_size() -> u32 {
    1024
}

fn default_query_memory_limit() -> usize {
    256 * 1024 * 1024
}

fn default_validate() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            query_memory_limit: default_query_memory_limit(),
            validate: default_validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 1024);
        assert!(config.validate);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = EngineConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.chunk_size, deserialized.chunk_size);
        assert_eq!(config.query_memory_limit, deserialized.query_memory_limit);
        assert_eq!(config.validate, deserialized.validate);
    }

    #[test]
    fn test_config_partial_toml() {
        let config: EngineConfig = toml::from_str("chunk_size = 16").unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.query_memory_limit, default_query_memory_limit());
    }
}
