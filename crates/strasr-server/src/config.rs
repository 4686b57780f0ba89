use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which of the three decoding algorithms the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingMethod {
    Greedy,
    ModifiedBeam,
    FastBeam,
}

impl FromStr for DecodingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(DecodingMethod::Greedy),
            "modified_beam" => Ok(DecodingMethod::ModifiedBeam),
            "fast_beam" => Ok(DecodingMethod::FastBeam),
            other => Err(ConfigError::DecodingUnsupported(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroBatchSize,
    ZeroActiveConnections,
    ZeroActivePaths,
    DecodingUnsupported(String),
    MissingModelPath(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroBatchSize => write!(f, "max_batch_size must be nonzero"),
            ConfigError::ZeroActiveConnections => write!(f, "max_active_connections must be nonzero"),
            ConfigError::ZeroActivePaths => {
                write!(f, "num_active_paths must be nonzero under modified_beam")
            }
            ConfigError::DecodingUnsupported(method) => {
                write!(f, "unrecognized decoding_method: {method}")
            }
            ConfigError::MissingModelPath(which) => write!(f, "missing required config: {which}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Every server-wide knob. Construct with [`ServerConfig::default`]
/// (or a value-filled literal) and always call [`ServerConfig::validate`]
/// before using it to boot a [`crate::server::Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub encoder_model: PathBuf,
    pub tokenizer_model: PathBuf,
    pub nn_pool_size: usize,
    pub max_batch_size: usize,
    pub max_wait_ms: u64,
    pub max_message_size: u32,
    /// Cap on feature frames a connection may buffer unsubmitted; enforced
    /// in `handler::run_connection`.
    pub max_queue_size: usize,
    pub max_active_connections: usize,
    pub decoding_method: DecodingMethod,
    pub num_active_paths: usize,
    pub beam: f32,
    pub max_states: usize,
    pub max_contexts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6006,
            encoder_model: PathBuf::new(),
            tokenizer_model: PathBuf::new(),
            nn_pool_size: 1,
            max_batch_size: 50,
            max_wait_ms: 10,
            max_message_size: 1 << 20,
            max_queue_size: 32,
            max_active_connections: 500,
            decoding_method: DecodingMethod::Greedy,
            num_active_paths: 4,
            beam: 10.0,
            max_states: 32,
            max_contexts: 8,
        }
    }
}

impl ServerConfig {
    /// Rejects nonsensical knob combinations before any socket is opened.
    /// Does not check `encoder_model`/`tokenizer_model` existence; loading
    /// those is the model adapter's job and fails with `ModelLoadFailure`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_active_connections == 0 {
            return Err(ConfigError::ZeroActiveConnections);
        }
        if self.decoding_method == DecodingMethod::ModifiedBeam && self.num_active_paths == 0 {
            return Err(ConfigError::ZeroActivePaths);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = ServerConfig { max_batch_size: 0, ..ServerConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn zero_active_connections_is_rejected() {
        let config = ServerConfig { max_active_connections: 0, ..ServerConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroActiveConnections));
    }

    #[test]
    fn modified_beam_requires_active_paths() {
        let config = ServerConfig {
            decoding_method: DecodingMethod::ModifiedBeam,
            num_active_paths: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroActivePaths));
    }

    #[test]
    fn unrecognized_decoding_method_string_is_rejected() {
        let err = "quantum_beam".parse::<DecodingMethod>().unwrap_err();
        assert_eq!(err, ConfigError::DecodingUnsupported("quantum_beam".to_string()));
    }
}
