use std::path::{Path, PathBuf};
use std::time::Duration;

use chaindefs_crypto::{dev_authorized_keys, AuthorizedKeys, PublicKey};
use chaindefs_types::limits::MAX_ARTIFACT_LEN;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Per-run pipeline configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The signed definitions file.
    pub definitions_path: PathBuf,
    /// Root of the generated artifact tree.
    pub output_dir: PathBuf,
    /// Ordered authorized signer keys, hex encoded. Bit `i` of a signature
    /// mask refers to entry `i`.
    pub authorized_keys: Vec<String>,
    pub max_artifact_len: usize,
    /// Upper bound on one signing session, in seconds.
    pub signing_timeout_secs: u64,
    /// Serialize and assemble artifacts on the rayon pool.
    pub parallel: bool,
    /// Remove an existing, non-empty output directory before generating.
    pub clean_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            definitions_path: PathBuf::from("definitions-latest.json"),
            output_dir: PathBuf::from("definitions-latest"),
            authorized_keys: Vec::new(),
            max_artifact_len: MAX_ARTIFACT_LEN,
            signing_timeout_secs: 300,
            parallel: true,
            clean_output: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn signing_timeout(&self) -> Duration {
        Duration::from_secs(self.signing_timeout_secs)
    }

    /// The signer key list: the development keys when `dev` is set,
    /// otherwise the configured keys.
    pub fn authorized(&self, dev: bool) -> PipelineResult<AuthorizedKeys> {
        if dev {
            return Ok(dev_authorized_keys());
        }
        if self.authorized_keys.is_empty() {
            return Err(PipelineError::Config("no authorized keys configured".into()));
        }
        let keys = self
            .authorized_keys
            .iter()
            .map(|k| {
                PublicKey::from_hex(k)
                    .map_err(|e| PipelineError::Config(format!("authorized key {k}: {e}")))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(AuthorizedKeys::new(keys)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_artifact_len, 1024);
        assert_eq!(c.signing_timeout(), Duration::from_secs(300));
        assert!(c.parallel);
        assert!(c.authorized_keys.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = PipelineConfig::from_toml("output_dir = \"out\"\nparallel = false\n").unwrap();
        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert!(!c.parallel);
        assert_eq!(c.max_artifact_len, 1024);
    }

    #[test]
    fn unknown_types_are_config_errors() {
        assert!(matches!(
            PipelineConfig::from_toml("parallel = \"yes\""),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn authorized_keys_parse_in_order() {
        let dev = dev_authorized_keys();
        let config = PipelineConfig {
            authorized_keys: dev.keys().iter().map(|k| k.to_hex()).collect(),
            ..Default::default()
        };
        assert_eq!(config.authorized(false).unwrap(), dev);
    }

    #[test]
    fn missing_or_bad_keys_fail() {
        let config = PipelineConfig::default();
        assert!(matches!(config.authorized(false), Err(PipelineError::Config(_))));
        assert!(config.authorized(true).is_ok());

        let config = PipelineConfig {
            authorized_keys: vec!["zz".into()],
            ..Default::default()
        };
        assert!(matches!(config.authorized(false), Err(PipelineError::Config(_))));
    }
}
