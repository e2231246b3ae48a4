//! Server configuration.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! debug = false
//! max_body_size = 1048576
//! log_ingress = true
//! gzip = true
//! ```

use serde::Deserialize;

use crate::error::Error;
use crate::middleware::{Chain, Gzip, Logging, StaticValue};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `host:port` to listen on.
    pub addr: String,
    /// Include error messages in `500` bodies. Leave off in production.
    pub debug: bool,
    /// Request body cap in bytes; `0` disables it.
    pub max_body_size: u64,
    /// Log every incoming request, not just responses.
    pub log_ingress: bool,
    /// Compress responses for clients that accept gzip.
    pub gzip: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_owned(),
            debug: false,
            max_body_size: 1 << 20,
            log_ingress: false,
            gzip: true,
        }
    }
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self, Error> {
        Ok(toml::from_str(src)?)
    }

    /// The standard chain for this config: logging outermost, then the debug
    /// flag and body limit, then compression.
    pub fn chain<A: 'static>(&self) -> Chain<A> {
        let chain = Chain::new()
            .with(Logging::new(self.log_ingress))
            .with(StaticValue::debug_flag(self.debug))
            .with(StaticValue::max_body_size(self.max_body_size));
        if self.gzip { chain.with(Gzip::new()) } else { chain }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn overrides_fields() {
        let config = Config::from_toml("debug = true\nmax_body_size = 0\ngzip = false").unwrap();
        assert!(config.debug);
        assert_eq!(config.max_body_size, 0);
        assert_eq!(config.chain::<()>().len(), 3);
        assert_eq!(Config::default().chain::<()>().len(), 4);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(Config::from_toml("gzp = true"), Err(Error::Config(_))));
    }
}
