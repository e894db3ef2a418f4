//! Node configuration: TOML config file and the trusted-authority keyset.

mod authority;
mod config;

pub use authority::{AuthorityError, AuthorityKey, TrustedAuthoritySet};
pub use config::{BitcoindConfig, Config, ConfigError, RpcConfig, SyncConfig};
