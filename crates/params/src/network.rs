use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Network level parameters that select which Bitcoin chain is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Underlying Bitcoin network.
    pub network: Network,

    /// Height at which the OP_NET protocol activates; blocks below are
    /// indexed for UTXOs only.
    pub enabled_at_height: u64,
}

impl NetworkParams {
    pub fn new(network: Network, enabled_at_height: u64) -> Self {
        Self {
            network,
            enabled_at_height,
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            enabled_at_height: 0,
        }
    }
}
