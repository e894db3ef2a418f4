use async_trait::async_trait;
use bitcoin::{hashes::Hash as _, Block, BlockHash};
use bitcoind_async_client::{client::Auth, traits::Reader as _, Client};
use opnet_primitives::Buf32;

use crate::{retry::with_retry, BitcoinReader, BtcIoError, RetryPolicy};

/// [`BitcoinReader`] over a bitcoind JSON-RPC endpoint.
pub struct ReaderClient {
    client: Client,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ReaderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ReaderClient {
    pub fn new(
        url: &str,
        username: &str,
        password: &str,
        policy: RetryPolicy,
    ) -> Result<Self, BtcIoError> {
        let client = Client::new(
            url.to_owned(),
            Auth::UserPass(username.to_owned(), password.to_owned()),
            None,
            None,
            None,
        )
        .map_err(|e| BtcIoError::Rpc(e.to_string()))?;
        Ok(Self { client, policy })
    }
}

fn rpc_err(err: impl std::fmt::Display) -> BtcIoError {
    BtcIoError::Rpc(err.to_string())
}

#[async_trait]
impl BitcoinReader for ReaderClient {
    async fn get_block_count(&self) -> Result<u64, BtcIoError> {
        with_retry(&self.policy, || async {
            self.client.get_block_count().await.map_err(rpc_err)
        })
        .await
    }

    async fn get_best_block_hash(&self) -> Result<Buf32, BtcIoError> {
        with_retry(&self.policy, || async {
            let height = self.client.get_block_count().await.map_err(rpc_err)?;
            let hash = self.client.get_block_hash(height).await.map_err(rpc_err)?;
            Ok(Buf32::new(hash.to_byte_array()))
        })
        .await
    }

    async fn get_block_hash(&self, height: u64) -> Result<Buf32, BtcIoError> {
        with_retry(&self.policy, || async {
            let hash = self.client.get_block_hash(height).await.map_err(rpc_err)?;
            Ok(Buf32::new(hash.to_byte_array()))
        })
        .await
    }

    async fn get_block(&self, hash: Buf32) -> Result<Block, BtcIoError> {
        let block_hash = BlockHash::from_byte_array(hash.into_bytes());
        with_retry(&self.policy, || async {
            self.client.get_block(&block_hash).await.map_err(rpc_err)
        })
        .await
    }
}
