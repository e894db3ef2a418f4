use async_trait::async_trait;
use bitcoin::{hashes::Hash as _, Block, Transaction};
use opnet_primitives::Buf32;

use crate::BtcIoError;

/// Read access to the Bitcoin chain.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait BitcoinReader: Send + Sync {
    async fn get_block_count(&self) -> Result<u64, BtcIoError>;

    async fn get_best_block_hash(&self) -> Result<Buf32, BtcIoError>;

    async fn get_block_hash(&self, height: u64) -> Result<Buf32, BtcIoError>;

    async fn get_block(&self, hash: Buf32) -> Result<Block, BtcIoError>;
}

/// One fetched block, decomposed for the parser.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub height: u64,
    pub hash: Buf32,
    pub prev_hash: Buf32,
    pub merkle_root: Buf32,
    pub transactions: Vec<Transaction>,
}

/// Fetches the block at `height` and flattens the header fields the
/// pipeline needs.
pub async fn fetch_raw_block(
    reader: &dyn BitcoinReader,
    height: u64,
) -> Result<RawBlock, BtcIoError> {
    let hash = reader.get_block_hash(height).await?;
    let block = reader.get_block(hash).await?;

    Ok(RawBlock {
        height,
        hash,
        prev_hash: Buf32::new(block.header.prev_blockhash.to_byte_array()),
        merkle_root: Buf32::new(block.header.merkle_root.to_byte_array()),
        transactions: block.txdata,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::{block::Header, block::Version, CompactTarget, TxMerkleNode};

    use super::*;

    fn empty_block() -> Block {
        Block {
            header: Header {
                version: Version::TWO,
                prev_blockhash: bitcoin::BlockHash::from_byte_array([9; 32]),
                merkle_root: TxMerkleNode::from_byte_array([8; 32]),
                time: 0,
                bits: CompactTarget::from_consensus(0),
                nonce: 0,
            },
            txdata: vec![],
        }
    }

    #[tokio::test]
    async fn test_fetch_raw_block() {
        let mut reader = MockBitcoinReader::new();
        reader
            .expect_get_block_hash()
            .withf(|height| *height == 100)
            .returning(|_| Ok(Buf32::new([1; 32])));
        reader
            .expect_get_block()
            .withf(|hash| *hash == Buf32::new([1; 32]))
            .returning(|_| Ok(empty_block()));

        let raw = fetch_raw_block(&reader, 100).await.unwrap();
        assert_eq!(raw.height, 100);
        assert_eq!(raw.hash, Buf32::new([1; 32]));
        assert_eq!(raw.prev_hash, Buf32::new([9; 32]));
        assert!(raw.transactions.is_empty());
    }
}
