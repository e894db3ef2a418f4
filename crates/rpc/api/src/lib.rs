//! jsonrpsee trait of the OP_NET JSON-RPC surface.
//!
//! Methods map 1:1 onto state-store and engine reads; the server
//! implementation is a thin adapter elsewhere. Batch size and pending
//! request caps are middleware concerns, not part of the trait.

use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use opnet_primitives::Buf32;
use opnet_rpc_types::{
    CallRequest, CallResult, RpcBlockHeader, RpcEpoch, RpcGasInfo, RpcReceipt, RpcReorg,
    RpcTrustedValidator, RpcUtxo, SubmitEpochParams,
};

#[rpc(server, namespace = "btc")]
pub trait OpnetApi {
    #[method(name = "blockByNumber")]
    async fn block_by_number(&self, height: u64) -> RpcResult<Option<RpcBlockHeader>>;

    #[method(name = "getBlockByHash")]
    async fn get_block_by_hash(&self, hash: Buf32) -> RpcResult<Option<RpcBlockHeader>>;

    #[method(name = "getBlockHeaderByNumber")]
    async fn get_block_header_by_number(&self, height: u64)
        -> RpcResult<Option<RpcBlockHeader>>;

    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, txid: Buf32) -> RpcResult<Option<RpcReceipt>>;

    /// Deployed bytecode of a contract, hex-encoded.
    #[method(name = "getCode")]
    async fn get_code(&self, contract: Buf32) -> RpcResult<Option<String>>;

    /// Committed value of one storage pointer, as a 32-byte hex word.
    #[method(name = "getStorageAt")]
    async fn get_storage_at(&self, contract: Buf32, slot: Buf32) -> RpcResult<Option<Buf32>>;

    #[method(name = "getBalance")]
    async fn get_balance(&self, address: String, filter_ordinals: bool) -> RpcResult<u64>;

    /// Read-only contract call against the latest committed state.
    #[method(name = "call")]
    async fn call(&self, request: CallRequest) -> RpcResult<CallResult>;

    /// Like `call`, but simulates a full transaction including carriers.
    #[method(name = "simulateTransaction")]
    async fn simulate_transaction(&self, raw_tx: String) -> RpcResult<CallResult>;

    #[method(name = "getUTXOs")]
    async fn get_utxos(&self, address: String) -> RpcResult<Vec<RpcUtxo>>;

    /// Forwards a raw transaction to the Bitcoin node's mempool.
    #[method(name = "sendRawTransaction")]
    async fn send_raw_transaction(&self, raw_tx: String) -> RpcResult<Buf32>;

    #[method(name = "submitEpoch")]
    async fn submit_epoch(&self, params: SubmitEpochParams) -> RpcResult<RpcEpoch>;

    #[method(name = "getEpochByNumber")]
    async fn get_epoch_by_number(&self, epoch_number: u64) -> RpcResult<Option<RpcEpoch>>;

    #[method(name = "getTrustedValidators")]
    async fn get_trusted_validators(&self) -> RpcResult<Vec<RpcTrustedValidator>>;

    #[method(name = "gas")]
    async fn gas(&self) -> RpcResult<RpcGasInfo>;

    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<u64>;

    #[method(name = "reorg")]
    async fn reorg(&self) -> RpcResult<Vec<RpcReorg>>;
}
