//! End-to-end executor scenarios over the in-memory store.

use std::{collections::BTreeMap, sync::Arc};

use bitcoin::Network;
use opnet_db::{MemStateStore, StateStore};
use opnet_epoch::derive_epoch_target;
use opnet_l1tx::{
    AccessList, ClassifiedTx, EpochSubmissionFeature, SharedInteractionParameters, TxKind,
};
use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, Buf32, OutPointRef, U256};
use opnet_state::{
    derive_contract_addresses, BlockHeader, ScriptInfo, TxInputInfo, TxOutputInfo,
};
use sha2::{Digest, Sha256};

use crate::BlockExecutor;

fn deployer_key() -> Buf32 {
    let secp = secp256k1::Secp256k1::new();
    let keypair = secp256k1::Keypair::from_seckey_slice(&secp, &[0x77; 32]).unwrap();
    Buf32::new(keypair.x_only_public_key().0.serialize())
}

fn block_hash(height: u64) -> Buf32 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_be_bytes());
    bytes[8] = 0xb1;
    Buf32::new(bytes)
}

fn shared(
    from: Buf32,
    access_list: AccessList,
    epoch_submission: Option<EpochSubmissionFeature>,
) -> SharedInteractionParameters {
    SharedInteractionParameters {
        from_public_key: from,
        miner_mldsa_hashed_pubkey: Buf32::new([0xaa; 32]),
        challenge_preimage: Buf32::zero(),
        access_list,
        epoch_submission,
        mldsa_link: None,
        gas_sat_fee: 1_000,
        was_compressed: false,
    }
}

fn coinbase_input() -> TxInputInfo {
    TxInputInfo {
        outpoint: OutPointRef::new(Buf32::zero(), 0),
        coinbase: true,
    }
}

fn plain_output(index: u16, value: u64, address: &str) -> TxOutputInfo {
    TxOutputInfo {
        index,
        value,
        script_pubkey: ScriptInfo {
            hex: vec![0x51],
            address: Some(address.to_string()),
        },
        to: Some(address.to_string()),
    }
}

fn classified(txid_byte: u8, kind: TxKind, inputs: Vec<TxInputInfo>) -> ClassifiedTx {
    ClassifiedTx {
        txid: Buf32::new([txid_byte; 32]),
        kind,
        inputs,
        outputs: vec![plain_output(0, 10_000, "alice")],
        burned_fee: 1_000,
        computed_indexing_hash: Buf32::new([txid_byte; 32]),
        is_coinbase: false,
        public_keys: vec![],
    }
}

const PRELUDE: &str = r#"
  (import "env" "usegas" (func $usegas (param i64)))
  (import "env" "exit" (func $exit (param i32 i32 i32)))
  (import "env" "storage_get" (func $sget (param i32 i32)))
  (import "env" "storage_set" (func $sset (param i32 i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 8192))
  (func (export "__alloc") (param $len i32) (result i32)
    (local $ptr i32)
    global.get $heap
    local.set $ptr
    global.get $heap
    local.get $len
    i32.add
    global.set $heap
    local.get $ptr)
"#;

fn compile(body: &str) -> Vec<u8> {
    wat::parse_str(format!("(module {PRELUDE} {body})")).expect("valid wat")
}

/// Writes 7 into slot 0 and exits cleanly.
fn writer_contract() -> Vec<u8> {
    compile(
        r#"(func (export "start") (param i32 i32) (result i32)
             (call $usegas (i64.const 100))
             (i32.store8 (i32.const 63) (i32.const 7))
             (call $sset (i32.const 0) (i32.const 32))
             (i32.const 0))"#,
    )
}

struct Harness {
    store: Arc<MemStateStore>,
    executor: BlockExecutor,
}

fn harness(params: ConsensusParams) -> Harness {
    let store = Arc::new(MemStateStore::new());
    let executor = BlockExecutor::new(store.clone(), params, Network::Regtest);
    Harness { store, executor }
}

impl Harness {
    async fn run_block(
        &self,
        height: u64,
        txs: Vec<ClassifiedTx>,
        prev: Option<&BlockHeader>,
    ) -> BlockHeader {
        let executed = self
            .executor
            .execute_block(
                height,
                block_hash(height),
                prev.map(|p| p.hash).unwrap_or_else(Buf32::zero),
                Buf32::zero(),
                txs,
                prev,
            )
            .await
            .unwrap();
        self.store
            .commit_block(executed.header, executed.writes)
            .await
            .unwrap();
        self.store.get_block_header(height).await.unwrap().unwrap()
    }
}

/// Deploy at block 100, interact at block 101, observe the
/// stored pointer.
#[tokio::test]
async fn test_deploy_then_call() {
    let h = harness(ConsensusParams::default());
    let deployer = deployer_key();
    let bytecode = writer_contract();
    let bytecode_hash = Buf32::new(Sha256::digest(&bytecode).into());
    let salt = Buf32::new([0x01; 32]);

    let deploy = classified(
        1,
        TxKind::Deployment {
            shared: shared(deployer, AccessList::new(), None),
            salt,
            bytecode: bytecode.clone(),
            bytecode_hash,
        },
        vec![coinbase_input()],
    );
    let header_100 = h.run_block(100, vec![deploy], None).await;

    let (_, contract_addr, p2tr) =
        derive_contract_addresses(&deployer, &bytecode_hash, &salt, Network::Regtest).unwrap();
    let record = h.store.get_contract(contract_addr).await.unwrap().unwrap();
    assert_eq!(record.bytecode, bytecode);
    assert_eq!(record.p2tr_address, p2tr);
    assert_eq!(record.inserted_block_height, 100);

    // call it, declaring slot 0
    let mut access_list = AccessList::new();
    access_list.insert(contract_addr, U256::ZERO);
    let call = classified(
        2,
        TxKind::Interaction {
            shared: shared(deployer, access_list, None),
            target: contract_addr,
            calldata: vec![],
        },
        vec![coinbase_input()],
    );
    h.run_block(101, vec![call], Some(&header_100)).await;

    assert_eq!(
        h.store.get_storage(contract_addr, U256::ZERO).await.unwrap(),
        Some(U256::from(7u8))
    );

    let receipt = h
        .store
        .get_receipt(Buf32::new([2; 32]))
        .await
        .unwrap()
        .unwrap();
    assert!(receipt.is_success());
    assert!(receipt.gas_used.get() >= U256::from(100u64));
}

/// Gas exhaustion reverts the transaction; the block still
/// commits with a reverted receipt.
#[tokio::test]
async fn test_gas_exhaustion_reverts_tx_not_block() {
    let mut params = ConsensusParams::default();
    params.base_gas = 0;
    params.gas_per_sat = 1; // 1_000 sat fee -> 1_000 gas budget
    let h = harness(params);
    let deployer = deployer_key();

    let bytecode = compile(
        r#"(func (export "start") (param i32 i32) (result i32)
             (call $usegas (i64.const 2000))
             (i32.const 0))"#,
    );
    let bytecode_hash = Buf32::new(Sha256::digest(&bytecode).into());
    let salt = Buf32::new([0x02; 32]);

    let deploy = classified(
        1,
        TxKind::Deployment {
            shared: shared(deployer, AccessList::new(), None),
            salt,
            bytecode,
            bytecode_hash,
        },
        vec![coinbase_input()],
    );
    let header_100 = h.run_block(100, vec![deploy], None).await;

    let (_, contract_addr, _) =
        derive_contract_addresses(&deployer, &bytecode_hash, &salt, Network::Regtest).unwrap();
    let call = classified(
        2,
        TxKind::Interaction {
            shared: shared(deployer, AccessList::new(), None),
            target: contract_addr,
            calldata: vec![],
        },
        vec![coinbase_input()],
    );
    let header_101 = h.run_block(101, vec![call], Some(&header_100)).await;

    assert_eq!(header_101.height, 101);
    let receipt = h
        .store
        .get_receipt(Buf32::new([2; 32]))
        .await
        .unwrap()
        .unwrap();
    assert!(!receipt.is_success());
    assert_eq!(receipt.reverted.as_deref(), Some(b"out of gas".as_slice()));
}

/// Reading an undeclared slot reverts with the access-list
/// error and drops writes and events.
#[tokio::test]
async fn test_access_list_violation_reverts() {
    let h = harness(ConsensusParams::default());
    let deployer = deployer_key();

    // reads slot 1 (memory offset 0 holds the key; store 1 in last byte)
    let bytecode = compile(
        r#"(func (export "start") (param i32 i32) (result i32)
             (i32.store8 (i32.const 31) (i32.const 1))
             (call $sget (i32.const 0) (i32.const 64))
             (i32.const 0))"#,
    );
    let bytecode_hash = Buf32::new(Sha256::digest(&bytecode).into());
    let salt = Buf32::new([0x03; 32]);

    let deploy = classified(
        1,
        TxKind::Deployment {
            shared: shared(deployer, AccessList::new(), None),
            salt,
            bytecode,
            bytecode_hash,
        },
        vec![coinbase_input()],
    );
    let header_100 = h.run_block(100, vec![deploy], None).await;

    let (_, contract_addr, _) =
        derive_contract_addresses(&deployer, &bytecode_hash, &salt, Network::Regtest).unwrap();

    // declares slot 0 only; the contract reads slot 1
    let mut access_list = AccessList::new();
    access_list.insert(contract_addr, U256::ZERO);
    let call = classified(
        2,
        TxKind::Interaction {
            shared: shared(deployer, access_list, None),
            target: contract_addr,
            calldata: vec![],
        },
        vec![coinbase_input()],
    );
    h.run_block(101, vec![call], Some(&header_100)).await;

    let receipt = h
        .store
        .get_receipt(Buf32::new([2; 32]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        receipt.reverted.as_deref(),
        Some(b"storage slot not in access list".as_slice())
    );
    assert_eq!(
        h.store.get_storage(contract_addr, U256::ZERO).await.unwrap(),
        None
    );
}

/// Carrier transactions place validated epoch submissions into the batch.
#[tokio::test]
async fn test_epoch_submission_recorded() {
    let mut params = ConsensusParams::default();
    params.min_difficulty = 4;
    let h = harness(params.clone());

    // commit empty blocks 0..=18 so the seed block (height 10) is final
    let mut prev: Option<BlockHeader> = None;
    for height in 0..=18 {
        let header = h.run_block(height, vec![], prev.as_ref()).await;
        prev = Some(header);
    }

    let seed = h.store.get_block_header(10).await.unwrap().unwrap();
    let target = derive_epoch_target(2, seed.checksum_root);

    // mine a salt for the difficulty floor
    let pk = Buf32::new([0x12; 32]);
    let mut salt = Buf32::zero();
    for nonce in 0u64.. {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&nonce.to_be_bytes());
        let candidate =
            opnet_epoch::solution_candidate(&target.target, &pk, &Buf32::new(bytes));
        if opnet_epoch::matching_bits(&candidate, &target.target_digest()) >= 4 {
            salt = Buf32::new(bytes);
            break;
        }
    }

    let mut carrier_shared = shared(
        deployer_key(),
        AccessList::new(),
        Some(EpochSubmissionFeature {
            mldsa_public_key: pk,
            salt,
            graffiti: Some(b"gm".to_vec()),
        }),
    );
    carrier_shared.challenge_preimage = target.target_hash;

    let carrier = classified(
        9,
        TxKind::Interaction {
            shared: carrier_shared,
            target: Address32::zero(),
            calldata: vec![],
        },
        vec![coinbase_input()],
    );
    h.run_block(19, vec![carrier], prev.as_ref()).await;

    let best = h.store.get_best_submission(2).await.unwrap().unwrap();
    assert_eq!(best.epoch_number, 2);
    assert_eq!(best.salt, salt);
    assert!(best.difficulty >= 4);
    assert_eq!(best.graffiti.as_deref(), Some(b"gm".as_slice()));
}

/// A submission claiming a stale target is silently dropped.
#[tokio::test]
async fn test_stale_target_submission_dropped() {
    let mut params = ConsensusParams::default();
    params.min_difficulty = 0;
    let h = harness(params);

    let mut prev: Option<BlockHeader> = None;
    for height in 0..=18 {
        let header = h.run_block(height, vec![], prev.as_ref()).await;
        prev = Some(header);
    }

    let mut carrier_shared = shared(
        deployer_key(),
        AccessList::new(),
        Some(EpochSubmissionFeature {
            mldsa_public_key: Buf32::new([0x12; 32]),
            salt: Buf32::new([0x13; 32]),
            graffiti: None,
        }),
    );
    // wrong claimed target
    carrier_shared.challenge_preimage = Buf32::new([0xff; 32]);

    let carrier = classified(
        9,
        TxKind::Interaction {
            shared: carrier_shared,
            target: Address32::zero(),
            calldata: vec![],
        },
        vec![coinbase_input()],
    );
    h.run_block(19, vec![carrier], prev.as_ref()).await;

    assert!(h.store.get_best_submission(2).await.unwrap().is_none());
}

/// Block execution feeds the UTXO set: outputs become live entries, inputs
/// mark spends.
#[tokio::test]
async fn test_utxo_flow_through_blocks() {
    let h = harness(ConsensusParams::default());

    let funding = ClassifiedTx {
        txid: Buf32::new([1; 32]),
        kind: TxKind::Generic { compromised: false },
        inputs: vec![coinbase_input()],
        outputs: vec![
            plain_output(0, 50_000, "alice"),
            plain_output(1, 25_000, "bob"),
        ],
        burned_fee: 0,
        computed_indexing_hash: Buf32::new([1; 32]),
        is_coinbase: true,
        public_keys: vec![],
    };
    let header_100 = h.run_block(100, vec![funding], None).await;

    assert_eq!(h.store.get_balance_of("alice", false).await.unwrap(), 50_000);
    assert_eq!(h.store.get_balance_of("bob", false).await.unwrap(), 25_000);

    // spend alice's output
    let spender = ClassifiedTx {
        txid: Buf32::new([2; 32]),
        kind: TxKind::Generic { compromised: false },
        inputs: vec![TxInputInfo {
            outpoint: OutPointRef::new(Buf32::new([1; 32]), 0),
            coinbase: false,
        }],
        outputs: vec![plain_output(0, 49_000, "carol")],
        burned_fee: 0,
        computed_indexing_hash: Buf32::new([2; 32]),
        is_coinbase: false,
        public_keys: vec![],
    };
    h.run_block(101, vec![spender], Some(&header_100)).await;

    assert_eq!(h.store.get_balance_of("alice", false).await.unwrap(), 0);
    assert_eq!(h.store.get_balance_of("carol", false).await.unwrap(), 49_000);

    let spent = h
        .store
        .get_utxo(OutPointRef::new(Buf32::new([1; 32]), 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(spent.spent_at_block, Some(101));
}
