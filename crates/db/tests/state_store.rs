//! Behavioural suite run against both store backends.

use opnet_db::{MemStateStore, SledStateStore, StateStore, StorageError};
use opnet_primitives::{Buf32, OutPointRef, Uint256, U256};
use opnet_state::{
    BlockHeader, BlockWrites, Epoch, EpochSubmission, ReorgRecord, ScriptInfo, SpentRef, Unspent,
};

fn header(height: u64) -> BlockHeader {
    let mut hash = [0u8; 32];
    hash[0] = height as u8;
    hash[1] = 0xb1;
    BlockHeader::pre_execution(
        height,
        Buf32::new(hash),
        Buf32::new([height.wrapping_sub(1) as u8; 32]),
        Buf32::zero(),
    )
}

fn unspent(txid_byte: u8, vout: u16, value: u64, address: &str, created: u64) -> Unspent {
    Unspent {
        outpoint: OutPointRef::new(Buf32::new([txid_byte; 32]), vout),
        value,
        script_pubkey: ScriptInfo {
            hex: vec![0x51],
            address: Some(address.to_string()),
        },
        created_at_block: created,
        spent_at_block: None,
    }
}

fn spend(txid_byte: u8, vout: u16, at: u64) -> SpentRef {
    SpentRef {
        outpoint: OutPointRef::new(Buf32::new([txid_byte; 32]), vout),
        spent_at_block: at,
    }
}

fn submission(epoch: u64, salt_byte: u8, pk_byte: u8, difficulty: u32) -> EpochSubmission {
    EpochSubmission {
        epoch_number: epoch,
        salt: Buf32::new([salt_byte; 32]),
        mldsa_public_key: Buf32::new([pk_byte; 32]),
        graffiti: None,
        difficulty,
        legacy_public_key: Buf32::new([0xee; 32]),
    }
}

async fn utxo_lifecycle(store: &dyn StateStore) {
    // block 100 creates two outputs for "alice"
    let mut writes = BlockWrites::new();
    writes.utxo_add.push(unspent(1, 0, 5000, "alice", 100));
    writes.utxo_add.push(unspent(1, 1, 400, "alice", 100));
    store.commit_block(header(100), writes).await.unwrap();

    let op = OutPointRef::new(Buf32::new([1; 32]), 0);
    let utxo = store.get_utxo(op).await.unwrap().unwrap();
    assert!(utxo.is_live());
    assert_eq!(utxo.value, 5000);

    assert_eq!(store.get_balance_of("alice", false).await.unwrap(), 5400);
    // 400-sat output filtered as an ordinals carrier
    assert_eq!(store.get_balance_of("alice", true).await.unwrap(), 5000);

    // block 101 spends one of them
    let mut writes = BlockWrites::new();
    writes.utxo_spend.push(spend(1, 0, 101));
    store.commit_block(header(101), writes).await.unwrap();

    let utxo = store.get_utxo(op).await.unwrap().unwrap();
    assert_eq!(utxo.spent_at_block, Some(101));
    assert_eq!(store.get_balance_of("alice", false).await.unwrap(), 400);
    assert_eq!(store.get_utxos_of("alice").await.unwrap().len(), 1);
}

async fn spend_of_unknown_utxo_fails(store: &dyn StateStore) {
    let mut writes = BlockWrites::new();
    writes.utxo_spend.push(spend(9, 0, 100));

    let err = store.commit_block(header(100), writes).await.unwrap_err();
    assert!(matches!(err, StorageError::MissingUtxo(_, 100)));
}

async fn non_sequential_commit_rejected(store: &dyn StateStore) {
    store
        .commit_block(header(100), BlockWrites::new())
        .await
        .unwrap();

    let err = store
        .commit_block(header(102), BlockWrites::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::NonSequentialBlock {
            expected: 101,
            got: 102
        }
    ));
}

async fn storage_is_versioned_by_height(store: &dyn StateStore) {
    let contract = Buf32::new([7; 32]);
    let slot = U256::from(3u8);

    let mut writes = BlockWrites::new();
    writes
        .storage_set
        .push((contract, Uint256::new(slot), Uint256::from(10u64)));
    store.commit_block(header(100), writes).await.unwrap();

    let mut writes = BlockWrites::new();
    writes
        .storage_set
        .push((contract, Uint256::new(slot), Uint256::from(20u64)));
    store.commit_block(header(101), writes).await.unwrap();

    assert_eq!(
        store.get_storage(contract, slot).await.unwrap(),
        Some(U256::from(20u64))
    );

    store.revert_until(101).await.unwrap();
    assert_eq!(
        store.get_storage(contract, slot).await.unwrap(),
        Some(U256::from(10u64))
    );

    store.revert_until(100).await.unwrap();
    assert_eq!(store.get_storage(contract, slot).await.unwrap(), None);
}

async fn preload_reports_absence(store: &dyn StateStore) {
    let contract = Buf32::new([7; 32]);

    let mut writes = BlockWrites::new();
    writes
        .storage_set
        .push((contract, Uint256::from(1u64), Uint256::from(10u64)));
    store.commit_block(header(100), writes).await.unwrap();

    let preload = store
        .preload_storage(vec![(contract, vec![U256::from(1u64), U256::from(2u64)])])
        .await
        .unwrap();

    let slots = &preload[&contract];
    assert_eq!(slots[&U256::from(1u64)], Some(U256::from(10u64)));
    // declared but absent: proven absence, not a missing entry
    assert_eq!(slots[&U256::from(2u64)], None);
}

/// Commit 100..=103, then reorg back to 100.
async fn reorg_of_three_blocks(store: &dyn StateStore) {
    let mut writes = BlockWrites::new();
    writes.utxo_add.push(unspent(1, 0, 5000, "alice", 100));
    store.commit_block(header(100), writes).await.unwrap();

    let mut writes = BlockWrites::new();
    writes.utxo_add.push(unspent(2, 0, 700, "bob", 101));
    store.commit_block(header(101), writes).await.unwrap();

    let mut writes = BlockWrites::new();
    writes.utxo_spend.push(spend(1, 0, 102));
    store.commit_block(header(102), writes).await.unwrap();

    store
        .commit_block(header(103), BlockWrites::new())
        .await
        .unwrap();

    store.revert_until(101).await.unwrap();
    store
        .record_reorg(ReorgRecord {
            from_block: 101,
            to_block: 103,
            timestamp: 0,
        })
        .await
        .unwrap();

    // blocks 101..=103 are gone
    assert_eq!(store.get_latest_block().await.unwrap().unwrap().height, 100);
    for height in 101..=103 {
        assert!(store.get_block_header(height).await.unwrap().is_none());
    }

    // bob's UTXO was created in a reverted block
    let bob = OutPointRef::new(Buf32::new([2; 32]), 0);
    assert!(store.get_utxo(bob).await.unwrap().is_none());
    assert_eq!(store.get_balance_of("bob", false).await.unwrap(), 0);

    // alice's UTXO was spent in a reverted block: live again
    let alice = OutPointRef::new(Buf32::new([1; 32]), 0);
    assert!(store.get_utxo(alice).await.unwrap().unwrap().is_live());

    let reorgs = store.get_reorgs().await.unwrap();
    assert_eq!(reorgs.len(), 1);
    assert_eq!(reorgs[0].from_block, 101);
    assert_eq!(reorgs[0].to_block, 103);

    // idempotent
    store.revert_until(101).await.unwrap();
    assert_eq!(store.get_latest_block().await.unwrap().unwrap().height, 100);
}

/// Revert law: commit a..=b then revert to a+1 probes identically to having
/// committed only a.
async fn revert_restores_prior_state(only_a: &dyn StateStore, a_to_b: &dyn StateStore) {
    let contract = Buf32::new([7; 32]);

    let mut base = BlockWrites::new();
    base.utxo_add.push(unspent(1, 0, 5000, "alice", 100));
    base.storage_set
        .push((contract, Uint256::from(1u64), Uint256::from(10u64)));

    let root_a = only_a.commit_block(header(100), base.clone()).await.unwrap();
    let root_b = a_to_b.commit_block(header(100), base).await.unwrap();
    assert_eq!(root_a, root_b, "checksum root must be a pure function");

    for height in 101..=103 {
        let mut writes = BlockWrites::new();
        writes.utxo_add.push(unspent(height as u8, 0, 100, "bob", height));
        writes
            .storage_set
            .push((contract, Uint256::from(1u64), Uint256::from(height)));
        a_to_b.commit_block(header(height), writes).await.unwrap();
    }

    a_to_b.revert_until(101).await.unwrap();

    let tip_a = only_a.get_latest_block().await.unwrap().unwrap();
    let tip_b = a_to_b.get_latest_block().await.unwrap().unwrap();
    assert_eq!(tip_a, tip_b);

    assert_eq!(
        only_a.get_storage(contract, U256::from(1u64)).await.unwrap(),
        a_to_b.get_storage(contract, U256::from(1u64)).await.unwrap(),
    );
    assert_eq!(
        only_a.get_balance_of("bob", false).await.unwrap(),
        a_to_b.get_balance_of("bob", false).await.unwrap(),
    );
}

async fn duplicate_submission_rejected(store: &dyn StateStore) {
    store
        .put_epoch_submission(19, submission(2, 1, 2, 25))
        .await
        .unwrap();

    let err = store
        .put_epoch_submission(19, submission(2, 1, 2, 25))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateSubmission));
    assert!(err.is_duplicate());
}

async fn best_submission_ordering(store: &dyn StateStore) {
    store
        .put_epoch_submission(19, submission(2, 1, 1, 20))
        .await
        .unwrap();
    store
        .put_epoch_submission(19, submission(2, 2, 2, 30))
        .await
        .unwrap();
    // same difficulty as the current best, inserted later: loses the tie
    store
        .put_epoch_submission(19, submission(2, 3, 3, 30))
        .await
        .unwrap();

    let best = store.get_best_submission(2).await.unwrap().unwrap();
    assert_eq!(best.difficulty, 30);
    assert_eq!(best.salt, Buf32::new([2; 32]));
}

async fn epoch_row_carries_best(store: &dyn StateStore) {
    store
        .put_epoch(
            10,
            Epoch {
                epoch_number: 2,
                target: Buf32::new([0x11; 32]),
                target_hash: Buf32::new([0x22; 32]),
                best: None,
            },
        )
        .await
        .unwrap();

    store
        .put_epoch_submission(19, submission(2, 5, 6, 21))
        .await
        .unwrap();

    let epoch = store.get_epoch(2).await.unwrap().unwrap();
    assert_eq!(epoch.best.unwrap().difficulty, 21);

    // reverting below the seed height drops the row and its submissions
    store.revert_until(10).await.unwrap();
    assert!(store.get_epoch(2).await.unwrap().is_none());
    assert!(store.get_best_submission(2).await.unwrap().is_none());
}

async fn purge_sweeps_old_spends(store: &dyn StateStore) {
    let mut writes = BlockWrites::new();
    writes.utxo_add.push(unspent(1, 0, 5000, "alice", 100));
    writes.utxo_add.push(unspent(2, 0, 5000, "alice", 100));
    store.commit_block(header(100), writes).await.unwrap();

    let mut writes = BlockWrites::new();
    writes.utxo_spend.push(spend(1, 0, 101));
    store.commit_block(header(101), writes).await.unwrap();

    // window has not passed yet
    assert_eq!(store.purge_spent_older_than(101).await.unwrap(), 0);
    // now it has
    assert_eq!(store.purge_spent_older_than(102).await.unwrap(), 1);

    let spent = OutPointRef::new(Buf32::new([1; 32]), 0);
    assert!(store.get_utxo(spent).await.unwrap().is_none());
    // the live one is untouched
    let live = OutPointRef::new(Buf32::new([2; 32]), 0);
    assert!(store.get_utxo(live).await.unwrap().is_some());
}

macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod mem {
            use super::*;

            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(&MemStateStore::new()).await;
                }
            )*
        }

        mod sled_backed {
            use super::*;

            $(
                #[tokio::test]
                async fn $name() {
                    let dir = tempfile::tempdir().unwrap();
                    let store = SledStateStore::open(dir.path()).unwrap();
                    super::$name(&store).await;
                }
            )*
        }
    };
}

store_tests!(
    utxo_lifecycle,
    spend_of_unknown_utxo_fails,
    non_sequential_commit_rejected,
    storage_is_versioned_by_height,
    preload_reports_absence,
    reorg_of_three_blocks,
    duplicate_submission_rejected,
    best_submission_ordering,
    epoch_row_carries_best,
    purge_sweeps_old_spends,
);

#[tokio::test]
async fn mem_revert_restores_prior_state() {
    revert_restores_prior_state(&MemStateStore::new(), &MemStateStore::new()).await;
}

#[tokio::test]
async fn sled_revert_restores_prior_state() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    revert_restores_prior_state(
        &SledStateStore::open(dir_a.path()).unwrap(),
        &SledStateStore::open(dir_b.path()).unwrap(),
    )
    .await;
}
