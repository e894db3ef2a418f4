//! Intra-block transaction ordering.
//!
//! Coinbase-style transactions come first in discovery order. The rest form
//! a dependency graph on same-block UTXO consumption: weakly connected
//! groups are ordered internally so producers precede consumers, groups are
//! ranked by total burned fee descending, ties broken by the concatenation
//! of the members' indexing hashes.

use std::collections::{BTreeMap, VecDeque};

use opnet_l1tx::ClassifiedTx;
use opnet_primitives::Buf32;
use tracing::trace;

/// Union-find over transaction indices.
struct Groups {
    parent: Vec<usize>,
}

impl Groups {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Orders one block's classified transactions.
///
/// The output length always equals the input length; losing a transaction
/// here would corrupt every downstream commit, so that case panics.
pub fn sort_transactions(txs: Vec<ClassifiedTx>) -> Vec<ClassifiedTx> {
    let input_len = txs.len();

    let (coinbase, rest): (Vec<_>, Vec<_>) = txs.into_iter().partition(|tx| tx.is_coinbase);

    let by_txid: BTreeMap<Buf32, usize> = rest
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.txid, i))
        .collect();

    // edges producer -> consumers, restricted to this block
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); rest.len()];
    let mut in_degree: Vec<usize> = vec![0; rest.len()];
    let mut groups = Groups::new(rest.len());

    for (i, tx) in rest.iter().enumerate() {
        for input in &tx.inputs {
            if let Some(&producer) = by_txid.get(&input.outpoint.txid) {
                if producer != i {
                    consumers[producer].push(i);
                    in_degree[i] += 1;
                    groups.union(producer, i);
                }
            }
        }
    }

    // Kahn per group, discovery order as the stable tie-break
    let mut group_members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..rest.len() {
        group_members.entry(groups.find(i)).or_default().push(i);
    }

    let mut ordered_groups = Vec::with_capacity(group_members.len());
    for (_, members) in group_members {
        let mut degrees: BTreeMap<usize, usize> =
            members.iter().map(|&i| (i, in_degree[i])).collect();
        let mut queue: VecDeque<usize> = members
            .iter()
            .copied()
            .filter(|i| in_degree[*i] == 0)
            .collect();
        let mut order = Vec::with_capacity(members.len());

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &consumer in &consumers[i] {
                let degree = degrees.get_mut(&consumer).expect("consumer in group");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(consumer);
                }
            }
        }

        // same-block hashes cannot form a cycle; keep the length invariant
        // regardless
        for &i in &members {
            if !order.contains(&i) {
                order.push(i);
            }
        }

        let burned: u64 = order.iter().map(|&i| rest[i].burned_fee).sum();
        let tie_break: Vec<u8> = order
            .iter()
            .flat_map(|&i| rest[i].computed_indexing_hash.as_bytes().iter().copied())
            .collect();
        ordered_groups.push((burned, tie_break, order));
    }

    // fee descending, then indexing-hash concatenation ascending
    ordered_groups.sort_by(|(fee_a, tie_a, _), (fee_b, tie_b, _)| {
        fee_b.cmp(fee_a).then_with(|| tie_a.cmp(tie_b))
    });

    let mut taken: Vec<Option<ClassifiedTx>> = rest.into_iter().map(Some).collect();
    let mut sorted = coinbase;
    for (_, _, order) in ordered_groups {
        for i in order {
            sorted.push(taken[i].take().expect("each tx emitted once"));
        }
    }

    assert_eq!(
        sorted.len(),
        input_len,
        "sorter lost transactions: {} in, {} out",
        input_len,
        sorted.len()
    );

    trace!(n_tx = sorted.len(), "block order fixed");
    sorted
}
