use std::collections::{BTreeMap, BTreeSet};

use opnet_params::ConsensusParams;
use opnet_primitives::{u256_from_be_bytes, Address32, Buf32, U256};

use crate::{compression, errors::L1TxError, reader::ByteReader};

/// Per-transaction declaration of the storage slots an execution may touch.
///
/// Wire form is zlib over: `contract_count:u16le { contract:32 slot_count:u16le
/// { slot:32 }* }*`. Duplicate contracts or slots fail the whole list.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AccessList {
    entries: BTreeMap<Address32, BTreeSet<U256>>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total `(contract, slot)` pairs declared.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Address32> {
        self.entries.keys()
    }

    pub fn slots_of(&self, contract: &Address32) -> Option<&BTreeSet<U256>> {
        self.entries.get(contract)
    }

    pub fn contains(&self, contract: &Address32, slot: &U256) -> bool {
        self.entries
            .get(contract)
            .is_some_and(|slots| slots.contains(slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address32, &BTreeSet<U256>)> {
        self.entries.iter()
    }

    /// Inserts a declaration; `false` when it was already present.
    pub fn insert(&mut self, contract: Address32, slot: U256) -> bool {
        self.entries.entry(contract).or_default().insert(slot)
    }

    pub(crate) fn decode_compressed(
        payload: &[u8],
        params: &ConsensusParams,
    ) -> Result<Self, L1TxError> {
        // worst-case decompressed size: every entry is 32 bytes plus framing
        let bound = params.access_list_cap * 34 + (params.access_list_cap + 1) * 34;
        let raw = compression::decompress(payload, bound)?;
        Self::decode(&raw, params)
    }

    pub(crate) fn decode(raw: &[u8], params: &ConsensusParams) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(raw);
        let mut list = Self::new();
        let mut total = 0usize;

        let contract_count = reader.take_u16_le()?;
        for _ in 0..contract_count {
            let contract = Buf32::new(reader.take_arr::<32>()?);
            if list.entries.contains_key(&contract) {
                return Err(L1TxError::DuplicateAccess);
            }

            let slot_count = reader.take_u16_le()?;
            let slots = list.entries.entry(contract).or_default();
            for _ in 0..slot_count {
                let slot = u256_from_be_bytes(reader.take_arr::<32>()?);
                if !slots.insert(slot) {
                    return Err(L1TxError::DuplicateAccess);
                }
                total += 1;
                if total > params.access_list_cap {
                    return Err(L1TxError::AccessListTooLarge {
                        cap: params.access_list_cap,
                        got: total,
                    });
                }
            }
        }

        if !reader.is_empty() {
            return Err(L1TxError::TrailingBytes);
        }

        Ok(list)
    }

    /// Uncompressed wire encoding; inverse of [`Self::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for (contract, slots) in &self.entries {
            out.extend_from_slice(contract.as_bytes());
            out.extend_from_slice(&(slots.len() as u16).to_le_bytes());
            for slot in slots {
                out.extend_from_slice(&slot.to_be_bytes());
            }
        }
        out
    }
}
