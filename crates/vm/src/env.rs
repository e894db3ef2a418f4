use std::{collections::BTreeMap, rc::Rc};

use bitcoin::Network;
use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, Buf32, U256};
use opnet_state::{ContractEvent, ContractRecord, TxInputInfo, TxOutputInfo};

use crate::{GasTracker, VmError};

/// Synchronous state seam the engine reads through.
///
/// The executor preloads the declared access list before any user code runs
/// and hands the engine this view; `storage_fallback` only fires in
/// non-strict mode for undeclared slots.
pub trait StateAccess {
    /// Committed value of an undeclared slot; non-strict mode only.
    fn storage_fallback(&self, contract: &Address32, slot: &U256) -> Option<U256>;

    /// Bytecode of a deployed contract.
    fn bytecode_of(&self, contract: &Address32) -> Option<Vec<u8>>;
}

/// Uncommitted writes and events of one live frame.
#[derive(Debug, Default, Clone)]
pub struct WriteLayer {
    pub storage: BTreeMap<Address32, BTreeMap<U256, U256>>,
    pub events: Vec<ContractEvent>,
}

/// Mutable state of one transaction execution, shared by all frames.
pub struct ExecutionEnv {
    pub(crate) params: ConsensusParams,
    pub(crate) network: Network,
    pub(crate) state: Rc<dyn StateAccess>,
    pub(crate) gas: GasTracker,
    pub(crate) call_stack: crate::AddressStack,
    /// Declared access list with proven values; `Some(None)` is a proven
    /// absence.
    pub(crate) preloaded: BTreeMap<Address32, BTreeMap<U256, Option<U256>>>,
    /// One layer per live frame, innermost last.
    pub(crate) layers: Vec<WriteLayer>,
    pub(crate) total_event_bytes: usize,
    pub(crate) deploy_depth: usize,
    pub(crate) deployments: Vec<ContractRecord>,
    pub(crate) tx_inputs: Vec<TxInputInfo>,
    pub(crate) tx_outputs: Vec<TxOutputInfo>,
    pub(crate) block_height: u64,
}

impl std::fmt::Debug for ExecutionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEnv")
            .field("gas", &self.gas)
            .field("call_depth", &self.call_stack.depth())
            .field("layers", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl ExecutionEnv {
    #[expect(clippy::too_many_arguments, reason = "assembled once by the runtime")]
    pub(crate) fn new(
        params: ConsensusParams,
        network: Network,
        state: Rc<dyn StateAccess>,
        preloaded: BTreeMap<Address32, BTreeMap<U256, Option<U256>>>,
        max_gas: u64,
        tx_inputs: Vec<TxInputInfo>,
        tx_outputs: Vec<TxOutputInfo>,
        block_height: u64,
    ) -> Self {
        Self {
            params,
            network,
            state,
            gas: GasTracker::new(max_gas),
            call_stack: crate::AddressStack::new(),
            preloaded,
            layers: Vec::new(),
            total_event_bytes: 0,
            deploy_depth: 0,
            deployments: Vec::new(),
            tx_inputs,
            tx_outputs,
            block_height,
        }
    }

    /// Resolves a storage read through the merged view: live frame layers
    /// innermost-first, then the preloaded access list, then (non-strict
    /// only) the committed store.
    pub(crate) fn storage_get(&self, contract: &Address32, slot: &U256) -> Result<U256, VmError> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.storage.get(contract).and_then(|m| m.get(slot)) {
                return Ok(*value);
            }
        }

        if let Some(slots) = self.preloaded.get(contract) {
            if let Some(value) = slots.get(slot) {
                return Ok(value.unwrap_or(U256::ZERO));
            }
        }

        if self.params.strict_access_list {
            return Err(VmError::OutOfAccessList);
        }

        Ok(self
            .state
            .storage_fallback(contract, slot)
            .unwrap_or(U256::ZERO))
    }

    /// Local write into the innermost frame layer.
    pub(crate) fn storage_set(&mut self, contract: Address32, slot: U256, value: U256) {
        let layer = self
            .layers
            .last_mut()
            .expect("storage_set outside of a frame");
        layer.storage.entry(contract).or_default().insert(slot, value);
    }

    pub(crate) fn push_layer(&mut self) {
        self.layers.push(WriteLayer::default());
    }

    /// Frame succeeded: merge its layer into the parent (or keep it as the
    /// final result layer for the outermost frame).
    pub(crate) fn commit_layer(&mut self) {
        let top = self.layers.pop().expect("commit without layer");
        match self.layers.last_mut() {
            Some(parent) => {
                for (contract, slots) in top.storage {
                    let entry = parent.storage.entry(contract).or_default();
                    entry.extend(slots);
                }
                parent.events.extend(top.events);
            }
            None => {
                // outermost frame: push the merged result back for harvest
                self.layers.push(top);
            }
        }
    }

    /// Frame failed: its writes and events vanish. Event budget bytes are
    /// not refunded.
    pub(crate) fn discard_layer(&mut self) {
        self.layers.pop().expect("discard without layer");
    }

    pub(crate) fn record_event(&mut self, event: ContractEvent) -> Result<(), VmError> {
        if event.event_type.len() > self.params.max_event_name_size
            || event.data.len() > self.params.max_event_data_size
        {
            return Err(VmError::EventTooLarge);
        }
        let next_total = self.total_event_bytes + event.byte_size();
        if next_total > self.params.max_total_event_size {
            return Err(VmError::EventBudgetExceeded);
        }
        self.total_event_bytes = next_total;
        self.layers
            .last_mut()
            .expect("event outside of a frame")
            .events
            .push(event);
        Ok(())
    }

    /// Registers a nested deployment and returns the new contract address.
    pub(crate) fn deploy(
        &mut self,
        deployer: &Address32,
        bytecode: Vec<u8>,
        salt: Buf32,
    ) -> Result<Address32, VmError> {
        if self.deploy_depth >= self.params.max_deployment_depth {
            return Err(VmError::MaxDeploymentDepth);
        }
        self.deploy_depth += 1;

        let bytecode_hash = {
            use bitcoin::hashes::{sha256, Hash};
            Buf32::new(sha256::Hash::hash(&bytecode).to_byte_array())
        };

        let (virtual_address, tweaked_public_key, p2tr_address) =
            opnet_state::derive_contract_addresses(deployer, &bytecode_hash, &salt, self.network)
                .map_err(|e| VmError::InvalidDeployment(e.to_string()))?;

        let record = ContractRecord {
            tweaked_public_key,
            virtual_address,
            deployer_public_key: *deployer,
            bytecode,
            bytecode_hash,
            p2tr_address,
            inserted_block_height: self.block_height,
        };
        self.deployments.push(record);

        Ok(tweaked_public_key)
    }

    /// Bytecode lookup covering both committed contracts and deployments made
    /// earlier in this execution.
    pub(crate) fn bytecode_of(&self, contract: &Address32) -> Option<Vec<u8>> {
        if let Some(record) = self
            .deployments
            .iter()
            .find(|r| r.tweaked_public_key == *contract)
        {
            return Some(record.bytecode.clone());
        }
        self.state.bytecode_of(contract)
    }
}
