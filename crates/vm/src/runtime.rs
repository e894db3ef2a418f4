use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use bitcoin::Network;
use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, U256};
use opnet_state::{ContractEvent, ContractRecord, TxInputInfo, TxOutputInfo};
use tracing::debug;

use crate::{
    env::{ExecutionEnv, StateAccess},
    frame::{run_frame, FrameState},
    VmError,
};

/// One transaction execution request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub contract: Address32,
    pub calldata: Vec<u8>,
    pub max_gas: u64,
    /// Declared access list with proven values from the store.
    pub preloaded: BTreeMap<Address32, BTreeMap<U256, Option<U256>>>,
    pub tx_inputs: Vec<TxInputInfo>,
    pub tx_outputs: Vec<TxOutputInfo>,
    pub block_height: u64,
}

/// Result of a transaction execution, ready for the executor to fold into
/// the block's write batch.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub state: FrameState,
    /// Return data on success, revert payload otherwise.
    pub data: Vec<u8>,
    pub error: Option<VmError>,
    pub gas_used: u64,
    /// Merged storage writes; empty unless the execution succeeded.
    pub modified_storage: BTreeMap<Address32, BTreeMap<U256, U256>>,
    /// Events in emission order; empty unless the execution succeeded.
    pub events: Vec<ContractEvent>,
    /// Contracts deployed during the execution.
    pub deployments: Vec<ContractRecord>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.state == FrameState::Returned
    }
}

/// The WASM execution engine.
///
/// Owns the wasmi engine configuration; cheap to clone per worker. One
/// `execute` call runs one transaction to completion, nested calls included.
#[derive(Debug, Clone)]
pub struct ContractRuntime {
    engine: wasmi::Engine,
    params: ConsensusParams,
    network: Network,
}

impl ContractRuntime {
    pub fn new(params: ConsensusParams, network: Network) -> Self {
        // default wasmi config: no threads, no SIMD-dependent determinism
        // hazards, and no host clock or RNG is ever linked
        let engine = wasmi::Engine::default();
        Self {
            engine,
            params,
            network,
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Runs one transaction against the given state view.
    pub fn execute(&self, request: ExecutionRequest, state: Rc<dyn StateAccess>) -> ExecutionOutcome {
        let env = ExecutionEnv::new(
            self.params.clone(),
            self.network,
            state,
            request.preloaded,
            request.max_gas,
            request.tx_inputs,
            request.tx_outputs,
            request.block_height,
        );
        let shared = Rc::new(RefCell::new(env));

        let outcome = run_frame(
            &self.engine,
            shared.clone(),
            request.contract,
            &request.calldata,
        );

        let mut env = Rc::try_unwrap(shared)
            .expect("all frames have completed")
            .into_inner();

        let (modified_storage, events) = if outcome.is_success() {
            let layer = env.layers.pop().unwrap_or_default();
            (layer.storage, layer.events)
        } else {
            (BTreeMap::new(), Vec::new())
        };

        let deployments = if outcome.is_success() {
            std::mem::take(&mut env.deployments)
        } else {
            Vec::new()
        };

        debug!(
            contract = %request.contract,
            state = ?outcome.state,
            gas = env.gas.used(),
            "execution finished"
        );

        ExecutionOutcome {
            state: outcome.state,
            data: outcome.data,
            error: outcome.error,
            gas_used: env.gas.used(),
            modified_storage,
            events,
            deployments,
        }
    }
}
