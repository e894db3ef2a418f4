use std::{cell::RefCell, rc::Rc};

use opnet_primitives::Address32;
use tracing::trace;
use wasmi::{Linker, Module, Store};

use crate::{
    env::ExecutionEnv,
    host::{self, Abort, FrameData},
    VmError, REVERT_TOO_LONG,
};

/// Lifecycle of one call frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameState {
    Idle,
    Instantiated,
    Running,
    Returned,
    Reverted,
    OutOfGas,
    Trapped,
}

/// What a frame produced.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub state: FrameState,
    /// Return data on success, revert payload otherwise.
    pub data: Vec<u8>,
    pub error: Option<VmError>,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        self.state == FrameState::Returned
    }

    fn failed(state: FrameState, error: VmError) -> Self {
        Self {
            state,
            data: Vec::new(),
            error: Some(error),
        }
    }
}

/// Executes one call frame against the shared transaction environment.
///
/// On success the frame's writes and events are merged into the parent
/// layer; on any failure they are discarded and the parent only sees the
/// outcome.
pub(crate) fn run_frame(
    engine: &wasmi::Engine,
    shared: Rc<RefCell<ExecutionEnv>>,
    contract: Address32,
    calldata: &[u8],
) -> CallOutcome {
    let (bytecode, max_depth, reentrancy_guard, max_revert) = {
        let env = shared.borrow();
        (
            env.bytecode_of(&contract),
            env.params.max_call_depth,
            env.params.reentrancy_guard,
            env.params.max_revert_payload,
        )
    };

    let Some(bytecode) = bytecode else {
        return CallOutcome::failed(FrameState::Reverted, VmError::ContractNotFound(contract));
    };

    if let Err(e) = shared
        .borrow_mut()
        .call_stack
        .enter(contract, max_depth, reentrancy_guard)
    {
        return CallOutcome::failed(FrameState::Reverted, e);
    }
    shared.borrow_mut().push_layer();

    let outcome = execute_module(engine, &shared, contract, &bytecode, calldata);

    {
        let mut env = shared.borrow_mut();
        if outcome.is_success() {
            env.commit_layer();
        } else {
            env.discard_layer();
        }
        env.call_stack.exit();
    }

    trace!(%contract, state = ?outcome.state, "frame finished");
    cap_revert(outcome, max_revert)
}

fn execute_module(
    engine: &wasmi::Engine,
    shared: &Rc<RefCell<ExecutionEnv>>,
    contract: Address32,
    bytecode: &[u8],
    calldata: &[u8],
) -> CallOutcome {
    let module = match Module::new(engine, bytecode) {
        Ok(module) => module,
        Err(e) => {
            return CallOutcome::failed(
                FrameState::Reverted,
                VmError::InvalidBytecode(e.to_string()),
            )
        }
    };

    let mut store = Store::new(
        engine,
        FrameData {
            shared: shared.clone(),
            engine: engine.clone(),
            contract,
            memory: None,
            abort: None,
            response: Vec::new(),
        },
    );

    let mut linker = Linker::new(engine);
    if let Err(e) = host::install(&mut linker) {
        return CallOutcome::failed(FrameState::Reverted, VmError::Trap(e.to_string()));
    }

    let instance = match linker
        .instantiate(&mut store, &module)
        .and_then(|pre| pre.start(&mut store))
    {
        Ok(instance) => instance,
        Err(e) => {
            return CallOutcome::failed(
                FrameState::Reverted,
                VmError::InvalidBytecode(e.to_string()),
            )
        }
    };
    let Some(memory) = instance.get_memory(&store, "memory") else {
        return CallOutcome::failed(
            FrameState::Reverted,
            VmError::MissingExport("memory".into()),
        );
    };
    store.data_mut().memory = Some(memory);

    let Ok(alloc) = instance.get_typed_func::<i32, i32>(&store, "__alloc") else {
        return CallOutcome::failed(
            FrameState::Reverted,
            VmError::MissingExport("__alloc".into()),
        );
    };
    let Ok(start) = instance.get_typed_func::<(i32, i32), i32>(&store, "start") else {
        return CallOutcome::failed(FrameState::Reverted, VmError::MissingExport("start".into()));
    };

    let calldata_ptr = match alloc.call(&mut store, calldata.len() as i32) {
        Ok(ptr) => ptr,
        Err(e) => return interpret_failure(&mut store, e),
    };
    if !calldata.is_empty() {
        if let Err(e) = memory.write(&mut store, calldata_ptr as u32 as usize, calldata) {
            return CallOutcome::failed(FrameState::Reverted, VmError::MemoryAccess(e.to_string()));
        }
    }

    match start.call(&mut store, (calldata_ptr, calldata.len() as i32)) {
        Ok(0) => CallOutcome {
            state: FrameState::Returned,
            data: Vec::new(),
            error: None,
        },
        Ok(_) => CallOutcome {
            state: FrameState::Reverted,
            data: Vec::new(),
            error: None,
        },
        Err(e) => interpret_failure(&mut store, e),
    }
}

/// Distinguishes host-initiated aborts from genuine wasm traps.
fn interpret_failure(store: &mut Store<FrameData>, error: wasmi::Error) -> CallOutcome {
    match store.data_mut().abort.take() {
        Some(Abort::Exit { status: 0, data }) => CallOutcome {
            state: FrameState::Returned,
            data,
            error: None,
        },
        Some(Abort::Exit { data, .. }) => CallOutcome {
            state: FrameState::Reverted,
            data,
            error: None,
        },
        Some(Abort::Fail(VmError::OutOfGas)) => {
            CallOutcome::failed(FrameState::OutOfGas, VmError::OutOfGas)
        }
        Some(Abort::Fail(e)) => CallOutcome::failed(FrameState::Reverted, e),
        None => CallOutcome::failed(FrameState::Trapped, VmError::Trap(error.to_string())),
    }
}

/// Enforces the revert payload cap; oversized payloads are replaced with the
/// canonical truncation message.
fn cap_revert(mut outcome: CallOutcome, max_revert: usize) -> CallOutcome {
    if outcome.state == FrameState::Reverted && outcome.data.len() > max_revert {
        outcome.data = REVERT_TOO_LONG.to_vec();
    }
    outcome
}
