//! Gas-metered WASM sandbox for OP_NET contract execution.
//!
//! Contracts are pre-instrumented WASM modules: every metered operation calls
//! the `usegas` import, which feeds one [`GasTracker`] shared by the whole
//! transaction, nested calls included. The sandbox exposes no clock, RNG or
//! filesystem; the only entropy a contract sees is block and transaction
//! data handed in by the host.
//!
//! Guest ABI: a module exports `memory`, `__alloc(len) -> ptr` and
//! `start(calldata_ptr, calldata_len) -> status`. Host imports live under the
//! `env` module; see [`host`] for the surface.

mod env;
mod errors;
mod frame;
mod gas;
mod host;
mod runtime;
mod stack;

pub use env::{ExecutionEnv, StateAccess, WriteLayer};
pub use errors::VmError;
pub use frame::{CallOutcome, FrameState};
pub use gas::GasTracker;
pub use runtime::{ContractRuntime, ExecutionOutcome, ExecutionRequest};
pub use stack::AddressStack;

/// Replacement payload for oversized revert data.
pub const REVERT_TOO_LONG: &[u8] = b"OP_NET: Revert error too long.";
