//! Host import surface exposed to contracts.
//!
//! Module `env` provides:
//!
//! | import | signature | purpose |
//! |---|---|---|
//! | `usegas` | `(i64)` | metering hook injected by instrumentation |
//! | `exit` | `(i32, i32, i32)` | end execution with status and payload |
//! | `storage_get` | `(i32, i32)` | 32-byte slot key → 32-byte value |
//! | `storage_set` | `(i32, i32)` | local write, committed on success |
//! | `call` | `(i32, i32, i32) -> i64` | nested call, returns response length |
//! | `deploy` | `(i32, i32, i32, i32) -> i32` | deploy bytecode, out 32-byte address |
//! | `emit` | `(i32, i32, i32, i32)` | record an event |
//! | `inputs` | `(i32) -> i32` | serialize tx inputs, returns length |
//! | `outputs` | `(i32) -> i32` | serialize tx outputs, returns length |
//! | `response_copy` | `(i32)` | copy the last response buffer out |
//!
//! `call`/`inputs`/`outputs` stage their result in a per-frame response
//! buffer which the guest then copies with `response_copy`.

use std::{cell::RefCell, rc::Rc};

use opnet_primitives::{u256_from_be_bytes, Address32, Buf32, U256};
use opnet_state::{ContractEvent, TxInputInfo, TxOutputInfo};
use wasmi::{core::TrapCode, Caller, Linker, Memory};

use crate::{env::ExecutionEnv, frame::run_frame, VmError};

/// Inputs view: include the coinbase marker per entry.
pub(crate) const VIEW_FLAG_COINBASE: i32 = 0x01;
/// Outputs view: include output values.
pub(crate) const VIEW_FLAG_VALUE: i32 = 0x01;
/// Outputs view: include raw script bytes.
pub(crate) const VIEW_FLAG_SCRIPT: i32 = 0x02;
/// Outputs view: include the decoded recipient address.
pub(crate) const VIEW_FLAG_TO: i32 = 0x04;

/// Why a frame stopped through a host trap.
#[derive(Debug)]
pub(crate) enum Abort {
    /// Guest called `exit`.
    Exit { status: i32, data: Vec<u8> },
    /// A host-enforced limit failed the frame.
    Fail(VmError),
}

/// Per-instance store data.
pub(crate) struct FrameData {
    pub(crate) shared: Rc<RefCell<ExecutionEnv>>,
    pub(crate) engine: wasmi::Engine,
    pub(crate) contract: Address32,
    pub(crate) memory: Option<Memory>,
    pub(crate) abort: Option<Abort>,
    pub(crate) response: Vec<u8>,
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameData")
            .field("contract", &self.contract)
            .field("abort", &self.abort)
            .finish_non_exhaustive()
    }
}

fn trap() -> wasmi::Error {
    wasmi::Error::from(TrapCode::UnreachableCodeReached)
}

fn fail(caller: &mut Caller<'_, FrameData>, error: VmError) -> wasmi::Error {
    caller.data_mut().abort = Some(Abort::Fail(error));
    trap()
}

fn read_memory(
    caller: &mut Caller<'_, FrameData>,
    ptr: i32,
    len: i32,
) -> Result<Vec<u8>, wasmi::Error> {
    let Some(memory) = caller.data().memory else {
        return Err(fail(caller, VmError::MemoryAccess("no memory".into())));
    };
    let (ptr, len) = (ptr as u32 as usize, len as u32 as usize);
    let mut buf = vec![0u8; len];
    match memory.read(&*caller, ptr, &mut buf) {
        Ok(()) => Ok(buf),
        Err(e) => Err(fail(caller, VmError::MemoryAccess(e.to_string()))),
    }
}

fn write_memory(
    caller: &mut Caller<'_, FrameData>,
    ptr: i32,
    data: &[u8],
) -> Result<(), wasmi::Error> {
    let Some(memory) = caller.data().memory else {
        return Err(fail(caller, VmError::MemoryAccess("no memory".into())));
    };
    match memory.write(&mut *caller, ptr as u32 as usize, data) {
        Ok(()) => Ok(()),
        Err(e) => Err(fail(caller, VmError::MemoryAccess(e.to_string()))),
    }
}

fn read_word(caller: &mut Caller<'_, FrameData>, ptr: i32) -> Result<U256, wasmi::Error> {
    let bytes = read_memory(caller, ptr, 32)?;
    Ok(u256_from_be_bytes(bytes.try_into().expect("32-byte read")))
}

/// Registers every host import on the linker.
pub(crate) fn install(linker: &mut Linker<FrameData>) -> Result<(), wasmi::Error> {
    linker.func_wrap(
        "env",
        "usegas",
        |mut caller: Caller<'_, FrameData>, amount: i64| -> Result<(), wasmi::Error> {
            let shared = caller.data().shared.clone();
            let result = shared.borrow_mut().gas.add_gas(amount as u64);
            result.map_err(|e| fail(&mut caller, e))
        },
    )?;

    linker.func_wrap(
        "env",
        "exit",
        |mut caller: Caller<'_, FrameData>, status: i32, ptr: i32, len: i32| -> Result<(), wasmi::Error> {
            let data = read_memory(&mut caller, ptr, len)?;
            caller.data_mut().abort = Some(Abort::Exit { status, data });
            Err(trap())
        },
    )?;

    linker.func_wrap(
        "env",
        "storage_get",
        |mut caller: Caller<'_, FrameData>, slot_ptr: i32, out_ptr: i32| -> Result<(), wasmi::Error> {
            let slot = read_word(&mut caller, slot_ptr)?;
            let contract = caller.data().contract;
            let shared = caller.data().shared.clone();
            let value = shared
                .borrow()
                .storage_get(&contract, &slot)
                .map_err(|e| fail(&mut caller, e))?;
            write_memory(&mut caller, out_ptr, &value.to_be_bytes())
        },
    )?;

    linker.func_wrap(
        "env",
        "storage_set",
        |mut caller: Caller<'_, FrameData>, slot_ptr: i32, value_ptr: i32| -> Result<(), wasmi::Error> {
            let slot = read_word(&mut caller, slot_ptr)?;
            let value = read_word(&mut caller, value_ptr)?;
            let contract = caller.data().contract;
            let shared = caller.data().shared.clone();
            shared.borrow_mut().storage_set(contract, slot, value);
            Ok(())
        },
    )?;

    linker.func_wrap(
        "env",
        "call",
        |mut caller: Caller<'_, FrameData>,
         addr_ptr: i32,
         data_ptr: i32,
         data_len: i32|
         -> Result<i64, wasmi::Error> {
            let target_bytes = read_memory(&mut caller, addr_ptr, 32)?;
            let target = Buf32::from_slice(&target_bytes).expect("32-byte read");
            let calldata = read_memory(&mut caller, data_ptr, data_len)?;

            let shared = caller.data().shared.clone();
            let engine = caller.data().engine.clone();

            let gas_before = shared.borrow().gas.used();
            let outcome = run_frame(&engine, shared.clone(), target, &calldata);
            let gas_used = shared.borrow().gas.used() - gas_before;

            // shared gas: a nested out-of-gas sinks this frame too
            if let Some(VmError::OutOfGas) = outcome.error {
                return Err(fail(&mut caller, VmError::OutOfGas));
            }

            let mut response = Vec::with_capacity(9 + outcome.data.len());
            response.push(if outcome.is_success() { 0 } else { 1 });
            response.extend_from_slice(&gas_used.to_be_bytes());
            response.extend_from_slice(&outcome.data);
            let len = response.len() as i64;
            caller.data_mut().response = response;
            Ok(len)
        },
    )?;

    linker.func_wrap(
        "env",
        "deploy",
        |mut caller: Caller<'_, FrameData>,
         code_ptr: i32,
         code_len: i32,
         salt_ptr: i32,
         out_ptr: i32|
         -> Result<i32, wasmi::Error> {
            let bytecode = read_memory(&mut caller, code_ptr, code_len)?;
            let salt_bytes = read_memory(&mut caller, salt_ptr, 32)?;
            let salt = Buf32::from_slice(&salt_bytes).expect("32-byte read");

            let deployer = caller.data().contract;
            let shared = caller.data().shared.clone();
            let address = shared
                .borrow_mut()
                .deploy(&deployer, bytecode, salt)
                .map_err(|e| fail(&mut caller, e))?;

            write_memory(&mut caller, out_ptr, address.as_bytes())?;
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "env",
        "emit",
        |mut caller: Caller<'_, FrameData>,
         type_ptr: i32,
         type_len: i32,
         data_ptr: i32,
         data_len: i32|
         -> Result<(), wasmi::Error> {
            let event_type = read_memory(&mut caller, type_ptr, type_len)?;
            let data = read_memory(&mut caller, data_ptr, data_len)?;
            let contract = caller.data().contract;
            let shared = caller.data().shared.clone();
            let result = shared.borrow_mut().record_event(ContractEvent {
                contract,
                event_type,
                data,
            });
            result.map_err(|e| fail(&mut caller, e))
        },
    )?;

    linker.func_wrap(
        "env",
        "inputs",
        |mut caller: Caller<'_, FrameData>, flags: i32| -> Result<i32, wasmi::Error> {
            let shared = caller.data().shared.clone();
            let response = {
                let env = shared.borrow();
                serialize_inputs(&env.tx_inputs, env.params.max_inputs, flags)
            };
            let len = response.len() as i32;
            caller.data_mut().response = response;
            Ok(len)
        },
    )?;

    linker.func_wrap(
        "env",
        "outputs",
        |mut caller: Caller<'_, FrameData>, flags: i32| -> Result<i32, wasmi::Error> {
            let shared = caller.data().shared.clone();
            let response = {
                let env = shared.borrow();
                serialize_outputs(&env.tx_outputs, env.params.max_outputs, flags)
            };
            let len = response.len() as i32;
            caller.data_mut().response = response;
            Ok(len)
        },
    )?;

    linker.func_wrap(
        "env",
        "response_copy",
        |mut caller: Caller<'_, FrameData>, out_ptr: i32| -> Result<(), wasmi::Error> {
            let response = std::mem::take(&mut caller.data_mut().response);
            write_memory(&mut caller, out_ptr, &response)
        },
    )?;

    Ok(())
}

/// `count:u16be { txid:32 vout:u16be [coinbase:u8] }*`
pub(crate) fn serialize_inputs(inputs: &[TxInputInfo], cap: usize, flags: i32) -> Vec<u8> {
    let take = inputs.len().min(cap);
    let mut out = Vec::new();
    out.extend_from_slice(&(take as u16).to_be_bytes());
    for input in &inputs[..take] {
        out.extend_from_slice(input.outpoint.txid.as_bytes());
        out.extend_from_slice(&input.outpoint.vout.to_be_bytes());
        if flags & VIEW_FLAG_COINBASE != 0 {
            out.push(input.coinbase as u8);
        }
    }
    out
}

/// `count:u16be { index:u16be [value:u64be] [script_len:u16be script]
/// [to_len:u16be to] }*`
pub(crate) fn serialize_outputs(outputs: &[TxOutputInfo], cap: usize, flags: i32) -> Vec<u8> {
    let take = outputs.len().min(cap);
    let mut out = Vec::new();
    out.extend_from_slice(&(take as u16).to_be_bytes());
    for output in &outputs[..take] {
        out.extend_from_slice(&output.index.to_be_bytes());
        if flags & VIEW_FLAG_VALUE != 0 {
            out.extend_from_slice(&output.value.to_be_bytes());
        }
        if flags & VIEW_FLAG_SCRIPT != 0 {
            out.extend_from_slice(&(output.script_pubkey.hex.len() as u16).to_be_bytes());
            out.extend_from_slice(&output.script_pubkey.hex);
        }
        if flags & VIEW_FLAG_TO != 0 {
            let to = output.to.as_deref().unwrap_or_default().as_bytes();
            out.extend_from_slice(&(to.len() as u16).to_be_bytes());
            out.extend_from_slice(to);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use opnet_primitives::OutPointRef;
    use opnet_state::ScriptInfo;

    use super::*;

    #[test]
    fn test_inputs_capped_and_flagged() {
        let inputs: Vec<_> = (0..4)
            .map(|i| TxInputInfo {
                outpoint: OutPointRef::new(Buf32::new([i; 32]), i as u16),
                coinbase: i == 0,
            })
            .collect();

        let bare = serialize_inputs(&inputs, 2, 0);
        assert_eq!(bare.len(), 2 + 2 * 34);
        assert_eq!(&bare[..2], &2u16.to_be_bytes());

        let with_coinbase = serialize_inputs(&inputs, 2, VIEW_FLAG_COINBASE);
        assert_eq!(with_coinbase.len(), 2 + 2 * 35);
        assert_eq!(with_coinbase[2 + 34], 1); // first entry is coinbase
    }

    #[test]
    fn test_outputs_optional_fields() {
        let outputs = vec![TxOutputInfo {
            index: 0,
            value: 5000,
            script_pubkey: ScriptInfo {
                hex: vec![0x51, 0x52],
                address: None,
            },
            to: Some("bcrt1qtest".into()),
        }];

        let bare = serialize_outputs(&outputs, 8, 0);
        assert_eq!(bare.len(), 2 + 2);

        let full = serialize_outputs(
            &outputs,
            8,
            VIEW_FLAG_VALUE | VIEW_FLAG_SCRIPT | VIEW_FLAG_TO,
        );
        // count + index + value + script_len + 2 + to_len + 10
        assert_eq!(full.len(), 2 + 2 + 8 + 2 + 2 + 2 + 10);
    }
}
