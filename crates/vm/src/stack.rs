use opnet_primitives::Address32;

use crate::VmError;

/// Call stack of contract addresses for one transaction.
///
/// Guards both depth and, when the reentrancy guard is on, calls back into a
/// contract that is already executing somewhere up the stack.
#[derive(Debug, Default, Clone)]
pub struct AddressStack {
    stack: Vec<Address32>,
}

impl AddressStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn contains(&self, address: &Address32) -> bool {
        self.stack.contains(address)
    }

    /// Pushes the callee, enforcing depth and reentrancy rules.
    pub fn enter(
        &mut self,
        address: Address32,
        max_depth: usize,
        reentrancy_guard: bool,
    ) -> Result<(), VmError> {
        if self.stack.len() >= max_depth {
            return Err(VmError::CallStackTooDeep);
        }
        if reentrancy_guard && self.contains(&address) {
            return Err(VmError::Reentrancy(address));
        }
        self.stack.push(address);
        Ok(())
    }

    pub fn exit(&mut self) {
        let popped = self.stack.pop();
        debug_assert!(popped.is_some(), "exit without matching enter");
    }
}
