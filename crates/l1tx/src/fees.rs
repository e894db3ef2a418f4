use bitcoin::Transaction;

/// Sats committed to provably unspendable outputs.
///
/// This is the burned portion of the fee: it prices gas and orders
/// transaction groups in the sorter. The remainder of the Bitcoin fee goes
/// to the block producer and is invisible here.
pub fn burned_output_value(tx: &Transaction) -> u64 {
    tx.output
        .iter()
        .filter(|out| out.script_pubkey.is_op_return())
        .map(|out| out.value.to_sat())
        .sum()
}
