//! OP_NET envelope discovery.
//!
//! The envelope lives in a tapscript revealed by a script-path spend. Layout
//! (as script pushes, non-push opcodes are structural and ignored):
//!
//! ```text
//! [OPNET_MAGIC (4)] [miner ML-DSA hashed pubkey (32)] [challenge preimage (32)]
//! [feature stream chunk]*
//! ```
//!
//! Chunks after the preimage are concatenated into one feature stream, which
//! sidesteps the 520-byte push limit for large calldata and bytecode.

use bitcoin::{Script, Transaction};
use opnet_primitives::Buf32;

use crate::{
    constants::{OPNET_MAGIC, TAPROOT_CONTROL_BASE},
    errors::L1TxError,
};

/// A located OP_NET envelope, not yet feature-parsed.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Input whose witness revealed the envelope.
    pub input_index: usize,
    /// X-only internal key from the control block; the sender identity.
    pub internal_key: Buf32,
    pub miner_mldsa_hashed_pubkey: Buf32,
    pub challenge_preimage: Buf32,
    /// Concatenated feature chunks, terminated by the sentinel flag.
    pub feature_stream: Vec<u8>,
}

/// Scans a transaction's witnesses for the OP_NET envelope.
///
/// `None` means no input carries the magic: the transaction is generic.
/// `Some(Err(_))` means the magic was present but the envelope is malformed.
pub fn extract_envelope(tx: &Transaction) -> Option<Result<Envelope, L1TxError>> {
    for (input_index, input) in tx.input.iter().enumerate() {
        let elements: Vec<&[u8]> = input.witness.iter().collect();
        if elements.len() < 2 {
            continue;
        }

        // script-path spend: [.., script, control block], annex-free
        let control = elements[elements.len() - 1];
        if control.len() < 33 || control[0] & 0xfe != TAPROOT_CONTROL_BASE {
            continue;
        }
        let script = Script::from_bytes(elements[elements.len() - 2]);

        match parse_envelope_script(script) {
            None => continue,
            Some(Ok((hashed_pubkey, preimage, stream))) => {
                let internal_key = Buf32::from_slice(&control[1..33]).expect("33-byte prefix");
                return Some(Ok(Envelope {
                    input_index,
                    internal_key,
                    miner_mldsa_hashed_pubkey: hashed_pubkey,
                    challenge_preimage: preimage,
                    feature_stream: stream,
                }));
            }
            Some(Err(e)) => return Some(Err(e)),
        }
    }
    None
}

/// Returns `None` when the script carries no magic, `Some` once it does.
fn parse_envelope_script(script: &Script) -> Option<Result<(Buf32, Buf32, Vec<u8>), L1TxError>> {
    let mut pushes = Vec::new();
    for instruction in script.instructions() {
        match instruction {
            Ok(inst) => {
                if let Some(bytes) = inst.push_bytes() {
                    pushes.push(bytes.as_bytes().to_vec());
                }
            }
            Err(_) => {
                // only an error if we already saw the magic; otherwise this
                // is just somebody else's script
                if pushes.iter().any(|p| p.as_slice() == OPNET_MAGIC) {
                    return Some(Err(L1TxError::invalid("malformed envelope script")));
                }
                return None;
            }
        }
    }

    let magic_at = pushes.iter().position(|p| p.as_slice() == OPNET_MAGIC)?;
    let rest = &pushes[magic_at + 1..];

    Some(parse_envelope_pushes(rest))
}

fn parse_envelope_pushes(pushes: &[Vec<u8>]) -> Result<(Buf32, Buf32, Vec<u8>), L1TxError> {
    let (hashed_pubkey, rest) = pushes
        .split_first()
        .ok_or_else(|| L1TxError::invalid("missing miner pubkey push"))?;
    let hashed_pubkey = Buf32::from_slice(hashed_pubkey)
        .map_err(|_| L1TxError::invalid("miner pubkey push must be 32 bytes"))?;

    let (preimage, chunks) = rest
        .split_first()
        .ok_or_else(|| L1TxError::invalid("missing challenge preimage push"))?;
    let preimage = Buf32::from_slice(preimage)
        .map_err(|_| L1TxError::invalid("challenge preimage push must be 32 bytes"))?;

    let mut stream = Vec::new();
    for chunk in chunks {
        stream.extend_from_slice(chunk);
    }

    Ok((hashed_pubkey, preimage, stream))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use bitcoin::{
        absolute::LockTime,
        opcodes::{OP_FALSE, all::{OP_ENDIF, OP_IF}},
        script::{Builder, PushBytesBuf},
        transaction::Version,
        Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
    };

    use super::*;

    /// Builds a reveal-style transaction carrying the given feature stream.
    pub(crate) fn make_envelope_tx(
        internal_key: [u8; 32],
        hashed_pubkey: [u8; 32],
        preimage: [u8; 32],
        feature_stream: &[u8],
        outputs: Vec<TxOut>,
    ) -> Transaction {
        let mut builder = Builder::new()
            .push_opcode(OP_FALSE)
            .push_opcode(OP_IF)
            .push_slice(OPNET_MAGIC)
            .push_slice(hashed_pubkey)
            .push_slice(preimage);
        for chunk in feature_stream.chunks(500) {
            let mut push = PushBytesBuf::new();
            push.extend_from_slice(chunk).unwrap();
            builder = builder.push_slice(push);
        }
        let script = builder.push_opcode(OP_ENDIF).into_script();

        let mut control = vec![TAPROOT_CONTROL_BASE];
        control.extend_from_slice(&internal_key);

        let mut witness = Witness::new();
        witness.push(&[0u8; 64]); // placeholder signature
        witness.push(script.as_bytes());
        witness.push(&control);

        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness,
            }],
            output: outputs,
        }
    }

    pub(crate) fn dummy_output(value: u64) -> TxOut {
        TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_utils::*, *};

    #[test]
    fn test_extracts_envelope() {
        let tx = make_envelope_tx(
            [7; 32],
            [1; 32],
            [2; 32],
            &[0xaa; 700],
            vec![dummy_output(1000)],
        );

        let envelope = extract_envelope(&tx).unwrap().unwrap();
        assert_eq!(envelope.input_index, 0);
        assert_eq!(envelope.internal_key, Buf32::new([7; 32]));
        assert_eq!(envelope.miner_mldsa_hashed_pubkey, Buf32::new([1; 32]));
        assert_eq!(envelope.challenge_preimage, Buf32::new([2; 32]));
        // chunked pushes are reassembled
        assert_eq!(envelope.feature_stream, vec![0xaa; 700]);
    }

    #[test]
    fn test_non_opnet_tx_is_none() {
        let mut tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &[], vec![dummy_output(1000)]);
        // strip the witness: a plain keyspend has no envelope
        tx.input[0].witness = bitcoin::Witness::new();
        assert!(extract_envelope(&tx).is_none());
    }

    #[test]
    fn test_short_pubkey_push_is_error() {
        use bitcoin::script::Builder;

        let script = Builder::new()
            .push_slice(OPNET_MAGIC)
            .push_slice([1u8; 16]) // wrong length
            .into_script();

        let mut control = vec![TAPROOT_CONTROL_BASE];
        control.extend_from_slice(&[7u8; 32]);

        let mut witness = bitcoin::Witness::new();
        witness.push(script.as_bytes());
        witness.push(&control);

        let mut tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &[], vec![dummy_output(1)]);
        tx.input[0].witness = witness;

        let result = extract_envelope(&tx).unwrap();
        assert!(matches!(result, Err(L1TxError::InvalidEncoding(_))));
    }
}
