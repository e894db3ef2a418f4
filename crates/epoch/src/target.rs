use opnet_primitives::Buf32;
use sha1::{Digest, Sha1};

/// SHA-1 digest width.
pub const CANDIDATE_LEN: usize = 20;

/// An epoch's mining target.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EpochTarget {
    pub epoch_number: u64,
    /// Checksum root of the seeding block.
    pub target: Buf32,
    /// `SHA1(target)`, left-padded to 32 bytes for storage and wire use.
    pub target_hash: Buf32,
}

impl EpochTarget {
    /// The raw 20-byte digest miners race against.
    pub fn target_digest(&self) -> [u8; CANDIDATE_LEN] {
        self.target_hash.as_bytes()[32 - CANDIDATE_LEN..]
            .try_into()
            .expect("fixed suffix")
    }
}

/// Derives epoch `epoch_number`'s target from the seeding block's checksum
/// root.
pub fn derive_epoch_target(epoch_number: u64, checksum_root: Buf32) -> EpochTarget {
    let digest: [u8; CANDIDATE_LEN] = Sha1::digest(checksum_root.as_bytes()).into();

    let mut padded = [0u8; 32];
    padded[32 - CANDIDATE_LEN..].copy_from_slice(&digest);

    EpochTarget {
        epoch_number,
        target: checksum_root,
        target_hash: Buf32::new(padded),
    }
}

/// `SHA1(target ⊕ pubkey ⊕ salt)`, the miner's candidate digest.
pub fn solution_candidate(target: &Buf32, pubkey: &Buf32, salt: &Buf32) -> [u8; CANDIDATE_LEN] {
    let mut preimage = [0u8; 32];
    for (i, byte) in preimage.iter_mut().enumerate() {
        *byte = target.as_bytes()[i] ^ pubkey.as_bytes()[i] ^ salt.as_bytes()[i];
    }
    Sha1::digest(preimage).into()
}

/// Counts leading bits on which `a` and `b` agree, MSB of byte 0 first.
///
/// Both inputs are raw 20-byte SHA-1 digests; the count stops at the first
/// mismatch and ranges 0..=160.
pub fn matching_bits(a: &[u8; CANDIDATE_LEN], b: &[u8; CANDIDATE_LEN]) -> u32 {
    let mut bits = 0u32;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x ^ y;
        if diff == 0 {
            bits += 8;
            continue;
        }
        bits += diff.leading_zeros();
        break;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_digests_match_160_bits() {
        let digest = [0xabu8; CANDIDATE_LEN];
        assert_eq!(matching_bits(&digest, &digest), 160);
    }

    #[test]
    fn test_first_bit_mismatch_is_zero() {
        let a = [0x00u8; CANDIDATE_LEN];
        let mut b = [0x00u8; CANDIDATE_LEN];
        b[0] = 0x80;
        assert_eq!(matching_bits(&a, &b), 0);
    }

    #[test]
    fn test_partial_byte_match() {
        let a = [0b1010_0000u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let b = [0b1010_1000u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        // first four bits agree, fifth differs
        assert_eq!(matching_bits(&a, &b), 4);
    }

    #[test]
    fn test_mismatch_in_later_byte() {
        let a = [0u8; CANDIDATE_LEN];
        let mut b = [0u8; CANDIDATE_LEN];
        b[2] = 0x01;
        // two full bytes plus seven leading zero bits of the third
        assert_eq!(matching_bits(&a, &b), 23);
    }

    #[test]
    fn test_target_hash_is_left_padded_sha1() {
        let root = Buf32::new([0x11; 32]);
        let target = derive_epoch_target(3, root);

        assert_eq!(target.epoch_number, 3);
        assert_eq!(target.target, root);
        assert_eq!(&target.target_hash.as_bytes()[..12], &[0u8; 12]);
        assert_eq!(
            target.target_digest(),
            <[u8; 20]>::from(Sha1::digest(root.as_bytes()))
        );
    }

    #[test]
    fn test_candidate_xor_order_independent_of_operands() {
        let target = Buf32::new([0x0fu8; 32]);
        let pk = Buf32::new([0xf0u8; 32]);
        let salt = Buf32::new([0xaau8; 32]);

        // xor is commutative; swapping pk and salt yields the same preimage
        assert_eq!(
            solution_candidate(&target, &pk, &salt),
            solution_candidate(&target, &salt, &pk)
        );
    }

    #[test]
    fn test_candidate_matches_manual_xor() {
        // target 0x00..01, pk 0x00..03, salt 0x00..02
        let mut target = [0u8; 32];
        target[31] = 0x01;
        let mut pk = [0u8; 32];
        pk[31] = 0x03;
        let mut salt = [0u8; 32];
        salt[31] = 0x02;

        let mut preimage = [0u8; 32];
        preimage[31] = 0x01 ^ 0x03 ^ 0x02;
        let expected: [u8; 20] = Sha1::digest(preimage).into();

        assert_eq!(
            solution_candidate(&Buf32::new(target), &Buf32::new(pk), &Buf32::new(salt)),
            expected
        );
    }
}
