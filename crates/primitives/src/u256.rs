//! 256-bit integers at hashing and storage boundaries.
//!
//! Contract storage slots and values travel as 32-byte big-endian words; all
//! arithmetic happens on [`U256`]. [`Uint256`] is the persistable wrapper
//! with borsh/serde codecs.

use std::fmt;

use borsh::{
    io::{Read, Write},
    BorshDeserialize, BorshSerialize,
};
pub use ethnum::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Big-endian 32-byte encoding, the canonical wire/storage form.
pub fn u256_to_be_bytes(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

/// Decodes a big-endian 32-byte word.
pub fn u256_from_be_bytes(bytes: [u8; 32]) -> U256 {
    U256::from_be_bytes(bytes)
}

/// A [`U256`] that can cross DB and RPC boundaries.
///
/// Borsh-encodes as 32 big-endian bytes; JSON form is a decimal string.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uint256(pub U256);

impl Uint256 {
    pub const ZERO: Uint256 = Uint256(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn get(&self) -> U256 {
        self.0
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BorshSerialize for Uint256 {
    fn serialize<W: Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        writer.write_all(&self.0.to_be_bytes())
    }
}

impl BorshDeserialize for Uint256 {
    fn deserialize_reader<R: Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let mut bytes = [0u8; 32];
        reader.read_exact(&mut bytes)?;
        Ok(Self(U256::from_be_bytes(bytes)))
    }
}

impl Serialize for Uint256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Uint256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        let value = s.parse::<U256>().map_err(de::Error::custom)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_roundtrip() {
        let v = U256::from(0xdead_beefu64) << 64;
        assert_eq!(u256_from_be_bytes(u256_to_be_bytes(v)), v);
    }

    #[test]
    fn test_be_ordering_matches_numeric() {
        let small = U256::from(5u8);
        let big = U256::from(1u8) << 200;
        assert!(u256_to_be_bytes(small) < u256_to_be_bytes(big));
    }

    #[test]
    fn test_uint256_borsh_is_fixed_width_be() {
        let v = Uint256::from(258u64);
        let enc = borsh::to_vec(&v).unwrap();
        assert_eq!(enc.len(), 32);
        assert_eq!(enc[30], 1);
        assert_eq!(enc[31], 2);
        let back: Uint256 = borsh::from_slice(&enc).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_uint256_json_is_decimal_string() {
        let v = Uint256::from(1000u64);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1000\"");
        let back: Uint256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
