use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::Buf32;
use serde::{Deserialize, Serialize};

/// Directory row mapping one legacy key to every standard address form.
///
/// `public_key` is only present once the full key has been observed on-chain
/// (input scripts reveal it, outputs alone do not).
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct PublicKeyDirectoryEntry {
    #[serde(with = "hex_opt")]
    pub public_key: Option<Vec<u8>>,
    pub tweaked_public_key: Buf32,
    /// Legacy address forms; only derivable when the full key is known.
    pub p2pkh: Option<String>,
    pub p2sh_p2wpkh: Option<String>,
    pub p2tr: String,
    pub p2wpkh: Option<String>,
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
