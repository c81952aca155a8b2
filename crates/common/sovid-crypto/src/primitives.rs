use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when parsing fixed-width byte strings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BytesError {
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected_len} bytes, found {found_len} bytes")]
    InvalidLength { expected_len: usize, found_len: usize },
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, BytesError> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| BytesError::InvalidLength {
                    expected_len: $len,
                    found_len: bytes.len(),
                })?;
                Ok(Self(array))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = BytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(digits)?;
                Self::from_slice(&bytes)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// A 20-byte account address: an identity, a plain account or a contract.
    Address,
    20
);

fixed_bytes!(
    /// A 32-byte keccak-256 digest.
    H256,
    32
);

impl Address {
    /// The address occupying the low 20 bytes of a 32-byte word.
    pub fn from_word(word: &H256) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&word.0[12..]);
        Self(out)
    }
}
