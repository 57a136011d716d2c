//! Identifier newtypes for chains, subnets, and peers.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing identifiers from strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The string is not valid base58.
    #[error("invalid base58 string")]
    InvalidBase58,

    /// The decoded bytes have the wrong length.
    #[error("invalid identifier length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual decoded length.
        actual: usize,
    },
}

macro_rules! byte_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Size of the identifier in bytes.
            pub const BYTES: usize = $len;

            /// Create an identifier from raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let encoded = bs58::encode(&self.0).into_string();
                let head = &encoded[..encoded.len().min(8)];
                write!(f, "{}({}..)", stringify!($name), head)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let decoded = bs58::decode(s)
                    .into_vec()
                    .map_err(|_| IdParseError::InvalidBase58)?;
                let bytes: [u8; $len] =
                    decoded
                        .try_into()
                        .map_err(|v: Vec<u8>| IdParseError::InvalidLength {
                            expected: $len,
                            actual: v.len(),
                        })?;
                Ok(Self(bytes))
            }
        }
    };
}

byte_id!(
    /// Identifier of a blockchain within the federated network.
    ChainId,
    32
);

byte_id!(
    /// Identifier of a signing subnet.
    ///
    /// [`SubnetId::PRIMARY`] (all zero) is the primary network; callers pass it
    /// to mean "derive the signing subnet from the message's source chain".
    SubnetId,
    32
);

byte_id!(
    /// Identifier of a peer node. A validator may operate several nodes.
    NodeId,
    20
);

impl SubnetId {
    /// The primary network subnet (all-zero identifier).
    pub const PRIMARY: Self = Self([0u8; 32]);

    /// Whether this is the primary network subnet.
    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58_roundtrip() {
        let id = ChainId::from_bytes([7u8; 32]);
        let encoded = id.to_string();
        let parsed: ChainId = encoded.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        // A NodeId string decodes to 20 bytes, not 32.
        let node = NodeId::from_bytes([3u8; 20]);
        let err = node.to_string().parse::<SubnetId>().unwrap_err();
        assert_eq!(
            err,
            IdParseError::InvalidLength {
                expected: 32,
                actual: 20
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_base58() {
        // '0' is not part of the base58 alphabet.
        assert_eq!(
            "0O0O".parse::<ChainId>().unwrap_err(),
            IdParseError::InvalidBase58
        );
    }

    #[test]
    fn test_primary_subnet() {
        assert!(SubnetId::PRIMARY.is_primary());
        assert!(!SubnetId::from_bytes([1u8; 32]).is_primary());
        assert_eq!(SubnetId::default(), SubnetId::PRIMARY);
    }
}
