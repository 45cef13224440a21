//! Content-addressed object identifier.
//!
//! A 20-byte hash with a total order, a 40-hex `Display`/`FromStr`, and a
//! handful of well-known constants.

use sha1::{Digest, Sha1};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

pub const OID_SIZE: usize = 20;

#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Oid([u8; OID_SIZE]);

impl Oid {
    /// hash of an empty blob (`e69de29b...`)
    pub const EMPTY_BLOB: Self = Self([
        0xe6, 0x9d, 0xe2, 0x9b, 0xb2, 0xd1, 0xd6, 0x43, 0x4b, 0x8b, 0x29, 0xae, 0x77, 0x5a, 0xd8,
        0xc2, 0xe4, 0x8c, 0x53, 0x91,
    ]);

    /// hash of an empty tree (`4b825dc6...`)
    pub const EMPTY_TREE: Self = Self([
        0x4b, 0x82, 0x5d, 0xc6, 0x42, 0xcb, 0x6e, 0xb9, 0xa0, 0x60, 0xe5, 0x4b, 0xf8, 0xd6, 0x92,
        0x88, 0xfb, 0xee, 0x49, 0x04,
    ]);

    /// placeholder for "no object" (e.g. an absent side of a delta)
    pub const ZERO: Self = Self([0; OID_SIZE]);

    #[inline]
    pub fn new(bytes: [u8; OID_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; OID_SIZE] {
        &self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn short(self) -> String {
        self.to_hex()[..7].to_owned()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid object id `{0}`")]
pub struct ParseOidError(String);

impl FromStr for Oid {
    type Err = ParseOidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end();
        if s.len() != 40 {
            return Err(ParseOidError(s.to_owned()));
        }
        let mut bytes = [0u8; OID_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseOidError(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl Debug for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if f.alternate() { write!(f, "{}", &hex[..7]) } else { write!(f, "{}", hex) }
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Oid {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut bytes = [0u8; OID_SIZE];
        bytes.iter_mut().for_each(|b| *b = u8::arbitrary(g));
        Self(bytes)
    }
}
