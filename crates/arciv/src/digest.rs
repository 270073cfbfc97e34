//! BLAKE3 digests used as content addresses.
//!
//! A [`Digest`] names a file's contents (and therefore its blob) and a
//! commit's tag list. Digests order bytewise, which is the primary key of the
//! canonical tag order.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::str::FromStr;

use hex::FromHex;

use crate::error::Error;

/// A 32-byte BLAKE3 digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 64;

    /// Hash the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a file's contents, streaming it through the hasher.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::with_capacity(128 * 1024, File::open(path)?);
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.finalize().into())
    }

    /// Get the hex-encoded representation of this digest.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether `name` looks like a blob name: exactly 64 hex characters.
    pub fn is_hex_name(name: &str) -> bool {
        name.len() == Self::HEX_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<blake3::Hash> for Digest {
    fn from(value: blake3::Hash) -> Self {
        Self(*value.as_bytes())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(Error::Digest(s.to_string()));
        }
        <[u8; 32]>::from_hex(s)
            .map(Self)
            .map_err(|_| Error::Digest(s.to_string()))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_hex() {
        let digest = Digest::hash(b"hello world");
        let hex = digest.as_hex();
        assert_eq!(hex.len(), 64);
        assert!(Digest::is_hex_name(&hex));
        assert_eq!(hex.parse::<Digest>().unwrap(), digest);
    }

    #[test]
    fn of_file_matches_in_memory_hash() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"test data").unwrap();
        assert_eq!(Digest::of_file(&path).unwrap(), Digest::hash(b"test data"));
    }

    #[test]
    fn rejects_bad_hex() {
        assert!("abc".parse::<Digest>().is_err());
        assert!("zz".repeat(32).parse::<Digest>().is_err());
        assert!(!Digest::is_hex_name(".tmpA1b2C3"));
        assert!(!Digest::is_hex_name(&"a".repeat(63)));
    }

    #[test]
    fn orders_bytewise() {
        let low = Digest::from([0x00; 32]);
        let mut bytes = [0x00; 32];
        bytes[0] = 0x01;
        let high = Digest::from(bytes);
        assert!(low < high);
    }
}
