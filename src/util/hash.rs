//! SHA-512 helpers used for dataset checksums and collection stream hashes.

use std::io::{self, Read};

use sha2::{Digest, Sha512};

/// Hex-encoded SHA-512 of everything readable from `reader`.
pub fn sha512_hex_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha512::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-512 of a byte slice.
pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}
