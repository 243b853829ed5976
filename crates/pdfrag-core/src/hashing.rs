use md5::{Digest, Md5};

/// Lowercase hex MD5 of `bytes`. Used for cache keys and store directory names.
pub fn md5_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes.as_ref());
    format!("{:x}", hasher.finalize())
}

