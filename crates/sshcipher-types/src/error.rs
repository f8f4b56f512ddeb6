/// Cipher operation errors.
///
/// Every fallible operation in the workspace reports one of these. An
/// operation that returns an error has not modified caller memory or any
/// IV/counter state.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key material has an unsupported length (not 16, 24, or 32 bytes).
    #[error("invalid key")]
    InvalidKey,

    /// Key length does not match what the negotiated algorithm requires.
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// IV buffers must be exactly one cipher block (16 bytes).
    #[error("invalid iv length")]
    InvalidIvLength,

    /// Bulk operations process whole blocks only.
    #[error("data length {len} is not a multiple of the cipher block size")]
    InvalidDataLength { len: usize },

    /// A block operation was attempted before `set_key`.
    #[error("cipher used before key setup")]
    KeyNotSet,
}
