#![doc = "AES bulk ciphers for the SSH transport layer."]
//!
//! The [`aes`] module holds the cipher engine: AES-128/192/256 with CBC
//! and segmented-integer-counter bulk modes, a portable table-based
//! implementation, and hardware engines selected at runtime on x86-64
//! (AES-NI) and aarch64 (Crypto Extensions). The [`ssh`] module binds the
//! engine to the transport algorithm names.

pub mod aes;
pub mod ssh;

pub use aes::{decrypt_pubkey, encrypt_pubkey, AesCipher, AES_BLOCK_SIZE};
pub use ssh::SshCipher;
