//! SSH transport cipher handles.
//!
//! Binds the negotiated algorithm names to concrete AES configurations. A
//! handle is created for an algorithm before any key material exists; key
//! and IV arrive separately during key exchange, and the handle then
//! encrypts or decrypts packet data in whole blocks.

use sshcipher_types::{CipherAlgId, CipherMode, CryptoError};

use crate::aes::AesCipher;

/// A stateful transport cipher bound to one negotiated algorithm.
///
/// For CTR algorithms `encrypt` and `decrypt` are the same keystream
/// operation, as the transport applies it to both directions.
pub struct SshCipher {
    alg: CipherAlgId,
    cipher: Option<AesCipher>,
    iv: [u8; 16],
}

impl SshCipher {
    /// Create an uninitialized handle for `alg`. No key schedule exists
    /// until [`set_key`](Self::set_key) is called.
    pub fn new(alg: CipherAlgId) -> Self {
        Self {
            alg,
            cipher: None,
            iv: [0u8; 16],
        }
    }

    /// The algorithm this handle was created for.
    pub fn algorithm(&self) -> CipherAlgId {
        self.alg
    }

    /// Install the session key. The length must match the algorithm; the
    /// engine is selected and both schedules are filled here. An IV staged
    /// before key setup is installed into the fresh cipher state.
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        if key.len() != self.alg.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: self.alg.key_len(),
                got: key.len(),
            });
        }
        let mut cipher = AesCipher::new(key)?;
        cipher.set_iv(&self.iv)?;
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Install a 16-byte IV (or initial counter). May be called before or
    /// after `set_key`.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        let iv: [u8; 16] = iv.try_into().map_err(|_| CryptoError::InvalidIvLength)?;
        self.iv = iv;
        if let Some(cipher) = &mut self.cipher {
            cipher.set_iv(&iv)?;
        }
        Ok(())
    }

    /// Encrypt packet data in place (whole blocks).
    pub fn encrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        let cipher = self.cipher.as_mut().ok_or(CryptoError::KeyNotSet)?;
        match self.alg.mode() {
            CipherMode::Cbc => cipher.encrypt_cbc(data),
            CipherMode::Ctr => cipher.sdctr(data),
        }
    }

    /// Decrypt packet data in place (whole blocks).
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        let cipher = self.cipher.as_mut().ok_or(CryptoError::KeyNotSet)?;
        match self.alg.mode() {
            CipherMode::Cbc => cipher.decrypt_cbc(data),
            CipherMode::Ctr => cipher.sdctr(data),
        }
    }
}
