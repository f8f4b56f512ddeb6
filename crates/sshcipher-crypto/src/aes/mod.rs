//! AES block cipher for the SSH transport layer.
//!
//! Provides AES-128, AES-192, and AES-256 in the two bulk constructions the
//! transport uses: CBC and segmented-integer-counter (SDCTR) keystream. A
//! cipher object owns its expanded key schedules and its IV/counter state,
//! so repeated calls continue exactly where the previous call stopped.
//!
//! The engine behind a cipher object is chosen once, at key setup: AES-NI
//! on x86-64 and the ARMv8 Crypto Extensions on aarch64 when the CPU
//! reports them, otherwise the portable table-based engine in
//! [`soft`]. All engines produce byte-identical output.

use sshcipher_types::CryptoError;

#[cfg(target_arch = "aarch64")]
mod aes_neon;
#[cfg(target_arch = "x86_64")]
mod aes_ni;
mod soft;

/// AES block size in bytes (128 bits).
pub const AES_BLOCK_SIZE: usize = 16;

enum Engine {
    Soft(soft::SoftAes),
    #[cfg(target_arch = "x86_64")]
    Ni(aes_ni::NiAes),
    #[cfg(target_arch = "aarch64")]
    Neon(aes_neon::NeonAes),
}

/// A stateful AES cipher object with persistent IV/counter state.
///
/// The selected engine never changes after construction; key schedules, IV
/// and counter state live inside the engine in its native representation
/// and are zeroed on drop.
pub struct AesCipher {
    engine: Engine,
}

impl AesCipher {
    /// Expand the key and select an engine. Accepts 16, 24, or 32-byte
    /// keys for AES-128, AES-192, and AES-256.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        #[cfg(target_arch = "x86_64")]
        if aes_ni::available() {
            return Ok(Self {
                engine: Engine::Ni(aes_ni::NiAes::new(key)?),
            });
        }
        #[cfg(target_arch = "aarch64")]
        if aes_neon::available() {
            return Ok(Self {
                engine: Engine::Neon(aes_neon::NeonAes::new(key)?),
            });
        }
        Self::new_portable(key)
    }

    /// Force the portable table-based engine regardless of CPU support.
    pub fn new_portable(key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            engine: Engine::Soft(soft::SoftAes::new(key)?),
        })
    }

    /// True when a hardware engine was selected at construction.
    pub fn is_hardware(&self) -> bool {
        !matches!(self.engine, Engine::Soft(_))
    }

    /// Install a 16-byte IV (or initial counter value for SDCTR).
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        let iv: &[u8; 16] = iv.try_into().map_err(|_| CryptoError::InvalidIvLength)?;
        match &mut self.engine {
            Engine::Soft(c) => c.set_iv(iv),
            #[cfg(target_arch = "x86_64")]
            Engine::Ni(c) => c.set_iv(iv),
            #[cfg(target_arch = "aarch64")]
            Engine::Neon(c) => c.set_iv(iv),
        }
        Ok(())
    }

    /// Read the current IV/counter state. After CBC operations this is the
    /// last ciphertext block; after SDCTR it is the next unused counter.
    pub fn iv(&self) -> [u8; 16] {
        match &self.engine {
            Engine::Soft(c) => c.iv_bytes(),
            #[cfg(target_arch = "x86_64")]
            Engine::Ni(c) => c.iv_bytes(),
            #[cfg(target_arch = "aarch64")]
            Engine::Neon(c) => c.iv_bytes(),
        }
    }

    fn check_span(data: &[u8]) -> Result<(), CryptoError> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidDataLength { len: data.len() });
        }
        Ok(())
    }

    /// CBC-encrypt `data` in place. The length must be a multiple of 16
    /// bytes (zero blocks is a no-op); the IV advances to the last
    /// ciphertext block produced.
    pub fn encrypt_cbc(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        Self::check_span(data)?;
        match &mut self.engine {
            Engine::Soft(c) => c.cbc_encrypt(data),
            #[cfg(target_arch = "x86_64")]
            Engine::Ni(c) => c.cbc_encrypt(data),
            #[cfg(target_arch = "aarch64")]
            Engine::Neon(c) => c.cbc_encrypt(data),
        }
        Ok(())
    }

    /// CBC-decrypt `data` in place. The IV advances to the last ciphertext
    /// block consumed.
    pub fn decrypt_cbc(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        Self::check_span(data)?;
        match &mut self.engine {
            Engine::Soft(c) => c.cbc_decrypt(data),
            #[cfg(target_arch = "x86_64")]
            Engine::Ni(c) => c.cbc_decrypt(data),
            #[cfg(target_arch = "aarch64")]
            Engine::Neon(c) => c.cbc_decrypt(data),
        }
        Ok(())
    }

    /// Apply the SDCTR keystream to `data` in place; encryption and
    /// decryption are the same operation. The counter is one 128-bit
    /// big-endian integer, wraps modulo 2^128, and is left at the next
    /// unused value.
    pub fn sdctr(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        Self::check_span(data)?;
        match &mut self.engine {
            Engine::Soft(c) => c.sdctr(data),
            #[cfg(target_arch = "x86_64")]
            Engine::Ni(c) => c.sdctr(data),
            #[cfg(target_arch = "aarch64")]
            Engine::Neon(c) => c.sdctr(data),
        }
        Ok(())
    }
}

/// One-shot AES-256-CBC encryption with an all-zero IV, used for saved
/// key files. The transient cipher state is wiped on return.
pub fn encrypt_pubkey(key: &[u8; 32], data: &mut [u8]) -> Result<(), CryptoError> {
    let mut cipher = AesCipher::new(key)?;
    cipher.set_iv(&[0u8; 16])?;
    cipher.encrypt_cbc(data)
}

/// Inverse of [`encrypt_pubkey`].
pub fn decrypt_pubkey(key: &[u8; 32], data: &mut [u8]) -> Result<(), CryptoError> {
    let mut cipher = AesCipher::new(key)?;
    cipher.set_iv(&[0u8; 16])?;
    cipher.decrypt_cbc(data)
}
