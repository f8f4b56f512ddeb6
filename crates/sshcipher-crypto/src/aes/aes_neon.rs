//! Hardware AES engine using the ARMv8 Crypto Extensions.
//!
//! Only compiled on `aarch64` (gated at the module declaration in
//! `mod.rs`); selected at runtime when the CPU reports the AES
//! extension. The key schedule is expanded in software and serialized to
//! `[u8; 16]` round-key blocks for `vld1q_u8`; the inverse schedule is
//! derived with `AESIMC`. The bulk CBC/SDCTR loops keep the chaining
//! value in a register across blocks.

use core::arch::aarch64::{
    vaesdq_u8, vaeseq_u8, vaesimcq_u8, vaesmcq_u8, veorq_u8, vld1q_u8, vst1q_u8,
};
use std::arch::is_aarch64_feature_detected;

use sshcipher_types::CryptoError;
use zeroize::Zeroize;

use super::soft;
use super::AES_BLOCK_SIZE;

/// Runtime check for the ARMv8 AES extension.
pub(crate) fn available() -> bool {
    is_aarch64_feature_detected!("aes")
}

/// Expand a raw key and serialize the schedule words into round-key
/// blocks ready for `vld1q_u8`.
fn expand_round_keys(key: &[u8]) -> Result<(Vec<[u8; 16]>, usize), CryptoError> {
    let (mut words, rounds) = soft::expand_key_words(key)?;

    let mut keys = vec![[0u8; 16]; rounds + 1];
    for (r, blk) in keys.iter_mut().enumerate() {
        for col in 0..4 {
            blk[col * 4..col * 4 + 4].copy_from_slice(&words[r * 4 + col].to_be_bytes());
        }
    }
    words.zeroize();

    Ok((keys, rounds))
}

/// Derive the inverse-cipher round keys: forward keys in reverse round
/// order, the inner ones through `AESIMC`, the endpoints copied.
#[target_feature(enable = "aes,neon")]
unsafe fn prepare_dec_keys(enc_keys: &[[u8; 16]], rounds: usize) -> Vec<[u8; 16]> {
    let mut dec = vec![[0u8; 16]; rounds + 1];
    dec[0] = enc_keys[rounds];
    for i in 1..rounds {
        let rk = vld1q_u8(enc_keys[rounds - i].as_ptr());
        vst1q_u8(dec[i].as_mut_ptr(), vaesimcq_u8(rk));
    }
    dec[rounds] = enc_keys[0];
    dec
}

#[target_feature(enable = "aes,neon")]
unsafe fn cbc_encrypt_blocks(
    enc_keys: &[[u8; 16]],
    rounds: usize,
    iv: &mut [u8; 16],
    data: &mut [u8],
) {
    let mut chain = vld1q_u8(iv.as_ptr());
    for blk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        let mut state = veorq_u8(vld1q_u8(blk.as_ptr()), chain);
        // AESE folds the round-key XOR in front of SubBytes/ShiftRows, so
        // the loop feeds keys 0..rounds-2 and the last two are separate.
        for rk in enc_keys.iter().take(rounds - 1) {
            state = vaesmcq_u8(vaeseq_u8(state, vld1q_u8(rk.as_ptr())));
        }
        state = vaeseq_u8(state, vld1q_u8(enc_keys[rounds - 1].as_ptr()));
        state = veorq_u8(state, vld1q_u8(enc_keys[rounds].as_ptr()));
        vst1q_u8(blk.as_mut_ptr(), state);
        chain = state;
    }
    vst1q_u8(iv.as_mut_ptr(), chain);
}

#[target_feature(enable = "aes,neon")]
unsafe fn cbc_decrypt_blocks(
    dec_keys: &[[u8; 16]],
    rounds: usize,
    iv: &mut [u8; 16],
    data: &mut [u8],
) {
    let mut chain = vld1q_u8(iv.as_ptr());
    for blk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        let ct = vld1q_u8(blk.as_ptr());
        let mut state = ct;
        for rk in dec_keys.iter().take(rounds - 1) {
            state = vaesimcq_u8(vaesdq_u8(state, vld1q_u8(rk.as_ptr())));
        }
        state = vaesdq_u8(state, vld1q_u8(dec_keys[rounds - 1].as_ptr()));
        state = veorq_u8(state, vld1q_u8(dec_keys[rounds].as_ptr()));
        state = veorq_u8(state, chain);
        vst1q_u8(blk.as_mut_ptr(), state);
        chain = ct;
    }
    vst1q_u8(iv.as_mut_ptr(), chain);
}

#[target_feature(enable = "aes,neon")]
unsafe fn sdctr_blocks(enc_keys: &[[u8; 16]], rounds: usize, iv: &mut [u8; 16], data: &mut [u8]) {
    let mut ctr = *iv;
    for blk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        let mut state = vld1q_u8(ctr.as_ptr());
        for rk in enc_keys.iter().take(rounds - 1) {
            state = vaesmcq_u8(vaeseq_u8(state, vld1q_u8(rk.as_ptr())));
        }
        state = vaeseq_u8(state, vld1q_u8(enc_keys[rounds - 1].as_ptr()));
        state = veorq_u8(state, vld1q_u8(enc_keys[rounds].as_ptr()));
        state = veorq_u8(state, vld1q_u8(blk.as_ptr()));
        vst1q_u8(blk.as_mut_ptr(), state);

        // One 128-bit big-endian integer, wrapping modulo 2^128.
        ctr = u128::from_be_bytes(ctr).wrapping_add(1).to_be_bytes();
    }
    *iv = ctr;
}

/// AES engine backed by the ARMv8 Crypto Extensions.
#[derive(Clone)]
pub(crate) struct NeonAes {
    enc_keys: Vec<[u8; 16]>,
    dec_keys: Vec<[u8; 16]>,
    rounds: usize,
    iv: [u8; 16],
}

impl Drop for NeonAes {
    fn drop(&mut self) {
        for k in &mut self.enc_keys {
            k.zeroize();
        }
        for k in &mut self.dec_keys {
            k.zeroize();
        }
        self.iv.zeroize();
    }
}

impl NeonAes {
    /// Expand both schedules. Must only be called after [`available`]
    /// has returned true.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let (enc_keys, rounds) = expand_round_keys(key)?;

        // Safety: the engine is only constructed once `available()` has
        // confirmed the AES extension.
        let dec_keys = unsafe { prepare_dec_keys(&enc_keys, rounds) };

        Ok(Self {
            enc_keys,
            dec_keys,
            rounds,
            iv: [0u8; 16],
        })
    }

    /// Install a 16-byte IV, stored as raw bytes.
    pub fn set_iv(&mut self, iv: &[u8; 16]) {
        self.iv = *iv;
    }

    pub fn iv_bytes(&self) -> [u8; 16] {
        self.iv
    }

    pub fn cbc_encrypt(&mut self, data: &mut [u8]) {
        // Safety: construction implies AES extension support.
        unsafe { cbc_encrypt_blocks(&self.enc_keys, self.rounds, &mut self.iv, data) }
    }

    pub fn cbc_decrypt(&mut self, data: &mut [u8]) {
        // Safety: construction implies AES extension support.
        unsafe { cbc_decrypt_blocks(&self.dec_keys, self.rounds, &mut self.iv, data) }
    }

    pub fn sdctr(&mut self, data: &mut [u8]) {
        // Safety: construction implies AES extension support.
        unsafe { sdctr_blocks(&self.enc_keys, self.rounds, &mut self.iv, data) }
    }
}

#[cfg(test)]
mod tests {
    use super::super::soft::SoftAes;
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(13).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn neon_aes128_known_answer() {
        if !available() {
            return;
        }
        let key = hex("000102030405060708090a0b0c0d0e0f");
        let mut neon = NeonAes::new(&key).unwrap();
        neon.set_iv(&[0u8; 16]);
        let mut blk = hex("00112233445566778899aabbccddeeff");
        neon.cbc_encrypt(&mut blk);
        assert_eq!(blk, hex("69c4e0d86a7b0430d8cdb78070b4c55a"));
    }

    #[test]
    fn neon_matches_software_all_key_sizes() {
        if !available() {
            return;
        }
        for key_len in [16usize, 24, 32] {
            let key = pattern(key_len, 0x21);
            let iv = pattern(16, 0x42);
            let data = pattern(320, 0x63);

            let mut hw = NeonAes::new(&key).unwrap();
            let mut sw = SoftAes::new(&key).unwrap();
            hw.set_iv(iv.as_slice().try_into().unwrap());
            sw.set_iv(iv.as_slice().try_into().unwrap());

            let mut hw_buf = data.clone();
            let mut sw_buf = data.clone();
            hw.cbc_encrypt(&mut hw_buf);
            sw.cbc_encrypt(&mut sw_buf);
            assert_eq!(hw_buf, sw_buf, "AES-{}: CBC encrypt differs", key_len * 8);
            assert_eq!(hw.iv_bytes(), sw.iv_bytes());

            hw.cbc_decrypt(&mut hw_buf);
            sw.cbc_decrypt(&mut sw_buf);
            assert_eq!(hw_buf, sw_buf, "AES-{}: CBC decrypt differs", key_len * 8);
            assert_eq!(hw.iv_bytes(), sw.iv_bytes());

            hw.set_iv(iv.as_slice().try_into().unwrap());
            sw.set_iv(iv.as_slice().try_into().unwrap());
            hw.sdctr(&mut hw_buf);
            sw.sdctr(&mut sw_buf);
            assert_eq!(hw_buf, sw_buf, "AES-{}: SDCTR differs", key_len * 8);
            assert_eq!(hw.iv_bytes(), sw.iv_bytes());
        }
    }

    #[test]
    fn neon_counter_wraps() {
        if !available() {
            return;
        }
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let mut neon = NeonAes::new(&key).unwrap();
        neon.set_iv(&[0xff; 16]);
        let mut blk = [0u8; 16];
        neon.sdctr(&mut blk);
        assert_eq!(neon.iv_bytes(), [0u8; 16]);
    }

    #[test]
    fn neon_invalid_key_length() {
        assert!(NeonAes::new(&[0u8; 15]).is_err());
        assert!(NeonAes::new(&[0u8; 17]).is_err());
    }
}
