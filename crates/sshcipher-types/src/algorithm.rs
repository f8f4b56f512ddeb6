/// Cipher mode of operation used by the SSH transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// Cipher Block Chaining.
    Cbc,
    /// Segmented Integer Counter (the SSH "sdctr" construction): the block
    /// encryption of a 128-bit big-endian counter is XORed with the data.
    Ctr,
}

/// Bulk cipher algorithm identifiers, one per SSH transport algorithm name.
///
/// Each identifier fixes a key size and a mode of operation. All of them
/// use a 16-byte block and a 16-byte IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    /// AES-256 CBC under the pre-standard identifier some older peers send.
    RijndaelCbcLysator,
    Aes128Ctr,
    Aes192Ctr,
    Aes256Ctr,
}

impl CipherAlgId {
    /// Client-preference ordering used when advertising these ciphers:
    /// counter modes and larger keys first, CBC as the fallback.
    pub const PREFERENCE: [CipherAlgId; 7] = [
        CipherAlgId::Aes256Ctr,
        CipherAlgId::Aes256Cbc,
        CipherAlgId::RijndaelCbcLysator,
        CipherAlgId::Aes192Ctr,
        CipherAlgId::Aes192Cbc,
        CipherAlgId::Aes128Ctr,
        CipherAlgId::Aes128Cbc,
    ];

    /// The algorithm name as it appears on the wire during negotiation.
    pub const fn name(self) -> &'static str {
        match self {
            CipherAlgId::Aes128Cbc => "aes128-cbc",
            CipherAlgId::Aes192Cbc => "aes192-cbc",
            CipherAlgId::Aes256Cbc => "aes256-cbc",
            CipherAlgId::RijndaelCbcLysator => "rijndael-cbc@lysator.liu.se",
            CipherAlgId::Aes128Ctr => "aes128-ctr",
            CipherAlgId::Aes192Ctr => "aes192-ctr",
            CipherAlgId::Aes256Ctr => "aes256-ctr",
        }
    }

    /// Human-readable description used in logs and UI.
    pub const fn text_name(self) -> &'static str {
        match self {
            CipherAlgId::Aes128Cbc => "AES-128 CBC",
            CipherAlgId::Aes192Cbc => "AES-192 CBC",
            CipherAlgId::Aes256Cbc | CipherAlgId::RijndaelCbcLysator => "AES-256 CBC",
            CipherAlgId::Aes128Ctr => "AES-128 SDCTR",
            CipherAlgId::Aes192Ctr => "AES-192 SDCTR",
            CipherAlgId::Aes256Ctr => "AES-256 SDCTR",
        }
    }

    /// Look up an identifier from its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes128-cbc" => Some(CipherAlgId::Aes128Cbc),
            "aes192-cbc" => Some(CipherAlgId::Aes192Cbc),
            "aes256-cbc" => Some(CipherAlgId::Aes256Cbc),
            "rijndael-cbc@lysator.liu.se" => Some(CipherAlgId::RijndaelCbcLysator),
            "aes128-ctr" => Some(CipherAlgId::Aes128Ctr),
            "aes192-ctr" => Some(CipherAlgId::Aes192Ctr),
            "aes256-ctr" => Some(CipherAlgId::Aes256Ctr),
            _ => None,
        }
    }

    /// Key length in bytes (16, 24, or 32).
    pub const fn key_len(self) -> usize {
        match self {
            CipherAlgId::Aes128Cbc | CipherAlgId::Aes128Ctr => 16,
            CipherAlgId::Aes192Cbc | CipherAlgId::Aes192Ctr => 24,
            CipherAlgId::Aes256Cbc
            | CipherAlgId::RijndaelCbcLysator
            | CipherAlgId::Aes256Ctr => 32,
        }
    }

    /// IV length in bytes.
    pub const fn iv_len(self) -> usize {
        16
    }

    /// Cipher block size in bytes.
    pub const fn block_size(self) -> usize {
        16
    }

    /// The mode of operation this identifier selects.
    pub const fn mode(self) -> CipherMode {
        match self {
            CipherAlgId::Aes128Cbc
            | CipherAlgId::Aes192Cbc
            | CipherAlgId::Aes256Cbc
            | CipherAlgId::RijndaelCbcLysator => CipherMode::Cbc,
            CipherAlgId::Aes128Ctr | CipherAlgId::Aes192Ctr | CipherAlgId::Aes256Ctr => {
                CipherMode::Ctr
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for alg in CipherAlgId::PREFERENCE {
            assert_eq!(CipherAlgId::from_name(alg.name()), Some(alg));
        }
        assert_eq!(CipherAlgId::from_name("aes256-gcm@openssh.com"), None);
        assert_eq!(CipherAlgId::from_name(""), None);
    }

    #[test]
    fn test_preference_covers_every_algorithm() {
        let prefs = CipherAlgId::PREFERENCE;
        for alg in [
            CipherAlgId::Aes128Cbc,
            CipherAlgId::Aes192Cbc,
            CipherAlgId::Aes256Cbc,
            CipherAlgId::RijndaelCbcLysator,
            CipherAlgId::Aes128Ctr,
            CipherAlgId::Aes192Ctr,
            CipherAlgId::Aes256Ctr,
        ] {
            assert!(prefs.contains(&alg), "{} missing from preference list", alg.name());
        }
    }

    #[test]
    fn test_key_lengths() {
        assert_eq!(CipherAlgId::Aes128Cbc.key_len(), 16);
        assert_eq!(CipherAlgId::Aes192Ctr.key_len(), 24);
        assert_eq!(CipherAlgId::Aes256Cbc.key_len(), 32);
        // The lysator identifier is plain AES-256 CBC under another name.
        assert_eq!(CipherAlgId::RijndaelCbcLysator.key_len(), 32);
        assert_eq!(CipherAlgId::RijndaelCbcLysator.mode(), CipherMode::Cbc);
        assert_eq!(
            CipherAlgId::RijndaelCbcLysator.text_name(),
            CipherAlgId::Aes256Cbc.text_name()
        );
    }

    #[test]
    fn test_block_and_iv_sizes() {
        for alg in CipherAlgId::PREFERENCE {
            assert_eq!(alg.block_size(), 16);
            assert_eq!(alg.iv_len(), 16);
        }
    }

    #[test]
    fn test_modes() {
        assert_eq!(CipherAlgId::Aes128Cbc.mode(), CipherMode::Cbc);
        assert_eq!(CipherAlgId::Aes128Ctr.mode(), CipherMode::Ctr);
        assert_eq!(CipherAlgId::Aes256Ctr.mode(), CipherMode::Ctr);
    }
}
