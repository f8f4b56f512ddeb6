#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Input layout: 1 byte key-size selector, key, 16-byte IV, payload.
    if data.is_empty() {
        return;
    }
    let key_len = [16, 24, 32][(data[0] % 3) as usize];
    let rest = &data[1..];
    if rest.len() < key_len + 16 {
        return;
    }
    let (key, rest) = rest.split_at(key_len);
    let (iv, body) = rest.split_at(16);

    let mut buf = body.to_vec();
    buf.truncate(buf.len() - buf.len() % 16);
    let orig = buf.clone();

    let mut cipher = sshcipher_crypto::AesCipher::new(key).unwrap();
    cipher.set_iv(iv).unwrap();
    cipher.encrypt_cbc(&mut buf).unwrap();

    cipher.set_iv(iv).unwrap();
    cipher.decrypt_cbc(&mut buf).unwrap();
    assert_eq!(buf, orig);
});
