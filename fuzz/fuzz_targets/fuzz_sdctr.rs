#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Input layout: 1 byte key-size selector, key, 16-byte counter, payload.
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

    // The keystream is an involution, and splitting the span must not
    // change the result.
    let mut whole = sshcipher_crypto::AesCipher::new(key).unwrap();
    whole.set_iv(iv).unwrap();
    whole.sdctr(&mut buf).unwrap();
    let once = buf.clone();

    whole.set_iv(iv).unwrap();
    whole.sdctr(&mut buf).unwrap();
    assert_eq!(buf, orig);

    let mut split = sshcipher_crypto::AesCipher::new(key).unwrap();
    split.set_iv(iv).unwrap();
    let mid = (buf.len() / 32) * 16;
    let (a, b) = buf.split_at_mut(mid);
    split.sdctr(a).unwrap();
    split.sdctr(b).unwrap();
    assert_eq!(buf, once);
});
