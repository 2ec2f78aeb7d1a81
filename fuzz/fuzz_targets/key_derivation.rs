#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealdoc_core::encryption::{compute_check, derive_key, verify, CIPHER_KEY_LEN, KEY_LEN};
use sealdoc_core::FormatVersion;

#[derive(Arbitrary, Debug)]
struct KeyDerivationInput {
    password: String,
    iv: [u8; 16],
}

fuzz_target!(|input: KeyDerivationInput| {
    let KeyDerivationInput { password, iv } = input;

    // Property 1: derivation is deterministic and sized
    let key = derive_key(&password);
    assert_eq!(key, derive_key(&password), "derivation must be deterministic");
    assert_eq!(key.as_bytes().len(), KEY_LEN);
    assert_eq!(key.cipher_key().len(), CIPHER_KEY_LEN);
    assert_eq!(key.cipher_key(), &key.as_bytes()[..CIPHER_KEY_LEN]);

    // Property 2: the check written on save verifies under every IV-bound version
    let check = compute_check(&key, &iv);
    assert!(verify(&key, &iv, &check, FormatVersion::V1));
    assert!(verify(&key, &iv, &check, FormatVersion::V2));

    // Property 3: the legacy check is the fixed key slice, independent of the IV
    let legacy = [key.as_bytes()[17], key.as_bytes()[18]];
    assert!(verify(&key, &iv, &legacy, FormatVersion::V0));
    assert!(verify(&key, &[0u8; 16], &legacy, FormatVersion::V0));

    // Property 4: Debug output never exposes key bytes
    assert_eq!(format!("{:?}", key), "DocumentKey([REDACTED])");
});
