#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealdoc_core::encryption::{compute_check, derive_key, CbcEncryptWriter};
use sealdoc_core::{Document, FileHeader};
use std::io::Write;

#[derive(Arbitrary, Debug)]
struct OpenInput {
    /// Bytes placed after a header whose check matches `password`
    payload: Vec<u8>,
    /// Encrypt `payload` first so the fuzzer reaches the gzip and record layers
    encrypt_payload: bool,
    iv: [u8; 16],
    password: String,
    /// Raw file bytes, opened as-is
    raw: Vec<u8>,
}

fuzz_target!(|input: OpenInput| {
    // Property 1: arbitrary files never panic
    let _ = Document::load(input.raw.as_slice(), &input.password, None);

    // Property 2: past a passing password check, failures are corruption, never a
    // format or password error
    let key = derive_key(&input.password);
    let header = FileHeader::new(compute_check(&key, &input.iv), input.iv);
    let file = if input.encrypt_payload {
        let mut writer = match CbcEncryptWriter::new(header.to_bytes().to_vec(), key.cipher_key(), &input.iv) {
            Ok(writer) => writer,
            Err(_) => return,
        };
        if writer.write_all(&input.payload).is_err() {
            return;
        }
        match writer.finish() {
            Ok(file) => file,
            Err(_) => return,
        }
    } else {
        let mut file = header.to_bytes().to_vec();
        file.extend_from_slice(&input.payload);
        file
    };

    match Document::load(file.as_slice(), &input.password, None) {
        Ok(document) => {
            // Property 3: a successful open restores the key it was opened with
            assert_eq!(document.metadata().key.as_ref(), Some(&key));
        }
        Err(err) => {
            assert!(err.is_corruption(), "unexpected error class: {err:?}");
        }
    }
});
