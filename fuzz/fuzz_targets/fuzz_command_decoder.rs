//! Fuzz target for remote helper command decoding.
//!
//! Tests that the decoder handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(_) => return,
    };

    runtime.block_on(async {
        let mut decoder = gitremote::Decoder::new(Cursor::new(data.to_vec()));

        // Bounded so crafted input cannot loop forever.
        for _ in 0..100 {
            match decoder.next_command().await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => break,
            }
        }
    });
});
