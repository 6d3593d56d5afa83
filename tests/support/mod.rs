//! Helpers shared by the integration tests.
#![allow(dead_code)]

pub mod socket_guard;

use by_request::{FetchOptions, ResponseInfo};
use std::sync::{Arc, Mutex};

/// Options that record the delivered [`ResponseInfo`].
pub fn capture_info() -> (Arc<Mutex<Option<ResponseInfo>>>, FetchOptions) {
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let options = FetchOptions::default()
        .with_response_info(move |info| *sink.lock().unwrap() = Some(info.clone()));
    (slot, options)
}

/// Encodes `text` as Mac OS Roman. Only covers the characters the fixtures use.
pub fn macroman(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{f8}' => 0xBF,
            '\u{e9}' => 0x8E,
            '\u{f4}' => 0x99,
            c if c.is_ascii() => c as u8,
            other => panic!("no Mac OS Roman byte for {other:?} in fixture helper"),
        })
        .collect()
}
