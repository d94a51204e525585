//! HTTP speech providers

mod http;

pub use http::{HttpRecognizer, HttpSynthesizer};
