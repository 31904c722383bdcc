//! Speech-to-text boundary.
//!
//! The engine only ever sees the [`client::SttClient`] trait; concrete
//! backends (remote HTTP services, local models, test mocks) live behind it.

pub mod client;
#[cfg(feature = "http-stt")]
pub mod http;

pub use client::{MockSttClient, SttClient, SttError, SttResponse};
#[cfg(feature = "http-stt")]
pub use http::{WhisperHttpClient, WhisperHttpConfig};
