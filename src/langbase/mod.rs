//! Langbase Pipes API client.
//!
//! The client performs single pipe runs and reports transport failures;
//! retrying and structured parsing live in [`crate::generation`].

mod client;
mod types;


pub use client::LangbaseClient;
pub use types::*;
