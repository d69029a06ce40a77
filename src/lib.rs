//! Parley is a terminal chat client for OpenAI-compatible LLM providers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns request orchestration: message normalization, delivery-mode
//!   classification, the request dispatcher, cancellation and signal
//!   handling, provider registry and model discovery.
//! - [`api`] defines chat and model-listing payloads exchanged with providers.
//! - [`cli`] parses arguments and runs one-shot queries or the interactive
//!   loop on top of [`core`].
//! - [`utils`] holds HTTP helpers and logging setup.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
