//! Shared constants used across the application

use std::time::Duration;

/// Provider used when neither the command line nor the config names one.
pub const DEFAULT_PROVIDER: &str = "openai";

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant who provides concise, clear, and accurate answers. Be brief, but make sure the response fully addresses the question. Return any code or file output in a Markdown code fence tagged with its language.";

/// Upper bound for a single provider's model-listing request.
pub const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Separator between provider and model in discovery output (`groq|llama-70b`).
pub const DISCOVERY_SEPARATOR: char = '|';
