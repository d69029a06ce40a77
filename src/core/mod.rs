pub mod builtin_providers;
pub mod cancellation;
pub mod capability;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod json_path;
pub mod message;
pub mod providers;
pub mod shell;
