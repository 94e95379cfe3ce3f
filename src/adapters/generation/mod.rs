//! Answer generation adapters.

pub mod anthropic;
pub mod types;

pub use anthropic::AnthropicGenerator;
