//! LLM-backed judges for the debate engine.
//!
//! Implements the engine's [`Adjudicator`](debate_engine::Adjudicator)
//! seam against any OpenAI-compatible chat completions endpoint, and ships
//! the default judge panel.

pub mod config;
pub mod http;
pub mod personas;
pub mod prompts;

pub use config::{check_endpoint, JudgeConfig};
pub use http::{parse_ruling, HttpAdjudicator};
pub use personas::{default_panel, load_panel};
pub use prompts::PROMPT_VERSION;
