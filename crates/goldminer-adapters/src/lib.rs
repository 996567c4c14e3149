//! HTTP adapters for the mining pipeline
//!
//! - [`GithubClient`]: repository search and commit inspection
//! - [`GeminiAppraiser`]: LLM appraisal through `generateContent`
//! - [`FeishuNotifier`]: interactive-card webhook pushes
//!
//! Every client reads its settings through a `*Config::from_env()` and maps
//! its failures into [`goldminer_core::PortError`].

pub mod error;
pub mod feishu;
pub mod gemini;
pub mod github;
mod http;

pub use error::{AdapterError, Result};
pub use feishu::{build_card, FeishuConfig, FeishuNotifier};
pub use gemini::{extract_json, parse_appraisal, GeminiAppraiser, GeminiConfig};
pub use github::{GithubClient, GithubConfig};
