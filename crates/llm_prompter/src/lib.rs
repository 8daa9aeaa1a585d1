//! Prompt-runner component: feeds host datasets into an LLM prompt and
//! reports whether its properties form a usable configuration.

pub mod backend;
pub mod config;
pub mod state;
pub mod widget;

pub use backend::{
    GenerateBackend, GenerateRequest, GenerateResponse, MissingGenerateBackend, OllamaClient,
};
pub use config::{PrompterConfig, PrompterError};
pub use state::{dataset_to_text, PendingRun, PrompterState, ViewData};
pub use widget::LlmPrompter;
