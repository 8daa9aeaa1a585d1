use shared::domain::InitParams;
use thiserror::Error;
use url::Url;

pub const BASE_URL_PROP: &str = "baseUrl";
pub const PROMPT_PROP: &str = "prompt";
pub const MODEL_PROP: &str = "model";
pub const SHOW_PROMPT_PROP: &str = "showPrompt";
pub const SHOW_DATA_PROP: &str = "showData";
pub const AUTO_RUN_PROP: &str = "autoRun";
pub const RESPONSE_TITLE_PROP: &str = "responseTitle";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_RESPONSE_TITLE: &str = "LLM Response";
pub const DATA_PLACEHOLDER: &str = "$data";

#[derive(Debug, Error)]
pub enum PrompterError {
    #[error("Property 'prompt' is missing!")]
    MissingPrompt,
    #[error("Property 'baseUrl' is not a valid URL: {url}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrompterConfig {
    pub base_url: String,
    pub model: String,
    pub prompt: String,
    pub show_prompt: bool,
    pub show_data: bool,
    pub auto_run: bool,
    pub response_title: String,
}

impl PrompterConfig {
    pub fn from_init_params(params: &InitParams) -> Result<Self, PrompterError> {
        let prompt = params.get_string(PROMPT_PROP, "");
        if prompt.is_empty() {
            return Err(PrompterError::MissingPrompt);
        }

        let base_url = match params.get_string(BASE_URL_PROP, "") {
            raw if raw.is_empty() => {
                tracing::info!("server URL not provided, using {DEFAULT_SERVER_URL}");
                DEFAULT_SERVER_URL.to_string()
            }
            raw => {
                let trimmed = raw.strip_suffix('/').unwrap_or(&raw).to_string();
                Url::parse(&trimmed).map_err(|source| PrompterError::InvalidBaseUrl {
                    url: raw.clone(),
                    source,
                })?;
                trimmed
            }
        };

        let model = match params.get_string(MODEL_PROP, "") {
            raw if raw.is_empty() => {
                tracing::info!("model not provided, using {DEFAULT_MODEL}");
                DEFAULT_MODEL.to_string()
            }
            raw => raw,
        };

        let response_title = match params.get_string(RESPONSE_TITLE_PROP, "") {
            raw if raw.is_empty() => DEFAULT_RESPONSE_TITLE.to_string(),
            raw => raw,
        };

        Ok(Self {
            base_url,
            model,
            prompt,
            show_prompt: params.get_bool(SHOW_PROMPT_PROP, false),
            show_data: params.get_bool(SHOW_DATA_PROP, false),
            auto_run: params.get_bool(AUTO_RUN_PROP, false),
            response_title,
        })
    }

    pub fn waits_for_data(&self) -> bool {
        self.prompt.contains(DATA_PLACEHOLDER)
    }
}
