//! Render-independent view state of the prompt runner.

use shared::domain::{ConfigurationStatus, DataSet, InitParams};

use crate::{
    backend::{GenerateRequest, GenerateResponse},
    config::{PrompterConfig, DATA_PLACEHOLDER},
};

/// What a renderer needs to draw the component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewData {
    pub url: String,
    pub model: String,
    pub prompt: String,
    pub initial_prompt: String,
    pub wait_dataset: bool,
    pub show_prompt: bool,
    pub show_data: bool,
    pub should_run_now: bool,
    pub is_auto_run: bool,
    pub response_title: String,
    pub dataset_text: Option<String>,
    pub llm_response: Option<String>,
}

impl ViewData {
    fn from_config(config: PrompterConfig) -> Self {
        Self {
            wait_dataset: config.waits_for_data(),
            url: config.base_url,
            model: config.model,
            initial_prompt: config.prompt.clone(),
            prompt: config.prompt,
            show_prompt: config.show_prompt,
            show_data: config.show_data,
            should_run_now: config.auto_run,
            is_auto_run: config.auto_run,
            response_title: config.response_title,
            dataset_text: None,
            llm_response: None,
        }
    }
}

/// A request handed to the runner, tagged with the configuration it was
/// built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRun {
    pub epoch: u64,
    pub base_url: String,
    pub request: GenerateRequest,
}

#[derive(Debug, Default)]
pub struct PrompterState {
    view: Option<ViewData>,
    error_message: Option<String>,
    in_flight: bool,
    epoch: u64,
}

impl PrompterState {
    pub fn view(&self) -> Option<&ViewData> {
        self.view.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Applies host properties. The returned status is what the host must hear.
    /// Every call starts a new epoch; results of requests from an earlier
    /// one are discarded.
    pub fn on_init(&mut self, params: &InitParams) -> ConfigurationStatus {
        self.epoch += 1;
        self.in_flight = false;
        match PrompterConfig::from_init_params(params) {
            Ok(config) => {
                self.error_message = None;
                self.view = Some(ViewData::from_config(config));
                ConfigurationStatus::Ok
            }
            Err(err) => {
                let reason = err.to_string();
                self.error_message = Some(reason.clone());
                ConfigurationStatus::invalid(reason)
            }
        }
    }

    /// Returns whether the dataset was taken into the prompt.
    pub fn on_dataset(&mut self, dataset: &DataSet) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        // A filtered dataset replaces data that was already substituted.
        if !view.wait_dataset && view.dataset_text.is_none() {
            return false;
        }

        let text = dataset_to_text(dataset);
        view.prompt = view.initial_prompt.replacen(DATA_PLACEHOLDER, &text, 1);
        view.dataset_text = Some(text);
        view.wait_dataset = false;
        view.llm_response = None;
        view.should_run_now = view.is_auto_run;
        true
    }

    pub fn arm_run(&mut self) -> bool {
        match self.view.as_mut() {
            Some(view) => {
                view.should_run_now = true;
                true
            }
            None => false,
        }
    }

    /// Hands out the next request to execute, at most one at a time.
    pub fn take_request(&mut self) -> Option<PendingRun> {
        if self.in_flight || self.error_message.is_some() {
            return None;
        }
        let view = self.view.as_ref()?;
        if view.llm_response.is_some() || view.wait_dataset || !view.should_run_now {
            return None;
        }
        self.in_flight = true;
        Some(PendingRun {
            epoch: self.epoch,
            base_url: view.url.clone(),
            request: GenerateRequest::new(view.model.clone(), view.prompt.clone()),
        })
    }

    /// Returns `None` when the response belongs to an earlier epoch.
    pub fn apply_response(
        &mut self,
        epoch: u64,
        response: GenerateResponse,
    ) -> Option<ConfigurationStatus> {
        if epoch != self.epoch {
            return None;
        }
        self.in_flight = false;
        if let Some(error) = response.error.filter(|error| !error.is_empty()) {
            return Some(self.fail(error));
        }

        self.error_message = None;
        if let Some(view) = self.view.as_mut() {
            view.wait_dataset = true;
            view.llm_response = response.response;
        }
        Some(ConfigurationStatus::Ok)
    }

    pub fn apply_failure(&mut self, epoch: u64, error: &str) -> Option<ConfigurationStatus> {
        if epoch != self.epoch {
            return None;
        }
        self.in_flight = false;
        Some(self.fail(error.to_string()))
    }

    fn fail(&mut self, error: String) -> ConfigurationStatus {
        self.error_message = Some(format!("There was an error: {error}"));
        if let Some(view) = self.view.as_mut() {
            view.should_run_now = false;
        }
        ConfigurationStatus::invalid(error)
    }
}

/// Renders a dataset as comma separated text: a header of column names,
/// then one line per row.
pub fn dataset_to_text(dataset: &DataSet) -> String {
    let mut text = dataset.column_names().collect::<Vec<_>>().join(",");
    text.push('\n');
    for row in dataset.rows() {
        let line = row
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        text.push_str(&line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
