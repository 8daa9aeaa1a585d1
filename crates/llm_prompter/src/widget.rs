use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use component_api::ComponentController;
use shared::domain::{ConfigurationStatus, DataSet, InitParams};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    backend::GenerateBackend,
    state::{PendingRun, PrompterState, ViewData},
};

/// Binds [`PrompterState`] to a component controller and runs prompts.
pub struct LlmPrompter {
    controller: Arc<ComponentController>,
    state: Mutex<PrompterState>,
    wake: Notify,
}

impl LlmPrompter {
    /// Registers the init and dataset callbacks on `controller`.
    pub fn attach(controller: Arc<ComponentController>) -> Arc<Self> {
        let prompter = Arc::new(Self {
            controller: controller.clone(),
            state: Mutex::new(PrompterState::default()),
            wake: Notify::new(),
        });

        let weak = Arc::downgrade(&prompter);
        controller.set_on_init(move |params| {
            if let Some(prompter) = Weak::upgrade(&weak) {
                prompter.handle_init(params);
            }
        });
        let weak = Arc::downgrade(&prompter);
        controller.set_on_dataset(move |dataset| {
            if let Some(prompter) = Weak::upgrade(&weak) {
                prompter.handle_dataset(dataset);
            }
        });

        prompter
    }

    /// Spawns the task that executes armed prompts against `backend`.
    pub fn spawn_runner(self: &Arc<Self>, backend: Arc<dyn GenerateBackend>) -> JoinHandle<()> {
        let prompter = self.clone();
        tokio::spawn(async move {
            loop {
                prompter.wake.notified().await;
                while prompter.run_pending(backend.as_ref()).await {}
            }
        })
    }

    /// Arms a manual run of the current prompt.
    pub fn run_prompt(&self) {
        if self.state().arm_run() {
            self.wake.notify_one();
        }
    }

    pub fn view(&self) -> Option<ViewData> {
        self.state().view().cloned()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state().error_message().map(str::to_string)
    }

    /// Executes the pending request, if any. Returns whether one ran.
    pub async fn run_pending(&self, backend: &dyn GenerateBackend) -> bool {
        let pending = self.state().take_request();
        let Some(PendingRun {
            epoch,
            base_url,
            request,
        }) = pending
        else {
            return false;
        };

        info!(model = %request.model, url = %base_url, epoch, "running prompt");
        let outcome = backend.generate(&base_url, &request).await;
        let status = match outcome {
            Ok(response) => self.state().apply_response(epoch, response),
            Err(err) => {
                warn!(error = %err, "prompt request failed");
                self.state().apply_failure(epoch, &err.to_string())
            }
        };
        match status {
            Some(status) => self.report(status),
            None => debug!(epoch, "discarding result of a superseded configuration"),
        }
        true
    }

    fn handle_init(&self, params: InitParams) {
        let status = self.state().on_init(&params);
        self.report(status);
        self.wake.notify_one();
    }

    fn handle_dataset(&self, dataset: DataSet) {
        let taken = self.state().on_dataset(&dataset);
        debug!(rows = dataset.row_count(), taken, "dataset received");
        if taken {
            self.wake.notify_one();
        }
    }

    fn report(&self, status: ConfigurationStatus) {
        if let Err(err) = self.controller.report_configuration(status) {
            warn!(error = %err, "failed to report configuration status");
        }
    }

    fn state(&self) -> MutexGuard<'_, PrompterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/widget_tests.rs"]
mod tests;
