use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use component_api::ComponentApi;
use llm_prompter::{LlmPrompter, OllamaClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

mod config;
mod pane;

use config::{load_dataset, load_settings, parse_param, parse_policy, Settings};
use pane::{Command, DevPane};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "dev_pane.toml")]
    config: PathBuf,
    #[arg(long)]
    log_filter: Option<String>,
    #[arg(long)]
    policy: Option<String>,
    /// JSON file holding a `{columns, data}` dataset.
    #[arg(long)]
    dataset: Option<PathBuf>,
    #[arg(long)]
    settle_ms: Option<u64>,
    /// Init parameter as `key=value`; may be repeated.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) -> Result<()> {
        if let Some(v) = self.log_filter {
            settings.log_filter = v;
        }
        if let Some(v) = self.policy {
            settings.delivery_policy = parse_policy(&v)?;
        }
        if let Some(v) = self.dataset {
            settings.dataset_path = Some(v);
        }
        if let Some(v) = self.settle_ms {
            settings.settle_ms = v;
        }
        for (key, value) in self.params {
            settings.init_params.insert(key, value);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    cli.apply(&mut settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let dataset = load_dataset(settings.dataset_path.as_deref())?;
    let (api, host) = ComponentApi::local(settings.delivery_policy)?;
    let prompter = LlmPrompter::attach(api.controller());
    let runner = prompter.spawn_runner(Arc::new(OllamaClient::new()));

    let pane = DevPane::new(host, settings.init_params.clone(), dataset);
    pane.watch_status()?;
    info!(policy = ?settings.delivery_policy, "dev pane ready");
    println!("{}", Command::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = Command::parse(&line) else {
            println!("unknown command '{}'; {}", line.trim(), Command::HELP);
            continue;
        };
        tracing::debug!(command = ?command, "dev pane command");

        match command {
            Command::Init => pane.send_init()?,
            Command::Dataset => pane.send_dataset()?,
            Command::Run => prompter.run_prompt(),
            Command::Restart => api.restart()?,
            Command::Destroy => api.destroy(),
            Command::Status => {}
            Command::Quit => break,
        }

        tokio::time::sleep(settings.settle()).await;
        print_status(&api, &prompter);
    }

    runner.abort();
    api.destroy();
    Ok(())
}

fn print_status(api: &ComponentApi, prompter: &LlmPrompter) {
    println!("dispatcher: {:?}", api.state());
    if let Some(error) = prompter.error_message() {
        println!("error: {error}");
    }
    let Some(view) = prompter.view() else {
        println!("no configuration received yet");
        return;
    };
    println!("model: {} @ {}", view.model, view.url);
    if view.show_prompt {
        println!("prompt:\n{}", view.prompt);
    }
    if view.show_data {
        if let Some(data) = &view.dataset_text {
            println!("data:\n{data}");
        }
    }
    if let Some(response) = &view.llm_response {
        println!("{}:\n{response}", view.response_title);
    }
}
