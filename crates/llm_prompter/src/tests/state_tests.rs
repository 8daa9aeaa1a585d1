use super::*;
use shared::domain::{Column, Primitive};

fn sales() -> DataSet {
    DataSet::new(
        vec![Column::new("region"), Column::new("total")],
        vec![
            vec![Primitive::from("north"), Primitive::from(10)],
            vec![Primitive::from("south"), Primitive::from(2.5)],
        ],
    )
    .expect("dataset")
}

fn answer(text: &str) -> GenerateResponse {
    GenerateResponse {
        response: Some(text.into()),
        error: None,
    }
}

fn init(state: &mut PrompterState, prompt: &str, auto_run: bool) -> ConfigurationStatus {
    state.on_init(
        &InitParams::new()
            .with("prompt", prompt)
            .with("autoRun", if auto_run { "true" } else { "false" }),
    )
}

#[test]
fn renders_dataset_as_csv_lines() {
    assert_eq!(
        dataset_to_text(&sales()),
        "region,total\nnorth,10\nsouth,2.5\n"
    );
}

#[test]
fn missing_prompt_reports_invalid_and_keeps_previous_view() {
    let mut state = PrompterState::default();
    assert_eq!(init(&mut state, "first", false), ConfigurationStatus::Ok);

    let status = state.on_init(&InitParams::new());
    assert_eq!(
        status,
        ConfigurationStatus::invalid("Property 'prompt' is missing!")
    );
    assert_eq!(state.error_message(), Some("Property 'prompt' is missing!"));
    assert_eq!(state.view().map(|v| v.prompt.as_str()), Some("first"));
    assert!(state.take_request().is_none());
}

#[test]
fn auto_run_without_placeholder_runs_immediately_once() {
    let mut state = PrompterState::default();
    init(&mut state, "tell me a joke", true);

    let run = state.take_request().expect("request");
    assert_eq!(run.base_url, "http://localhost:11434");
    assert_eq!(run.request, GenerateRequest::new("llama3.2", "tell me a joke"));
    assert!(state.take_request().is_none(), "one request in flight");

    let status = state.apply_response(run.epoch, answer("why did..."));
    assert_eq!(status, Some(ConfigurationStatus::Ok));
    let view = state.view().expect("view");
    assert_eq!(view.llm_response.as_deref(), Some("why did..."));
    assert!(view.wait_dataset);
    assert!(state.take_request().is_none());
}

#[test]
fn placeholder_waits_for_dataset_then_substitutes_it() {
    let mut state = PrompterState::default();
    init(&mut state, "Summarize:\n$data\nBe brief. $data", true);
    assert!(state.take_request().is_none(), "waiting for data");

    assert!(state.on_dataset(&sales()));
    let run = state.take_request().expect("request after data");
    assert_eq!(
        run.request.prompt,
        "Summarize:\nregion,total\nnorth,10\nsouth,2.5\n\nBe brief. $data"
    );
    assert_eq!(
        state.view().and_then(|v| v.dataset_text.clone()).as_deref(),
        Some("region,total\nnorth,10\nsouth,2.5\n")
    );
}

#[test]
fn dataset_is_ignored_when_prompt_does_not_use_data() {
    let mut state = PrompterState::default();
    assert!(!state.on_dataset(&sales()), "no view yet");

    init(&mut state, "static prompt", false);
    assert!(!state.on_dataset(&sales()));
    assert!(state.view().and_then(|v| v.dataset_text.clone()).is_none());
}

#[test]
fn manual_run_is_required_without_auto_run() {
    let mut state = PrompterState::default();
    init(&mut state, "question", false);
    assert!(state.take_request().is_none());

    assert!(state.arm_run());
    assert!(state.take_request().is_some());
}

#[test]
fn filtered_dataset_replaces_previous_data_and_clears_response() {
    let mut state = PrompterState::default();
    init(&mut state, "Data: $data", true);
    state.on_dataset(&sales());
    let first = state.take_request().expect("first run");
    state.apply_response(first.epoch, answer("first answer"));

    let filtered = DataSet::new(
        vec![Column::new("region"), Column::new("total")],
        vec![vec![Primitive::from("north"), Primitive::from(10)]],
    )
    .expect("filtered");
    assert!(state.on_dataset(&filtered));
    let view = state.view().expect("view");
    assert!(view.llm_response.is_none());
    assert_eq!(view.prompt, "Data: region,total\nnorth,10\n");

    let rerun = state.take_request().expect("re-run");
    assert_eq!(rerun.request.prompt, "Data: region,total\nnorth,10\n");
}

#[test]
fn backend_error_is_reported_and_stops_running() {
    let mut state = PrompterState::default();
    init(&mut state, "question", true);
    let run = state.take_request().expect("request");

    let status = state.apply_response(
        run.epoch,
        GenerateResponse {
            response: None,
            error: Some("model 'llama3.2' not found".into()),
        },
    );
    assert_eq!(
        status,
        Some(ConfigurationStatus::invalid("model 'llama3.2' not found"))
    );
    assert_eq!(
        state.error_message(),
        Some("There was an error: model 'llama3.2' not found")
    );
    assert!(state.take_request().is_none());

    assert_eq!(init(&mut state, "question", true), ConfigurationStatus::Ok);
    assert!(state.error_message().is_none());
    assert!(state.take_request().is_some());
}

#[test]
fn transport_failure_is_reported_like_a_backend_error() {
    let mut state = PrompterState::default();
    init(&mut state, "question", true);
    let run = state.take_request().expect("request");

    let status = state
        .apply_failure(run.epoch, "failed to reach http://localhost:11434/api/generate")
        .expect("current epoch");
    assert!(!status.is_ok());
    assert!(state
        .error_message()
        .is_some_and(|message| message.starts_with("There was an error: failed to reach")));
}

#[test]
fn response_to_a_superseded_configuration_is_discarded() {
    let mut state = PrompterState::default();
    init(&mut state, "first", true);
    let stale = state.take_request().expect("first request");

    init(&mut state, "second", true);
    assert_eq!(
        state.apply_response(stale.epoch, answer("answer to first")),
        None
    );
    assert!(state.view().and_then(|v| v.llm_response.clone()).is_none());

    let current = state.take_request().expect("second prompt still runs");
    assert_eq!(current.request.prompt, "second");
    assert_ne!(current.epoch, stale.epoch);
    assert_eq!(
        state.apply_response(current.epoch, answer("answer to second")),
        Some(ConfigurationStatus::Ok)
    );
    assert_eq!(
        state.view().and_then(|v| v.llm_response.clone()).as_deref(),
        Some("answer to second")
    );
}

#[test]
fn failure_of_a_superseded_request_leaves_new_configuration_valid() {
    let mut state = PrompterState::default();
    init(&mut state, "first", true);
    let stale = state.take_request().expect("first request");

    init(&mut state, "second", false);
    assert_eq!(state.apply_failure(stale.epoch, "connection reset"), None);
    assert!(state.error_message().is_none());
}
