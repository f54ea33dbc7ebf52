//! Integration Tests: End-to-End Analysis Flows
//!
//! These tests drive the `Orchestrator` against scripted providers under
//! paused Tokio time, so backoff waits are measured exactly and cost nothing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use loglens_core::config::{LoglensConfig, ProviderKind};
use loglens_core::fallback::ENABLE_LLM_SUGGESTION;
use loglens_core::{
    AnalysisInput, DegradationReason, InputFile, Operation, OrchestrationError, Orchestrator,
    OrchestratorSettings, ReportMode,
};
use loglens_llm::mock::ScriptedClient;
use loglens_llm::{Capability, ErrorKind, InferenceError};

const ANSWER: &str = r#"{
  "processFlow": ["gateway", "worker"],
  "nodes": [{"id": "0", "label": "gateway"}, {"id": "1", "label": "worker"}],
  "edges": [{"id": "e0", "source": "0", "target": "1"}],
  "bottlenecks": {"identified": true, "items": [{"location": "worker", "impact": "14s queue wait"}]},
  "optimization": {"suggestions": ["Scale the render queue"]}
}"#;

fn two_files() -> AnalysisInput {
    AnalysisInput::new(vec![
        InputFile::new("a.log", "INFO forwarded job=81"),
        InputFile::new("b.log", "WARN job=81 waited 14s"),
    ])
}

fn with_retries(mock: &Arc<ScriptedClient>, max_retries: u32) -> Orchestrator {
    Orchestrator::with_settings(
        Capability::live(mock.clone()),
        OrchestratorSettings {
            max_retries,
            ..OrchestratorSettings::default()
        },
    )
}

fn server_error() -> InferenceError {
    InferenceError::Provider("HTTP 500 Internal Server Error: upstream crashed".into())
}

// ---------------------------------------------------------------------------
// Retry bounds
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn always_failing_provider_makes_n_plus_one_calls() {
    for n in [0u32, 1, 2, 5] {
        let mock = Arc::new(ScriptedClient::always_failing(server_error()));
        let report = with_retries(&mock, n)
            .analyze(&two_files())
            .await
            .expect("valid input always yields a report");

        assert_eq!(mock.calls(), n as usize + 1, "max_retries = {n}");
        assert_eq!(report.mode, ReportMode::Fallback);
        let diagnostics = report.diagnostics.expect("degraded report has diagnostics");
        assert_eq!(diagnostics.attempts, n + 1);
        assert_eq!(diagnostics.reason, DegradationReason::RetriesExhausted);
    }
}

#[tokio::test(start_paused = true)]
async fn success_on_attempt_k_makes_k_plus_one_calls() {
    for k in 0..=3usize {
        let mock = Arc::new(ScriptedClient::failing_then_succeeding(
            k,
            InferenceError::Timeout(30_000),
            ANSWER,
        ));
        let orchestrator = with_retries(&mock, 3);
        let report = orchestrator.analyze(&two_files()).await.expect("valid input");

        assert_eq!(mock.calls(), k + 1, "succeeds on attempt {k}");
        assert_eq!(report.mode, ReportMode::Llm);
        assert_eq!(orchestrator.status().analysis.retry_count as usize, k);
    }
}

#[tokio::test(start_paused = true)]
async fn fail_fail_succeed_waits_one_then_two_seconds() {
    let mock = Arc::new(ScriptedClient::failing_then_succeeding(2, server_error(), ANSWER));
    let report = with_retries(&mock, 3)
        .analyze(&two_files())
        .await
        .expect("valid input");

    assert_eq!(report.mode, ReportMode::Llm);
    assert_eq!(
        mock.gaps(),
        [Duration::from_millis(1000), Duration::from_millis(2000)]
    );
}

#[tokio::test(start_paused = true)]
async fn always_failing_with_three_retries_reports_last_error() {
    let mock = Arc::new(ScriptedClient::from_script(vec![
        Err(InferenceError::Timeout(30_000)),
        Err(InferenceError::Timeout(30_000)),
        Err(InferenceError::Timeout(30_000)),
        Err(server_error()),
    ]));
    let start = Instant::now();
    let report = with_retries(&mock, 3)
        .analyze(&two_files())
        .await
        .expect("valid input");

    assert_eq!(mock.calls(), 4);
    assert_eq!(start.elapsed(), Duration::from_millis(7000));
    assert_eq!(report.mode, ReportMode::Fallback);
    assert_eq!(report.suggestions, [ENABLE_LLM_SUGGESTION]);

    let diagnostics = report.diagnostics.expect("degraded");
    assert_eq!(diagnostics.error_kind, Some(ErrorKind::ProviderError));
    assert!(
        diagnostics
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("upstream crashed")),
        "last error should carry the provider message"
    );
}

// ---------------------------------------------------------------------------
// Fallback paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unavailable_capability_falls_back_immediately() {
    let orchestrator = Orchestrator::new(Capability::unavailable("connection refused"));
    let report = orchestrator.analyze(&two_files()).await.expect("valid input");

    assert_eq!(report.mode, ReportMode::Fallback);
    assert_eq!(report.analysis.process_flow, json!(["a.log", "b.log"]));
    assert_eq!(report.suggestions, [ENABLE_LLM_SUGGESTION]);

    let diagnostics = report.diagnostics.expect("immediate fallback has diagnostics");
    assert_eq!(diagnostics.reason, DegradationReason::ProviderUnavailable);
    assert_eq!(diagnostics.attempts, 0);
    assert_eq!(diagnostics.last_error.as_deref(), Some("connection refused"));

    let counters = orchestrator.counters();
    assert_eq!(counters.immediate_fallbacks, 1);
    assert_eq!(counters.provider_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn unparseable_answer_falls_back_without_retrying() {
    let mock = Arc::new(ScriptedClient::succeeding(
        "Here is my analysis: the worker is slow.",
    ));
    let orchestrator = with_retries(&mock, 3);
    let report = orchestrator.analyze(&two_files()).await.expect("valid input");

    assert_eq!(mock.calls(), 1);
    assert_eq!(report.mode, ReportMode::Fallback);
    assert_eq!(
        report.diagnostics.map(|d| d.reason),
        Some(DegradationReason::UnparseableResponse)
    );
    assert_eq!(orchestrator.counters().parse_failures, 1);
}

#[tokio::test]
async fn llm_answer_becomes_the_report() {
    let mock = Arc::new(ScriptedClient::succeeding(format!("```json\n{ANSWER}\n```")));
    let report = with_retries(&mock, 3)
        .analyze(&two_files())
        .await
        .expect("valid input");

    assert!(report.is_llm());
    assert!(report.diagnostics.is_none());
    assert_eq!(report.analysis.process_flow_names(), ["gateway", "worker"]);
    assert_eq!(report.suggestions, ["Scale the render queue"]);
    assert_eq!(report.analysis.details, json!({}));
}

#[tokio::test(start_paused = true)]
async fn degraded_report_serialises_diagnostics() {
    let mock = Arc::new(ScriptedClient::always_failing(InferenceError::Unavailable(
        "connection refused".into(),
    )));
    let report = with_retries(&mock, 0)
        .analyze(&two_files())
        .await
        .expect("valid input");

    let value = serde_json::to_value(&report).expect("serialises");
    assert_eq!(value["mode"], "fallback");
    assert_eq!(value["diagnostics"]["reason"], "retries exhausted");
    assert_eq!(value["diagnostics"]["errorKind"], "unavailable");
    assert_eq!(value["diagnostics"]["attempts"], 1);
    assert!(value["diagnostics"]["lastError"]
        .as_str()
        .is_some_and(|e| e.contains("connection refused")));
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_input_is_rejected_regardless_of_capability() {
    let mock = Arc::new(ScriptedClient::succeeding(ANSWER));
    let live = with_retries(&mock, 3);
    let unavailable = Orchestrator::new(Capability::unavailable("none"));

    for orchestrator in [&live, &unavailable] {
        assert_eq!(
            orchestrator.analyze(&AnalysisInput::default()).await,
            Err(OrchestrationError::NoInput)
        );
        assert_eq!(orchestrator.status().current_operation, Operation::Idle);
    }
    assert_eq!(mock.calls(), 0);
    assert_eq!(live.counters().precondition_failures, 1);
    assert_eq!(live.counters().analyses, 0);
}

#[tokio::test]
async fn empty_file_is_rejected_without_calling_the_provider() {
    let mock = Arc::new(ScriptedClient::succeeding(ANSWER));
    let input = AnalysisInput::new(vec![
        InputFile::new("a.log", "x"),
        InputFile::from_bytes("empty.log", b""),
    ]);
    let result = with_retries(&mock, 3).analyze(&input).await;

    assert_eq!(
        result,
        Err(OrchestrationError::EmptyContent {
            name: "empty.log".into()
        })
    );
    assert_eq!(mock.calls(), 0);
}

// ---------------------------------------------------------------------------
// Status, cancellation and concurrency
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn status_tracks_a_running_analysis() {
    let mock = Arc::new(
        ScriptedClient::failing_then_succeeding(1, server_error(), ANSWER)
            .with_latency(Duration::from_millis(200)),
    );
    let orchestrator = with_retries(&mock, 3);
    let before = orchestrator.status();
    assert_eq!(before.current_operation, Operation::Idle);
    assert!(before.available);

    let input = two_files();
    let (report, during) = tokio::join!(orchestrator.analyze(&input), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.status()
    });

    assert!(report.expect("valid input").is_llm());
    assert_eq!(during.current_operation, Operation::Analyzing);

    let after = orchestrator.status();
    assert_eq!(after.current_operation, Operation::Idle);
    assert_eq!(after.analysis.retry_count, 1);
    assert_eq!(after.analysis.max_retries, 3);
    assert!(after.analysis.last_error.is_none());
    assert!(after.last_activity >= during.last_activity);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let mock = Arc::new(ScriptedClient::always_failing(server_error()));
    let orchestrator = with_retries(&mock, 3);
    let token = CancellationToken::new();
    let input = two_files();

    let start = Instant::now();
    let (result, ()) = tokio::join!(orchestrator.analyze_with_cancel(&input, &token), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        token.cancel();
    });

    assert_eq!(result, Err(OrchestrationError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
    assert_eq!(mock.calls(), 2, "third attempt was due at 3000ms");
    assert_eq!(orchestrator.status().current_operation, Operation::Cancelled);
    assert_eq!(orchestrator.counters().cancellations, 1);
}

#[tokio::test]
async fn already_cancelled_token_makes_no_calls() {
    let mock = Arc::new(ScriptedClient::succeeding(ANSWER));
    let token = CancellationToken::new();
    token.cancel();

    let result = with_retries(&mock, 3)
        .analyze_with_cancel(&two_files(), &token)
        .await;
    assert_eq!(result, Err(OrchestrationError::Cancelled));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_slot_provider_serialises_concurrent_analyses() {
    let mock = Arc::new(
        ScriptedClient::succeeding(ANSWER)
            .single_slot()
            .with_latency(Duration::from_millis(300)),
    );
    let orchestrator = with_retries(&mock, 3);
    let (a, b, c) = (two_files(), two_files(), two_files());

    let start = Instant::now();
    let (ra, rb, rc) = tokio::join!(
        orchestrator.analyze(&a),
        orchestrator.analyze(&b),
        orchestrator.analyze(&c)
    );

    assert!(ra.expect("a").is_llm() && rb.expect("b").is_llm() && rc.expect("c").is_llm());
    assert_eq!(mock.peak_in_flight(), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(900));
}

#[tokio::test(start_paused = true)]
async fn concurrent_provider_runs_analyses_in_parallel() {
    let mock =
        Arc::new(ScriptedClient::succeeding(ANSWER).with_latency(Duration::from_millis(300)));
    let orchestrator = Arc::new(with_retries(&mock, 3));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.analyze(&two_files()).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.expect("task joins").expect("valid input").is_llm());
    }

    assert_eq!(mock.peak_in_flight(), 3);
    assert_eq!(orchestrator.counters().llm_reports, 3);
    assert_eq!(orchestrator.counters().provider_attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn status_reflects_the_latest_update_across_overlapping_analyses() {
    let mock =
        Arc::new(ScriptedClient::succeeding(ANSWER).with_latency(Duration::from_millis(100)));
    let orchestrator = Arc::new(with_retries(&mock, 0));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze(&two_files()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze(&two_files()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orchestrator.status().current_operation, Operation::Analyzing);

    // The first analysis finishes at 100ms; the second is still in flight.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!second.is_finished());
    assert_eq!(orchestrator.status().current_operation, Operation::Idle);

    assert!(first.await.expect("task joins").expect("valid input").is_llm());
    assert!(second.await.expect("task joins").expect("valid input").is_llm());
    assert_eq!(orchestrator.status().current_operation, Operation::Idle);
}

// ---------------------------------------------------------------------------
// Startup from configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn config_without_provider_runs_basic_analysis() {
    let mut config = LoglensConfig::default();
    config.llm.provider = ProviderKind::None;

    let orchestrator = Orchestrator::from_config(&config).await.expect("valid config");
    let status = orchestrator.status();
    assert!(!status.available);
    assert_eq!(status.error.as_deref(), Some("no inference provider configured"));
    assert!(status.provider.is_none());

    let report = orchestrator.analyze(&two_files()).await.expect("valid input");
    assert_eq!(report.mode, ReportMode::Fallback);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_startup() {
    let mut config = LoglensConfig::default();
    config.llm.provider = ProviderKind::None;
    config.orchestrator.max_retries = 99;
    assert!(Orchestrator::from_config(&config).await.is_err());
}

#[tokio::test]
async fn custom_prompt_file_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prompt_path = dir.path().join("prompt.toml");
    std::fs::write(
        &prompt_path,
        "[prompt]\nversion = \"test\"\nsystem = \"be brief\"\nuser = \"LOGS:\\n{files}\"\n",
    )
    .expect("write prompt");

    let mut config = LoglensConfig::default();
    config.llm.provider = ProviderKind::None;
    config.orchestrator.prompt_file = Some(prompt_path);

    let orchestrator = Orchestrator::from_config(&config).await.expect("valid config");
    assert_eq!(orchestrator.settings().prompt.version, "test");
}
