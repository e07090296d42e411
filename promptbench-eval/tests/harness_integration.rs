//! Integration tests for EvalHarness.
//!
//! These tests use mock completion clients and a recording sleeper, so they
//! make no network calls and never actually wait.

use async_trait::async_trait;
use promptbench_core::mock_llm::{MockCompletionClient, RecordingSleeper};
use promptbench_core::{CompletionClient, CompletionRequest, LlmError, ModelCaller, RetryPolicy};
use promptbench_eval::{
    DatasetItem, EvalConfig, EvalError, EvalHarness, EvalProgress, InMemoryDataset,
    JsonFileDataset, MatchMethod, ERROR_LABEL,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PROMPT: &str = "Return only the genre.";

/// Build a harness over `client` with a recording sleeper.
fn harness(
    client: Arc<dyn CompletionClient>,
    config: EvalConfig,
) -> (EvalHarness, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let caller = ModelCaller::new(client, RetryPolicy::default())
        .with_sleeper(Arc::new(sleeper.clone()));
    (EvalHarness::new(caller, config), sleeper)
}

fn songs(pairs: &[(&str, &str)]) -> Vec<DatasetItem> {
    pairs
        .iter()
        .map(|(text, label)| DatasetItem::new(*text, *label))
        .collect()
}

/// Client that fails the first `failures` calls for each listed text, then
/// answers with the mapped label.
struct FlakyClient {
    answers: HashMap<String, String>,
    failures: HashMap<String, usize>,
    seen: Mutex<HashMap<String, usize>>,
    order: Mutex<Vec<String>>,
}

impl FlakyClient {
    fn new(answers: &[(&str, &str)], failures: &[(&str, usize)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            failures: failures.iter().map(|(k, n)| (k.to_string(), *n)).collect(),
            seen: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
        }
    }

    fn call_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FlakyClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let content = request.user_content().unwrap_or_default();
        let text = content
            .split("\n\n")
            .next()
            .unwrap_or_default()
            .to_string();
        self.order.lock().unwrap().push(text.clone());

        let calls = {
            let mut seen = self.seen.lock().unwrap();
            let count = seen.entry(text.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if calls <= self.failures.get(&text).copied().unwrap_or(0) {
            return Err(LlmError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }

        self.answers
            .get(&text)
            .cloned()
            .ok_or(LlmError::NoContent)
    }
}

#[tokio::test]
async fn test_half_correct_with_contains() {
    let client = MockCompletionClient::new(vec![Ok("Rock".into()), Ok("Country".into())]);
    let (harness, _) = harness(
        Arc::new(client.clone()),
        EvalConfig::default().with_match_method(MatchMethod::Contains),
    );
    let items = songs(&[("lyrics1", "rock"), ("lyrics2", "pop")]);

    let report = harness.evaluate(&items, PROMPT).await;

    assert_eq!(report.correct_count, 1);
    assert_eq!(report.total_count, 2);
    assert!((report.score_percent - 50.0).abs() < 1e-9);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.prompt, PROMPT);
    assert_eq!(report.model_id, "gpt-4o-mini");
    assert_eq!(report.match_method, MatchMethod::Contains);

    assert!(report.items[0].is_correct);
    assert_eq!(report.items[0].predicted_label, "Rock");
    assert!(!report.items[1].is_correct);
    assert_eq!(report.items[1].predicted_label, "Country");
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_sends_text_then_prompt_as_single_user_message() {
    let client = MockCompletionClient::always("rock");
    let config = EvalConfig::default()
        .with_model("gpt-4o")
        .with_temperature(0.3);
    let (harness, _) = harness(Arc::new(client.clone()), config);

    harness
        .evaluate(&songs(&[("verse one", "rock")]), PROMPT)
        .await;

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4o");
    assert_eq!(requests[0].temperature, 0.3);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(
        requests[0].user_content(),
        Some("verse one\n\nReturn only the genre.")
    );
}

#[tokio::test]
async fn test_always_failing_endpoint_marks_error() {
    let client = MockCompletionClient::always_failing(|| LlmError::Http("refused".into()));
    let config = EvalConfig::default()
        .with_max_retries(2)
        .with_retry_delay(Duration::from_secs(2))
        .with_inter_item_delay(Duration::from_secs(1));
    let (harness, sleeper) = harness(Arc::new(client.clone()), config);

    let report = harness.evaluate(&songs(&[("lyrics", "rock")]), PROMPT).await;

    assert_eq!(client.call_count(), 3);
    assert_eq!(report.total_count, 1);
    assert_eq!(report.correct_count, 0);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.score_percent, 0.0);

    let item = &report.items[0];
    assert_eq!(item.predicted_label, ERROR_LABEL);
    assert!(!item.is_correct);
    assert_eq!(item.attempts, 3);
    assert!(item.error.as_deref().unwrap_or_default().contains("refused"));

    // Two retry waits, then the inter-item wait.
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(1)
        ]
    );
}

#[tokio::test]
async fn test_error_label_never_counts_even_if_it_would_match() {
    // Expected label "error" would match the "ERROR" marker under contains.
    let client = MockCompletionClient::always_failing(|| LlmError::NoContent);
    let (harness, _) = harness(
        Arc::new(client),
        EvalConfig::default().with_max_retries(0),
    );

    let report = harness.evaluate(&songs(&[("x", "error")]), PROMPT).await;

    assert_eq!(report.correct_count, 0);
    assert!(!report.items[0].is_correct);
}

#[tokio::test]
async fn test_order_preserved_when_middle_item_retries() {
    let client = Arc::new(FlakyClient::new(
        &[("A", "rock"), ("B", "pop"), ("C", "jazz")],
        &[("B", 2)],
    ));
    let config = EvalConfig::default()
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(10))
        .with_inter_item_delay(Duration::from_millis(1));
    let (harness, sleeper) = harness(client.clone(), config);
    let items = songs(&[("A", "rock"), ("B", "pop"), ("C", "jazz")]);

    let report = harness.evaluate(&items, PROMPT).await;

    let expected: Vec<&str> = report
        .items
        .iter()
        .map(|r| r.expected_label.as_str())
        .collect();
    assert_eq!(expected, vec!["rock", "pop", "jazz"]);
    assert_eq!(
        report.items.iter().map(|r| r.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(report.items[1].attempts, 3);
    assert_eq!(report.correct_count, 3);

    // Strictly sequential: B's retries finish before C is sent.
    assert_eq!(client.call_order(), vec!["A", "B", "B", "B", "C"]);

    let waits = sleeper.recorded();
    assert_eq!(waits.len(), 2 + 3);
    assert_eq!(
        waits.iter().filter(|d| **d == Duration::from_millis(10)).count(),
        2
    );
}

#[tokio::test]
async fn test_failure_does_not_abort_run() {
    let client = Arc::new(FlakyClient::new(
        &[("A", "rock"), ("C", "jazz")],
        &[("B", usize::MAX)],
    ));
    let (harness, _) = harness(
        client,
        EvalConfig::default()
            .with_max_retries(1)
            .with_retry_delay(Duration::ZERO)
            .with_inter_item_delay(Duration::ZERO),
    );
    let items = songs(&[("A", "rock"), ("B", "pop"), ("C", "jazz")]);

    let report = harness.evaluate(&items, PROMPT).await;

    assert_eq!(report.total_count, 3);
    assert_eq!(report.correct_count, 2);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.items[1].predicted_label, ERROR_LABEL);
    assert!(report.items[2].is_correct);
    assert!(report.correct_count <= report.total_count);
    assert!(
        (report.score_percent - 100.0 * 2.0 / 3.0).abs() < 1e-9,
        "score was {}",
        report.score_percent
    );
}

#[tokio::test]
async fn test_second_item_exhausts_retries_first_still_scored() {
    let client = Arc::new(FlakyClient::new(
        &[("lyrics1", "Rock")],
        &[("lyrics2", usize::MAX)],
    ));
    let (harness, sleeper) = harness(
        client.clone(),
        EvalConfig::default()
            .with_max_retries(2)
            .with_retry_delay(Duration::from_secs(2))
            .with_inter_item_delay(Duration::from_secs(1)),
    );
    let items = songs(&[("lyrics1", "rock"), ("lyrics2", "pop")]);

    let report = harness.evaluate(&items, PROMPT).await;

    assert_eq!(
        client.call_order(),
        vec!["lyrics1", "lyrics2", "lyrics2", "lyrics2"]
    );
    assert_eq!(report.total_count, 2);
    assert_eq!(report.correct_count, 1);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.score_percent, 50.0);

    assert!(report.items[0].is_correct);
    assert_eq!(report.items[0].attempts, 1);
    assert_eq!(report.items[1].predicted_label, ERROR_LABEL);
    assert_eq!(report.items[1].attempts, 3);
    assert!(!report.items[1].is_correct);

    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(1)
        ]
    );
}

#[tokio::test]
async fn test_empty_dataset() {
    let client = MockCompletionClient::always("rock");
    let (harness, sleeper) = harness(Arc::new(client.clone()), EvalConfig::default());

    let report = harness.evaluate(&[], PROMPT).await;

    assert_eq!(report.total_count, 0);
    assert_eq!(report.correct_count, 0);
    assert_eq!(report.score_percent, 0.0);
    assert!(report.items.is_empty());
    assert_eq!(client.call_count(), 0);
    assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_inter_item_delay_after_every_item() {
    let client = MockCompletionClient::always("pop");
    let (harness, sleeper) = harness(
        Arc::new(client),
        EvalConfig::default().with_inter_item_delay(Duration::from_secs(1)),
    );

    harness
        .evaluate(&songs(&[("a", "pop"), ("b", "rock"), ("c", "pop")]), PROMPT)
        .await;

    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1); 3]);
}

#[tokio::test]
async fn test_unrecognized_match_method_never_matches() {
    let client = MockCompletionClient::always("rock");
    let (harness, _) = harness(
        Arc::new(client),
        EvalConfig::default().with_match_method("regex".parse().unwrap()),
    );

    let report = harness
        .evaluate(&songs(&[("a", "rock"), ("b", "rock")]), PROMPT)
        .await;

    assert_eq!(report.total_count, 2);
    assert_eq!(report.correct_count, 0);
    assert_eq!(report.error_count, 0);
}

#[tokio::test]
async fn test_fuzzy_and_exact_methods() {
    let items = songs(&[("a", "country"), ("b", "hip hop")]);

    let client = MockCompletionClient::new(vec![Ok("Countyr".into()), Ok("Hip-Hop".into())]);
    let (fuzzy, _) = harness(
        Arc::new(client),
        EvalConfig::default().with_match_method(MatchMethod::Fuzzy),
    );
    assert_eq!(fuzzy.evaluate(&items, PROMPT).await.correct_count, 2);

    let client = MockCompletionClient::new(vec![Ok(" COUNTRY ".into()), Ok("Hip-Hop".into())]);
    let (exact, _) = harness(
        Arc::new(client),
        EvalConfig::default().with_match_method(MatchMethod::Exact),
    );
    assert_eq!(exact.evaluate(&items, PROMPT).await.correct_count, 1);
}

#[tokio::test]
async fn test_progress_events() {
    let client = MockCompletionClient::new(vec![
        Ok("rock".into()),
        Err(LlmError::Timeout(10)),
    ]);
    let (harness, _) = harness(
        Arc::new(client),
        EvalConfig::default().with_max_retries(0),
    );
    let items = songs(&[("a", "rock"), ("b", "pop")]);
    let mut events = Vec::new();

    harness
        .evaluate_with_progress(&items, PROMPT, |event| events.push(event))
        .await;

    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], EvalProgress::Started { total: 2 }));
    match &events[1] {
        EvalProgress::ItemCompleted {
            index,
            total,
            correct,
            error,
            ..
        } => {
            assert_eq!((*index, *total, *correct, *error), (0, 2, true, false));
        }
        other => panic!("unexpected event {:?}", other),
    }
    match &events[2] {
        EvalProgress::ItemCompleted {
            index,
            predicted,
            correct,
            error,
            ..
        } => {
            assert_eq!(*index, 1);
            assert_eq!(predicted, ERROR_LABEL);
            assert!(!*correct);
            assert!(*error);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_evaluate_dataset_from_jsonl_with_sample() {
    let mut file = tempfile::Builder::new()
        .suffix(".jsonl")
        .tempfile()
        .unwrap();
    writeln!(file, r#"{{"lyrics": "amps to eleven", "genre": "Rock"}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"lyrics": "bubblegum hearts", "genre": "Pop"}}"#).unwrap();
    writeln!(file, r#"{{"lyrics": "saxophone night", "genre": "Jazz"}}"#).unwrap();

    let client = MockCompletionClient::new(vec![Ok("rock".into()), Ok("pop".into())]);
    let (harness, _) = harness(Arc::new(client.clone()), EvalConfig::default());
    let dataset = JsonFileDataset::new(file.path().to_path_buf());

    let report = harness
        .evaluate_dataset(&dataset, Some(2), PROMPT)
        .await
        .unwrap();

    assert_eq!(report.total_count, 2);
    assert_eq!(report.correct_count, 2);
    assert_eq!(report.items[1].original_text, "bubblegum hearts");
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_invalid_dataset_is_fatal_before_any_call() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"[{{"text": "a", "expected_label": "rock"}}, {{"text": "b"}}]"#
    )
    .unwrap();

    let client = MockCompletionClient::always("rock");
    let (harness, _) = harness(Arc::new(client.clone()), EvalConfig::default());
    let dataset = JsonFileDataset::new(file.path().to_path_buf());

    let result = harness.evaluate_dataset(&dataset, None, PROMPT).await;

    assert!(matches!(result, Err(EvalError::Dataset(_))));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_evaluate_in_memory_dataset() {
    let dataset = InMemoryDataset::new(
        "inline",
        songs(&[("a", "rock"), ("b", "pop"), ("c", "jazz")]),
    );
    let client = MockCompletionClient::always("Rock and roll");
    let (harness, _) = harness(Arc::new(client), EvalConfig::default());

    let report = harness
        .evaluate_dataset(&dataset, None, PROMPT)
        .await
        .unwrap();

    assert_eq!(report.total_count, 3);
    assert_eq!(report.correct_count, 1);
}

#[tokio::test]
async fn test_from_client_uses_config_retries() {
    let client = MockCompletionClient::new(vec![
        Err(LlmError::RateLimit("slow".into())),
        Ok("pop".into()),
    ]);
    let harness = EvalHarness::from_client(
        Arc::new(client.clone()),
        EvalConfig::default()
            .with_max_retries(1)
            .with_retry_delay(Duration::ZERO)
            .with_inter_item_delay(Duration::ZERO),
    );

    let report = harness.evaluate(&songs(&[("a", "pop")]), PROMPT).await;

    assert_eq!(report.correct_count, 1);
    assert_eq!(report.items[0].attempts, 2);
    assert_eq!(client.call_count(), 2);
}
