use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use queryhunt::config::WorkflowConfig;
use queryhunt::game::prepare_namespace;
use queryhunt::llm::{GenerativeClient, GenerativeError, TextStream};
use queryhunt::models::{NamespaceId, SchemaDescription, StatementBatch};
use queryhunt::storage::{SqliteGateway, StorageError, StorageGateway};
use queryhunt::workflow::{
    FailureReason, MysteryWorkflow, StateName, WorkflowObserver, WorkflowResult, run_workflow,
};

const VALID_BATCH: &str =
    r#"{"queries": [{"query": "INSERT INTO Victim (victim_id, name) VALUES (1, 'Lord Ashford');"}]}"#;
const DESTRUCTIVE_BATCH: &str = r#"{"queries": [{"query": "INSERT INTO Victim (victim_id) VALUES (1);"}, {"query": "DELETE FROM Victim;"}]}"#;

struct ScriptedClient {
    story: Result<Vec<String>, GenerativeError>,
    completions: Mutex<VecDeque<Result<String, GenerativeError>>>,
    prompts: Mutex<Vec<String>>,
    complete_calls: AtomicUsize,
    complete_delay: Option<Duration>,
}

impl ScriptedClient {
    fn new(completions: Vec<Result<String, GenerativeError>>) -> Self {
        Self {
            story: Ok(vec![
                "A storm rolls over ".to_string(),
                "Ashford Manor.".to_string(),
            ]),
            completions: Mutex::new(completions.into()),
            prompts: Mutex::new(Vec::new()),
            complete_calls: AtomicUsize::new(0),
            complete_delay: None,
        }
    }

    fn texts(outputs: &[&str]) -> Self {
        Self::new(outputs.iter().map(|text| Ok(text.to_string())).collect())
    }

    fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock should not be poisoned").clone()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerativeError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock should not be poisoned")
            .push(prompt.to_string());
        if let Some(delay) = self.complete_delay {
            tokio::time::sleep(delay).await;
        }
        self.completions
            .lock()
            .expect("completions lock should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(GenerativeError::Transport("script exhausted".to_string())))
    }

    async fn stream_complete(&self, _prompt: &str) -> Result<TextStream, GenerativeError> {
        let fragments = self.story.clone()?;
        Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

#[derive(Default)]
struct RecordingStorage {
    executed: Mutex<Vec<Vec<String>>>,
    failing_executions: AtomicUsize,
    resets: AtomicUsize,
}

impl RecordingStorage {
    fn failing_first(executions: usize) -> Self {
        let storage = Self::default();
        storage.failing_executions.store(executions, Ordering::SeqCst);
        storage
    }

    fn executed(&self) -> Vec<Vec<String>> {
        self.executed.lock().expect("executed lock should not be poisoned").clone()
    }

    fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageGateway for RecordingStorage {
    async fn create_namespace(&self, _namespace: &NamespaceId) -> Result<(), StorageError> {
        Ok(())
    }

    async fn execute_in_namespace(
        &self,
        _namespace: &NamespaceId,
        batch: &StatementBatch,
    ) -> Result<(), StorageError> {
        self.executed
            .lock()
            .expect("executed lock should not be poisoned")
            .push(batch.statements().to_vec());

        let remaining = self.failing_executions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_executions.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Execution {
                index: 0,
                statement: batch.statements()[0].clone(),
                message: "datatype mismatch".to_string(),
            });
        }
        Ok(())
    }

    async fn reset_tables(&self, _namespace: &NamespaceId) -> Result<(), StorageError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn drop_namespace(&self, _namespace: &NamespaceId) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Default)]
struct TraceObserver {
    fragments: Mutex<Vec<String>>,
    transitions: Mutex<Vec<(StateName, StateName)>>,
}

impl TraceObserver {
    fn transitions(&self) -> Vec<(StateName, StateName)> {
        self.transitions
            .lock()
            .expect("transitions lock should not be poisoned")
            .clone()
    }

    fn count(&self, edge: (StateName, StateName)) -> usize {
        self.transitions().into_iter().filter(|seen| *seen == edge).count()
    }
}

impl WorkflowObserver for TraceObserver {
    fn on_narrative_fragment(&self, fragment: &str) {
        self.fragments
            .lock()
            .expect("fragments lock should not be poisoned")
            .push(fragment.to_string());
    }

    fn on_transition(&self, from: StateName, to: StateName) {
        self.transitions
            .lock()
            .expect("transitions lock should not be poisoned")
            .push((from, to));
    }
}

fn namespace() -> NamespaceId {
    NamespaceId::new("player_1").expect("namespace should be valid")
}

fn workflow(
    client: &Arc<ScriptedClient>,
    storage: &Arc<RecordingStorage>,
    config: WorkflowConfig,
) -> MysteryWorkflow {
    MysteryWorkflow::new(
        client.clone(),
        storage.clone(),
        SchemaDescription::bundled(),
        config,
    )
}

#[tokio::test]
async fn valid_first_batch_succeeds_without_self_correction() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::default());
    let observer = TraceObserver::default();

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run_with_observer(&namespace(), &observer)
        .await;

    let WorkflowResult::Success {
        narrative,
        executed_batch,
    } = result
    else {
        panic!("expected a successful run");
    };
    assert_eq!(narrative.as_str(), "A storm rolls over Ashford Manor.");
    assert_eq!(
        executed_batch.statements(),
        ["INSERT INTO Victim (victim_id, name) VALUES (1, 'Lord Ashford');"]
    );
    assert_eq!(client.complete_calls(), 1);
    assert_eq!(storage.executed().len(), 1);
    assert_eq!(
        observer.count((StateName::Validating, StateName::Executing)),
        1
    );
    assert_eq!(
        observer.count((StateName::Validating, StateName::SelfCorrecting)),
        0
    );
    assert_eq!(
        observer.transitions(),
        vec![
            (StateName::GeneratingStory, StateName::GeneratingDataset),
            (StateName::GeneratingDataset, StateName::Validating),
            (StateName::Validating, StateName::Executing),
            (StateName::Executing, StateName::Success),
        ]
    );
}

#[tokio::test]
async fn retries_exhaust_before_a_fourth_correction_is_requested() {
    let client = Arc::new(ScriptedClient::texts(&[
        DESTRUCTIVE_BATCH,
        DESTRUCTIVE_BATCH,
        DESTRUCTIVE_BATCH,
        DESTRUCTIVE_BATCH,
        VALID_BATCH,
    ]));
    let storage = Arc::new(RecordingStorage::default());
    let observer = TraceObserver::default();

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run_with_observer(&namespace(), &observer)
        .await;

    assert_eq!(
        result,
        WorkflowResult::Failure {
            reason: FailureReason::RetriesExhausted { retries: 3 }
        }
    );
    assert_eq!(client.complete_calls(), 4, "initial dataset call plus three corrections");
    assert!(storage.executed().is_empty(), "destructive batches must never execute");
    assert_eq!(storage.resets(), 1);
    assert_eq!(
        observer.count((StateName::SelfCorrecting, StateName::Validating)),
        3
    );
    assert_eq!(
        observer.transitions().last(),
        Some(&(StateName::SelfCorrecting, StateName::Failure))
    );
}

#[tokio::test]
async fn correction_prompt_carries_offending_output_and_rule() {
    let client = Arc::new(ScriptedClient::texts(&[DESTRUCTIVE_BATCH, VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::default());

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run(&namespace())
        .await;

    assert!(result.is_success(), "unexpected result: {result:?}");
    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("DELETE FROM Victim;"));
    assert!(prompts[1].contains("destructive SQL query detected: DELETE command found"));
    assert!(prompts[1].contains("query #2"));
    assert_eq!(storage.executed().len(), 1);
    assert_eq!(storage.resets(), 0);
}

#[tokio::test]
async fn dataset_prompt_embeds_story_and_output_schema() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::default());

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run(&namespace())
        .await;

    assert!(result.is_success());
    let prompt = &client.prompts()[0];
    assert!(prompt.contains("A storm rolls over Ashford Manor."));
    assert!(prompt.contains("\"queries\""));
    assert!(prompt.contains("Table Murderer"));
}

#[tokio::test]
async fn execution_failure_reenters_self_correction_with_shared_budget() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH, VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::failing_first(1));
    let observer = TraceObserver::default();

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run_with_observer(&namespace(), &observer)
        .await;

    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(storage.executed().len(), 2);
    assert_eq!(
        observer.count((StateName::Executing, StateName::SelfCorrecting)),
        1
    );
    let correction = &client.prompts()[1];
    assert!(correction.contains("query #1 failed: datatype mismatch"));
    assert!(correction.contains(r#"{"queries":[{"query":"INSERT INTO Victim"#));
}

#[tokio::test]
async fn execution_failures_count_against_the_retry_budget() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH, VALID_BATCH, VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::failing_first(5));
    let config = WorkflowConfig {
        max_retries: 2,
        ..WorkflowConfig::default()
    };

    let result = workflow(&client, &storage, config).run(&namespace()).await;

    assert_eq!(
        result,
        WorkflowResult::Failure {
            reason: FailureReason::RetriesExhausted { retries: 2 }
        }
    );
    assert_eq!(storage.executed().len(), 3);
    assert_eq!(storage.resets(), 1);
}

#[tokio::test]
async fn malformed_output_is_corrected_not_fatal() {
    let client = Arc::new(ScriptedClient::texts(&[
        "Sure! Here are your inserts.",
        format!("```json\n{VALID_BATCH}\n```").as_str(),
    ]));
    let storage = Arc::new(RecordingStorage::default());

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run(&namespace())
        .await;

    assert!(result.is_success(), "unexpected result: {result:?}");
    assert!(client.prompts()[1].contains("Sure! Here are your inserts."));
}

#[tokio::test]
async fn story_transport_error_fails_without_dataset_call() {
    let mut scripted = ScriptedClient::texts(&[VALID_BATCH]);
    scripted.story = Err(GenerativeError::Status {
        status: 429,
        body: "rate limited".to_string(),
    });
    let client = Arc::new(scripted);
    let storage = Arc::new(RecordingStorage::default());

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run(&namespace())
        .await;

    let WorkflowResult::Failure {
        reason: FailureReason::Transport(message),
    } = result
    else {
        panic!("expected a transport failure");
    };
    assert!(message.contains("429"));
    assert_eq!(client.complete_calls(), 0);
    assert!(storage.executed().is_empty());
}

#[tokio::test]
async fn correction_transport_error_is_not_retried() {
    let client = Arc::new(ScriptedClient::new(vec![
        Ok(DESTRUCTIVE_BATCH.to_string()),
        Err(GenerativeError::Transport("connection reset".to_string())),
        Ok(VALID_BATCH.to_string()),
    ]));
    let storage = Arc::new(RecordingStorage::default());

    let result = workflow(&client, &storage, WorkflowConfig::default())
        .run(&namespace())
        .await;

    assert_eq!(
        result,
        WorkflowResult::Failure {
            reason: FailureReason::Transport(
                "transport error: connection reset".to_string()
            )
        }
    );
    assert_eq!(client.complete_calls(), 2);
    assert_eq!(storage.resets(), 0);
}

#[tokio::test]
async fn overall_deadline_abandons_a_stalled_run() {
    let mut scripted = ScriptedClient::texts(&[VALID_BATCH]);
    scripted.complete_delay = Some(Duration::from_secs(30));
    let client = Arc::new(scripted);
    let storage = Arc::new(RecordingStorage::default());
    let config = WorkflowConfig {
        max_retries: 3,
        run_timeout: Duration::from_millis(100),
    };

    let result = workflow(&client, &storage, config).run(&namespace()).await;

    assert!(
        matches!(
            result,
            WorkflowResult::Failure {
                reason: FailureReason::Timeout { .. }
            }
        ),
        "unexpected result: {result:?}"
    );
    assert!(storage.executed().is_empty());
    assert_eq!(storage.resets(), 0, "timeouts leave the namespace to the caller");
}

#[tokio::test]
async fn observer_sees_story_fragments_in_order() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::default());
    let observer = TraceObserver::default();

    workflow(&client, &storage, WorkflowConfig::default())
        .run_with_observer(&namespace(), &observer)
        .await;

    assert_eq!(
        *observer
            .fragments
            .lock()
            .expect("fragments lock should not be poisoned"),
        vec!["A storm rolls over ".to_string(), "Ashford Manor.".to_string()]
    );
}

#[tokio::test]
async fn run_workflow_entry_point_returns_terminal_value() {
    let client = Arc::new(ScriptedClient::texts(&[VALID_BATCH]));
    let storage = Arc::new(RecordingStorage::default());

    let result = run_workflow(
        client.clone(),
        storage.clone(),
        SchemaDescription::new("Table Victim { victim_id integer }"),
        &namespace(),
        WorkflowConfig::default(),
    )
    .await;

    assert!(result.is_success());
    assert!(client.prompts()[0].contains("Table Victim { victim_id integer }"));
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

#[tokio::test]
async fn mistyped_insert_on_sqlite_is_corrected_and_committed() {
    const MISTYPED_BATCH: &str = r#"{"queries": [{"query": "INSERT INTO Suspects (suspect_id, name) VALUES (1, 'Lady Ashford');"}, {"query": "INSERT INTO Victim (victim_id, name, age, time_of_death) VALUES (1, 'Lord Ashford', 'sixty one', 'not a date');"}]}"#;
    const CORRECTED_BATCH: &str = r#"{"queries": [{"query": "INSERT INTO Suspects (suspect_id, name) VALUES (1, 'Lady Ashford');"}, {"query": "INSERT INTO Victim (victim_id, name, age, time_of_death) VALUES (1, 'Lord Ashford', 61, '2024-10-12 21:00:00');"}]}"#;

    let client = Arc::new(ScriptedClient::texts(&[MISTYPED_BATCH, CORRECTED_BATCH]));
    let gateway = Arc::new(SqliteGateway::new(unique_temp_dir("queryhunt-workflow-sqlite")));
    let ns = namespace();
    prepare_namespace(gateway.as_ref(), &ns)
        .await
        .expect("namespace should be prepared");
    let observer = TraceObserver::default();

    let result = MysteryWorkflow::new(
        client.clone(),
        gateway.clone(),
        SchemaDescription::bundled(),
        WorkflowConfig::default(),
    )
    .run_with_observer(&ns, &observer)
    .await;

    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(client.complete_calls(), 2);
    assert_eq!(
        observer.count((StateName::Executing, StateName::SelfCorrecting)),
        1
    );
    let correction = &client.prompts()[1];
    assert!(
        correction.contains("query #2 failed: CHECK constraint failed"),
        "correction should carry the insert-time error: {correction}"
    );

    let suspects = gateway
        .query_namespace(&ns, "SELECT COUNT(*) AS n FROM Suspects", 10)
        .await
        .expect("count should run");
    assert_eq!(suspects.rows[0]["n"], 1);
    let victim = gateway
        .query_namespace(&ns, "SELECT age, typeof(age) AS kind FROM Victim", 10)
        .await
        .expect("victim should be readable");
    assert_eq!(victim.rows[0]["age"], 61);
    assert_eq!(victim.rows[0]["kind"], "integer");

    let _ = std::fs::remove_dir_all(gateway.root());
}
