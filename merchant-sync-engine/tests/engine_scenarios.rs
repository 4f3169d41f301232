//! End-to-end passes with in-memory collaborators.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use merchant_sync_core::{
    CatalogSettings, OfferId, RetryPolicy, SavePolicy, SourceId, SourceRecord, SyncSettings,
    TargetPayload,
};
use merchant_sync_engine::{
    ErrorLog, FilterCriteria, Outcome, RecordSource, RecordingSleeper, RemoteId, RunMode,
    SourceError, SyncEngine, SyncError, SyncRecordState, SyncState, UploadClient, UploadError,
};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Hands records over exactly as given, without filtering.
struct StaticSource(Vec<SourceRecord>);

impl RecordSource for StaticSource {
    fn fetch_all(&mut self, _: &FilterCriteria) -> Result<Vec<SourceRecord>, SourceError> {
        Ok(self.0.clone())
    }
}

struct DownSource;

impl RecordSource for DownSource {
    fn fetch_all(&mut self, _: &FilterCriteria) -> Result<Vec<SourceRecord>, SourceError> {
        Err(SourceError::Transport("connection refused".into()))
    }
}

/// Plays back scripted responses per offer id, then succeeds.
#[derive(Default)]
struct ScriptedClient {
    scripts: HashMap<OfferId, VecDeque<Result<RemoteId, UploadError>>>,
    always: Option<UploadError>,
    calls: Vec<TargetPayload>,
}

impl ScriptedClient {
    fn script(mut self, id: &str, responses: Vec<Result<RemoteId, UploadError>>) -> Self {
        self.scripts.insert(OfferId::from(id), responses.into());
        self
    }

    fn calls_for(&self, id: &str) -> usize {
        self.calls.iter().filter(|p| p.offer_id.as_str() == id).count()
    }
}

impl UploadClient for ScriptedClient {
    fn upload(&mut self, payload: &TargetPayload) -> Result<RemoteId, UploadError> {
        self.calls.push(payload.clone());
        if let Some(err) = &self.always {
            return Err(err.clone());
        }
        match self.scripts.get_mut(&payload.offer_id).and_then(VecDeque::pop_front) {
            Some(response) => response,
            None => Ok(RemoteId(format!("accounts/1/productInputs/{}", payload.offer_id))),
        }
    }
}

/// Observes the on-disk state at every upload.
struct StateCheckingClient {
    state_file: PathBuf,
    observed: Vec<usize>,
}

impl UploadClient for StateCheckingClient {
    fn upload(&mut self, payload: &TargetPayload) -> Result<RemoteId, UploadError> {
        let on_disk = SyncState::try_load_at(&self.state_file).map(|s| s.len()).unwrap_or(0);
        self.observed.push(on_disk);
        Ok(RemoteId(payload.offer_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(id: u64, price: f64) -> SourceRecord {
    SourceRecord {
        id: SourceId(id),
        name: Some(format!("Product {id}")),
        description: Some("<p>Described</p>".into()),
        image_link: Some(format!(
            "https://shop.example/web/image/product.template/{id}/image_1920"
        )),
        list_price: Some(price),
        published: true,
        ..Default::default()
    }
}

fn settings(dir: &Path) -> SyncSettings {
    SyncSettings {
        state_file: dir.join("Workflow").join("progress.json"),
        error_log: dir.join("Workflow").join("errors.jsonl"),
        record_delay: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        },
        save_policy: SavePolicy::EndOfRun,
    }
}

fn engine(settings: SyncSettings) -> SyncEngine<RecordingSleeper> {
    SyncEngine::with_sleeper(
        CatalogSettings::new("https://shop.example"),
        settings,
        RecordingSleeper::default(),
    )
}

fn seed_success(path: &Path, id: &str) {
    let mut state = SyncState::try_load_at(path).unwrap();
    state.put(
        OfferId::from(id),
        SyncRecordState {
            outcome: Outcome::Success,
            last_attempt_at: Utc::now(),
            remote_id: Some(RemoteId(format!("accounts/1/productInputs/{id}"))),
            last_error: None,
            attempts: 1,
            payload_digest: None,
        },
    );
    state.save().unwrap();
}

fn transient() -> Result<RemoteId, UploadError> {
    Err(UploadError::Transient {
        cause: "503 Service Unavailable".into(),
    })
}

// ---------------------------------------------------------------------------
// 1. The canonical three-record pass
// ---------------------------------------------------------------------------

#[test]
fn skipped_created_and_updated_after_retries() {
    init_logs();
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_success(&settings.state_file, "odoo_3");

    let mut undescribed = record(1, 5.0);
    undescribed.description = None;
    let mut source = StaticSource(vec![undescribed, record(2, 10.00), record(3, 20.0)]);
    let mut client = ScriptedClient::default().script(
        "odoo_3",
        vec![transient(), transient(), Ok(RemoteId::from("accounts/1/productInputs/odoo_3"))],
    );

    let mut engine = engine(settings.clone());
    let report = engine.run(&mut source, RunMode::Live(&mut client)).expect("run");

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped_details[0].field, "description");

    assert_eq!(client.calls_for("odoo_1"), 0);
    assert_eq!(client.calls_for("odoo_2"), 1);
    assert_eq!(client.calls_for("odoo_3"), 3);
    let created = client.calls.iter().find(|p| p.offer_id.as_str() == "odoo_2").unwrap();
    assert_eq!(created.product_attributes.price.amount_micros, 10_000_000);
    assert_eq!(
        engine.sleeper().slept,
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );

    let state = SyncState::try_load_at(&settings.state_file).unwrap();
    assert!(state.get(&OfferId::from("odoo_1")).is_none(), "skips never touch state");
    assert_eq!(state.get(&OfferId::from("odoo_2")).unwrap().attempts, 1);
    let third = state.get(&OfferId::from("odoo_3")).unwrap();
    assert_eq!(third.outcome, Outcome::Success);
    assert_eq!(third.attempts, 3);
    assert!(third.payload_digest.is_some());
}

// ---------------------------------------------------------------------------
// 2. Retry bound
// ---------------------------------------------------------------------------

#[test]
fn always_rate_limited_fails_after_max_attempts() {
    init_logs();
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut source = StaticSource(vec![record(7, 12.5)]);
    let mut client = ScriptedClient {
        always: Some(UploadError::RateLimited { retry_after: None }),
        ..Default::default()
    };

    let mut engine = engine(settings.clone());
    let report = engine.run(&mut source, RunMode::Live(&mut client)).expect("run");

    assert_eq!(client.calls.len(), 5);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].attempts, 5);
    assert_eq!(report.failures[0].kind, "rate_limited");
    let secs: Vec<u64> = engine.sleeper().slept.iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 4, 4], "doubling backoff capped at max_delay");

    let state = SyncState::try_load_at(&settings.state_file).unwrap();
    let entry = state.get(&OfferId::from("odoo_7")).unwrap();
    assert_eq!(entry.outcome, Outcome::Failure);
    assert_eq!(entry.attempts, 5);
    assert!(entry.last_error.as_deref().unwrap().contains("rate limited"));

    let logged = ErrorLog::new(&settings.error_log).read_all().unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].offer_id, OfferId::from("odoo_7"));
    assert_eq!(logged[0].run_started_at, report.started_at);
}

#[rstest]
#[case::auth(UploadError::AuthError("401".into()))]
#[case::rejected(UploadError::ValidationRejected { details: "invalid gtin".into() })]
#[case::fatal(UploadError::Fatal { cause: "418".into() })]
fn terminal_errors_fail_without_retry(#[case] err: UploadError) {
    let dir = TempDir::new().unwrap();
    let mut source = StaticSource(vec![record(1, 3.0), record(2, 4.0)]);
    let mut client = ScriptedClient::default().script("odoo_1", vec![Err(err)]);

    let mut engine = engine(settings(dir.path()));
    let report = engine.run(&mut source, RunMode::Live(&mut client)).expect("run");

    assert_eq!(client.calls_for("odoo_1"), 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1, "one failure must not abort the pass");
    assert!(engine.sleeper().slept.is_empty());
}

// ---------------------------------------------------------------------------
// 3. Idempotence and resumability
// ---------------------------------------------------------------------------

#[test]
fn second_run_on_unchanged_source_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut broken = record(3, 1.0);
    broken.image_link = None;
    let records = vec![record(1, 9.99), record(2, 19.99), broken];

    let mut client = ScriptedClient::default();
    let first = engine(settings.clone())
        .run(&mut StaticSource(records.clone()), RunMode::Live(&mut client))
        .expect("first");
    let second = engine(settings.clone())
        .run(&mut StaticSource(records), RunMode::Live(&mut client))
        .expect("second");

    assert_eq!((first.created, first.updated), (2, 0));
    assert_eq!((second.created, second.updated, second.unchanged), (0, 2, 2));
    assert_eq!(second.skipped, first.skipped);
    assert_eq!(second.failed, first.failed);

    let state = SyncState::try_load_at(&settings.state_file).unwrap();
    assert!(state.records().values().all(|s| s.outcome == Outcome::Success));
}

#[test]
fn failure_keeps_remote_id_and_later_success_counts_as_update() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_success(&settings.state_file, "odoo_5");

    let mut client = ScriptedClient::default()
        .script("odoo_5", vec![Err(UploadError::Fatal { cause: "500 then gave up".into() })]);
    engine(settings.clone())
        .run(&mut StaticSource(vec![record(5, 2.0)]), RunMode::Live(&mut client))
        .expect("failing run");

    let state = SyncState::try_load_at(&settings.state_file).unwrap();
    let entry = state.get(&OfferId::from("odoo_5")).unwrap();
    assert_eq!(entry.outcome, Outcome::Failure);
    assert!(entry.remote_id.is_some());

    let report = engine(settings)
        .run(&mut StaticSource(vec![record(5, 2.0)]), RunMode::Live(&mut client))
        .expect("recovering run");
    assert_eq!((report.created, report.updated), (0, 1));
}

#[test]
fn duplicate_identifier_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mut client = ScriptedClient::default();
    let report = engine(settings(dir.path()))
        .run(
            &mut StaticSource(vec![record(4, 1.0), record(4, 2.0)]),
            RunMode::Live(&mut client),
        )
        .expect("run");
    assert_eq!(client.calls.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.skipped_details[0].reason, "duplicate identifier");
}

#[test]
fn record_delay_only_between_uploads() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(dir.path());
    settings.record_delay = Duration::from_millis(500);
    let mut client = ScriptedClient::default();

    let mut engine = engine(settings);
    engine
        .run(
            &mut StaticSource(vec![record(1, 1.0), record(2, 1.0), record(3, 1.0)]),
            RunMode::Live(&mut client),
        )
        .expect("run");
    assert_eq!(engine.sleeper().slept, vec![Duration::from_millis(500); 2]);
}

// ---------------------------------------------------------------------------
// 4. Dry run
// ---------------------------------------------------------------------------

#[test]
fn dry_run_uploads_nothing_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut undescribed = record(2, 1.0);
    undescribed.description = Some("  ".into());

    let report = engine(settings.clone())
        .run(&mut StaticSource(vec![record(1, 1.0), undescribed]), RunMode::DryRun)
        .expect("run");

    assert!(report.dry_run);
    assert_eq!(report.would_upload, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded() + report.failed, 0);
    assert!(!settings.state_file.exists(), "dry run must not write state");
    assert!(!settings.error_log.exists(), "dry run must not write the error log");
}

// ---------------------------------------------------------------------------
// 5. State durability
// ---------------------------------------------------------------------------

#[test]
fn leftover_tmp_from_a_crash_does_not_hide_previous_state() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut client = ScriptedClient::default();
    engine(settings.clone())
        .run(&mut StaticSource(vec![record(1, 1.0)]), RunMode::Live(&mut client))
        .expect("run");
    let before = SyncState::try_load_at(&settings.state_file).unwrap();

    // Process died after writing the temp file but before the rename.
    let tmp = PathBuf::from(format!("{}.tmp", settings.state_file.display()));
    fs::write(&tmp, "{\"version\": 1, \"records\": {\"odoo_1\": {\"outc").unwrap();

    let after = SyncState::try_load_at(&settings.state_file).unwrap();
    assert_eq!(after.records(), before.records());
}

#[test]
fn corrupt_state_is_reported_and_run_starts_empty() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    fs::create_dir_all(settings.state_file.parent().unwrap()).unwrap();
    fs::write(&settings.state_file, "garbage").unwrap();

    let mut client = ScriptedClient::default();
    let report = engine(settings.clone())
        .run(&mut StaticSource(vec![record(1, 1.0)]), RunMode::Live(&mut client))
        .expect("run");

    assert!(report.state_warning.is_some());
    assert_eq!(report.created, 1);
    assert!(SyncState::try_load_at(&settings.state_file).is_ok(), "state rewritten cleanly");
}

#[test]
fn unavailable_source_aborts_without_touching_state() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_success(&settings.state_file, "odoo_1");
    let before = fs::read_to_string(&settings.state_file).unwrap();

    let mut client = ScriptedClient::default();
    let err = engine(settings.clone())
        .run(&mut DownSource, RunMode::Live(&mut client))
        .unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(_)), "got: {err}");
    assert_eq!(fs::read_to_string(&settings.state_file).unwrap(), before);
}

#[rstest]
#[case::end_of_run(SavePolicy::EndOfRun, vec![0, 0])]
#[case::every_record(SavePolicy::EveryRecord, vec![0, 1])]
fn save_policy_controls_when_state_hits_disk(
    #[case] policy: SavePolicy,
    #[case] expected: Vec<usize>,
) {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(dir.path());
    settings.save_policy = policy;
    let mut client = StateCheckingClient {
        state_file: settings.state_file.clone(),
        observed: Vec::new(),
    };

    engine(settings.clone())
        .run(
            &mut StaticSource(vec![record(1, 1.0), record(2, 1.0)]),
            RunMode::Live(&mut client),
        )
        .expect("run");

    assert_eq!(client.observed, expected);
    assert_eq!(SyncState::try_load_at(&settings.state_file).unwrap().len(), 2);
}

#[test]
fn failed_state_save_aborts_the_run_and_keeps_the_previous_state() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    seed_success(&settings.state_file, "odoo_1");
    let before = fs::read_to_string(&settings.state_file).unwrap();

    // The temp sibling is a directory, so the new state can never be written.
    let tmp = PathBuf::from(format!("{}.tmp", settings.state_file.display()));
    fs::create_dir(&tmp).unwrap();

    let mut client = ScriptedClient::default();
    let err = engine(settings.clone())
        .run(&mut StaticSource(vec![record(2, 1.0)]), RunMode::Live(&mut client))
        .unwrap_err();

    assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    assert_eq!(fs::read_to_string(&settings.state_file).unwrap(), before);
}

#[test]
fn state_path_taken_by_a_directory_is_a_run_error() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    fs::create_dir_all(&settings.state_file).unwrap();

    let mut client = ScriptedClient::default();
    let err = engine(settings.clone())
        .run(&mut StaticSource(vec![record(1, 1.0)]), RunMode::Live(&mut client))
        .unwrap_err();

    assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    assert!(settings.state_file.is_dir());
    let tmp = PathBuf::from(format!("{}.tmp", settings.state_file.display()));
    assert!(!tmp.exists(), "no temp file may be left behind");
}
