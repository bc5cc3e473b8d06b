use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvest_core::{FetchOutcome, FetchStatus, FetchTarget};
use harvest_engine::{
    EngineEvent, EngineSettings, FailureKind, FetchEngine, FetchError, FetchMetadata, FetchOutput,
    FetchSettings, Fetcher, ProgressSink, ReqwestFetcher, RetryPolicy, Sleeper,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Per-URL scripted responses; the last entry repeats once the script runs out.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Vec<Result<String, FailureKind>>>>,
    calls: Mutex<HashMap<String, usize>>,
    hang: Vec<String>,
}

impl ScriptedFetcher {
    fn with(mut self, url: &str, script: Vec<Result<&str, FailureKind>>) -> Self {
        let script = script
            .into_iter()
            .map(|r| r.map(str::to_string))
            .collect();
        self.scripts.get_mut().unwrap().insert(url.to_string(), script);
        self
    }

    fn hanging(mut self, url: &str) -> Self {
        self.hang.push(url.to_string());
        self
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if self.hang.iter().any(|h| h == url) {
            std::future::pending::<()>().await;
        }
        let step = {
            let scripts = self.scripts.lock().unwrap();
            let script = scripts.get(url).expect("unscripted url");
            script[(call - 1).min(script.len() - 1)].clone()
        };
        match step {
            Ok(body) => Ok(FetchOutput {
                metadata: FetchMetadata {
                    original_url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    content_type: None,
                    encoding: "UTF-8".to_string(),
                    byte_len: body.len() as u64,
                    lossy: false,
                },
                body,
            }),
            Err(kind) => Err(FetchError::new(kind, "scripted")),
        }
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn target(entity: &str, page: u32) -> FetchTarget {
    FetchTarget {
        entity: entity.to_string(),
        page,
        url: format!("mock://{entity}/{page}"),
    }
}

fn engine(fetcher: Arc<ScriptedFetcher>, sleeper: Arc<RecordingSleeper>) -> FetchEngine {
    FetchEngine::new(fetcher, EngineSettings::default()).with_sleeper(sleeper)
}

fn sorted(mut outcomes: Vec<FetchOutcome>) -> Vec<FetchOutcome> {
    outcomes.sort_by(|a, b| (&a.entity, a.page).cmp(&(&b.entity, b.page)));
    outcomes
}

#[tokio::test]
async fn retryable_failures_exhaust_after_three_attempts() {
    engine_logging::initialize_for_tests();
    let fetcher = Arc::new(
        ScriptedFetcher::default().with("mock://a/1", vec![Err(FailureKind::Timeout)]),
    );
    let sleeper = Arc::new(RecordingSleeper::default());
    let sink = TestSink::default();

    let outcomes = engine(fetcher.clone(), sleeper.clone())
        .run(vec![target("a", 1)], &sink)
        .await;

    assert_eq!(
        outcomes,
        vec![FetchOutcome {
            entity: "a".into(),
            page: 1,
            attempts: 3,
            status: FetchStatus::ExhaustedRetries,
        }]
    );
    assert_eq!(fetcher.calls("mock://a/1"), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    let retries = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, EngineEvent::Retrying { .. }))
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn rate_limit_then_success_recovers() {
    let fetcher = Arc::new(ScriptedFetcher::default().with(
        "mock://a/1",
        vec![
            Err(FailureKind::HttpStatus(429)),
            Err(FailureKind::Network),
            Ok("<html>late</html>"),
        ],
    ));
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcomes = engine(fetcher.clone(), sleeper.clone())
        .run(vec![target("a", 1)], &TestSink::default())
        .await;

    assert_eq!(outcomes[0].attempts, 3);
    assert_eq!(
        outcomes[0].status,
        FetchStatus::Success("<html>late</html>".into())
    );
    assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn terminal_status_is_not_retried() {
    let fetcher = Arc::new(
        ScriptedFetcher::default().with("mock://a/1", vec![Err(FailureKind::HttpStatus(404))]),
    );
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcomes = engine(fetcher.clone(), sleeper.clone())
        .run(vec![target("a", 1)], &TestSink::default())
        .await;

    assert_eq!(outcomes[0].status, FetchStatus::HttpError(404));
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(fetcher.calls("mock://a/1"), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deterministic_failures_are_rejected_without_retry() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with("mock://r/1", vec![Err(FailureKind::InvalidUrl)])
            .with(
                "mock://r/2",
                vec![Err(FailureKind::TooLarge {
                    max_bytes: 10,
                    actual: Some(11),
                })],
            ),
    );
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcomes = sorted(
        engine(fetcher.clone(), sleeper.clone())
            .run(vec![target("r", 1), target("r", 2)], &TestSink::default())
            .await,
    );

    assert_eq!(outcomes[0].status, FetchStatus::Rejected("invalid url".into()));
    assert!(matches!(outcomes[1].status, FetchStatus::Rejected(_)));
    assert!(outcomes.iter().all(|o| o.attempts == 1));
    assert_eq!(fetcher.calls("mock://r/1"), 1);
    assert_eq!(fetcher.calls("mock://r/2"), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn successful_fetch_reports_its_metadata() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with("mock://m/1", vec![Err(FailureKind::Network), Ok("<p>hi</p>")]),
    );
    let sink = TestSink::default();

    engine(fetcher, Arc::new(RecordingSleeper::default()))
        .run(vec![target("m", 1)], &sink)
        .await;

    let events = sink.events.lock().unwrap();
    let fetched: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Fetched {
                attempt, metadata, ..
            } => Some((*attempt, metadata.byte_len, metadata.final_url.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, vec![(2, 9, "mock://m/1".to_string())]);
}

#[tokio::test]
async fn one_failing_target_does_not_affect_siblings() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with("mock://t/1", vec![Ok("one")])
            .with("mock://t/2", vec![Err(FailureKind::HttpStatus(500))])
            .with("mock://t/3", vec![Err(FailureKind::Timeout), Ok("three")]),
    );
    let sleeper = Arc::new(RecordingSleeper::default());

    let outcomes = engine(fetcher, sleeper)
        .run(vec![target("t", 1), target("t", 2), target("t", 3)], &TestSink::default())
        .await;

    let statuses: Vec<_> = sorted(outcomes).into_iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            FetchStatus::Success("one".into()),
            FetchStatus::HttpError(500),
            FetchStatus::Success("three".into()),
        ]
    );
}

#[tokio::test]
async fn bounded_in_flight_still_resolves_everything() {
    let mut fetcher = ScriptedFetcher::default();
    let mut targets = Vec::new();
    for page in 1..=10 {
        let t = target("p", page);
        fetcher = fetcher.with(&t.url, vec![Ok("body")]);
        targets.push(t);
    }
    let settings = EngineSettings {
        max_in_flight: Some(2),
        ..EngineSettings::default()
    };
    let outcomes = FetchEngine::new(Arc::new(fetcher), settings)
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .run(targets, &TestSink::default())
        .await;
    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(FetchOutcome::is_success));
}

#[tokio::test]
async fn run_deadline_abandons_hung_targets() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with("mock://h/1", vec![Ok("fine")])
            .hanging("mock://h/2"),
    );
    let settings = EngineSettings {
        run_deadline: Some(Duration::from_millis(100)),
        ..EngineSettings::default()
    };
    let outcomes = FetchEngine::new(fetcher, settings)
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .run(vec![target("h", 1), target("h", 2)], &TestSink::default())
        .await;

    let outcomes = sorted(outcomes);
    assert_eq!(outcomes[0].status, FetchStatus::Success("fine".into()));
    assert_eq!(outcomes[1].status, FetchStatus::Abandoned);
    assert_eq!(outcomes[1].attempts, 1);
}

#[tokio::test]
async fn empty_target_list_is_a_no_op() {
    let outcomes = engine(
        Arc::new(ScriptedFetcher::default()),
        Arc::new(RecordingSleeper::default()),
    )
    .run(Vec::new(), &TestSink::default())
    .await;
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn http_engine_isolates_server_errors() {
    let server = MockServer::start().await;
    for (page, status) in [(1, 200), (2, 500), (3, 200)] {
        Mock::given(method("GET"))
            .and(path(format!("/team/{page}")))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(format!("page {page}"), "text/html"),
            )
            .mount(&server)
            .await;
    }
    let targets = (1..=3)
        .map(|page| FetchTarget {
            entity: "team".into(),
            page,
            url: format!("{}/team/{page}", server.uri()),
        })
        .collect();

    let fetcher = Arc::new(ReqwestFetcher::new(FetchSettings::default()).unwrap());
    let settings = EngineSettings {
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..EngineSettings::default()
    };
    let outcomes = sorted(
        FetchEngine::new(fetcher, settings)
            .run(targets, &TestSink::default())
            .await,
    );

    assert_eq!(outcomes[0].status, FetchStatus::Success("page 1".into()));
    assert_eq!(outcomes[1].status, FetchStatus::HttpError(500));
    assert_eq!(outcomes[1].attempts, 1);
    assert_eq!(outcomes[2].status, FetchStatus::Success("page 3".into()));
}
