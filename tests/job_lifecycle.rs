//! Lifecycle tests for the orchestrator and the three worker loops.
//!
//! These run the real loops against a mock upstream with
//! millisecond-scale timings, so the coordination behavior (idempotent
//! start, cancellation latency, ads self-termination, tasks/ads mutual
//! exclusion, mining failure cadence) is exercised end to end.

use serde_json::json;
use std::time::Duration;
use teafarm::api::TeaBankClient;
use teafarm::config::{ApiConfig, JobTimings};
use teafarm::{FarmError, JobKind, JobState, Orchestrator, StartOutcome};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: i64 = 42;

/// Timings shrunk so real loops finish within a test budget.
fn fast_timings() -> JobTimings {
    JobTimings {
        farm_interval: Duration::from_secs(3600),
        sweep_interval: Duration::from_secs(3600),
        task_pause: Duration::from_millis(2),
        ad_interval: Duration::from_millis(2),
        ads_block_recheck: Duration::from_millis(10),
        error_cooldown: Duration::from_millis(20),
        ads_target: 10,
    }
}

fn orchestrator_for(server: &MockServer, timings: JobTimings) -> Orchestrator {
    let client = TeaBankClient::new(ApiConfig {
        base_url: server.uri(),
        retry_backoff_secs: 0,
        ..ApiConfig::default()
    })
    .expect("client builds");
    Orchestrator::new(client, timings)
}

fn deep_link() -> String {
    let user_json = r#"{"id":42,"first_name":"A","last_name":"B"}"#;
    let payload = format!("user={}&auth_date=1700000000", urlencoding::encode(user_json));
    format!(
        "https://app.teabank.io/#tgWebAppData={}&tgWebAppVersion=7.0",
        urlencoding::encode(&payload)
    )
}

/// Mount the registration endpoint so bootstrap succeeds.
async fn mount_registration(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "checkOrRegisterUser"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(server)
        .await;
}

/// Poll until the condition holds or the deadline passes.
async fn wait_until<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

async fn requests_to(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("requests recorded")
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .count()
}

#[tokio::test]
async fn start_without_bootstrap_is_no_session() {
    let server = MockServer::start().await;
    let orch = orchestrator_for(&server, fast_timings());

    let err = orch.start(USER, JobKind::Mining).unwrap_err();
    assert!(matches!(err, FarmError::NoSession(42)), "got: {err:?}");
}

#[tokio::test]
async fn double_start_yields_exactly_one_worker() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "startFarming"})))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");

    assert_eq!(orch.start(USER, JobKind::Mining).unwrap(), StartOutcome::Started);
    assert_eq!(
        orch.start(USER, JobKind::Mining).unwrap(),
        StartOutcome::AlreadyRunning
    );
    assert_eq!(orch.status(USER).mining, JobState::Running);

    // One worker means one farming call, even after a settle delay.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(requests_to(&server, "/user-api/").await, 2); // bootstrap + 1 farm
}

#[tokio::test]
async fn stop_is_observed_within_cancellation_latency() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "startFarming"})))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    orch.start(USER, JobKind::Mining).expect("start");

    assert!(orch.stop(USER, JobKind::Mining));
    let stopped = wait_until(Duration::from_secs(1), || {
        orch.status(USER).mining == JobState::Stopped
    })
    .await;
    assert!(stopped, "mining did not stop within the latency bound");
}

#[tokio::test]
async fn stop_without_running_job_is_a_noop() {
    let server = MockServer::start().await;
    mount_registration(&server).await;

    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    assert!(!orch.stop(USER, JobKind::Ads));
}

#[tokio::test]
async fn ads_worker_stops_after_exactly_ten_successes() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/ads-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    orch.start(USER, JobKind::Ads).expect("start");

    let finished = wait_until(Duration::from_secs(2), || {
        orch.status(USER).ads == JobState::Stopped
    })
    .await;
    assert!(finished, "ads worker did not self-terminate");

    // Settle, then confirm no 11th attempt was issued.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(requests_to(&server, "/ads-api/").await, 10);
}

#[tokio::test]
async fn ads_worker_keeps_attempting_past_rejections() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    // First two attempts rejected; only the 200s count toward the target.
    Mock::given(method("POST"))
        .and(path("/ads-api/"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ads-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let timings = JobTimings {
        ads_target: 3,
        ..fast_timings()
    };
    let orch = orchestrator_for(&server, timings);
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    orch.start(USER, JobKind::Ads).expect("start");

    let finished = wait_until(Duration::from_secs(2), || {
        orch.status(USER).ads == JobState::Stopped
    })
    .await;
    assert!(finished);
    assert_eq!(requests_to(&server, "/ads-api/").await, 5); // 2 rejected + 3 counted
}

#[tokio::test]
async fn tasks_idle_while_ads_is_live_and_resume_after() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/tasks-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ads-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Ads paced slowly so the handle stays live while tasks would sweep.
    let timings = JobTimings {
        ad_interval: Duration::from_millis(200),
        ads_target: 1000,
        ..fast_timings()
    };
    let orch = orchestrator_for(&server, timings);
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");

    orch.start(USER, JobKind::Ads).expect("start ads");
    orch.start(USER, JobKind::Tasks).expect("start tasks");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        requests_to(&server, "/tasks-api/").await,
        0,
        "tasks swept while ads was live"
    );

    orch.stop(USER, JobKind::Ads);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut resumed = false;
    while tokio::time::Instant::now() < deadline {
        if requests_to(&server, "/tasks-api/").await > 0 {
            resumed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(resumed, "tasks never resumed after ads stopped");
}

#[tokio::test]
async fn running_sweep_aborts_when_ads_becomes_live() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/tasks-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ads-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Slow per-task pacing keeps the sweep in flight; ads is paced so its
    // handle stays live for the rest of the test.
    let timings = JobTimings {
        task_pause: Duration::from_millis(30),
        ad_interval: Duration::from_millis(500),
        ads_target: 1000,
        ..fast_timings()
    };
    let orch = orchestrator_for(&server, timings);
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");

    orch.start(USER, JobKind::Tasks).expect("start tasks");
    let sweeping = wait_until(Duration::from_secs(2), || {
        orch.status(USER).tasks == JobState::Running
    })
    .await;
    assert!(sweeping);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while requests_to(&server, "/tasks-api/").await == 0 {
        assert!(tokio::time::Instant::now() < deadline, "sweep never began");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    orch.start(USER, JobKind::Ads).expect("start ads");

    // One call may already be in flight; after the pause granularity the
    // sweep must have yielded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = requests_to(&server, "/tasks-api/").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        requests_to(&server, "/tasks-api/").await,
        settled,
        "sweep kept issuing task calls while ads was live"
    );

    let status = orch.status(USER);
    assert_eq!(status.ads, JobState::Running);
    assert_eq!(status.tasks, JobState::Running, "tasks should pause, not exit");
}

#[tokio::test]
async fn mining_retries_on_failure_sooner_than_full_interval() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "startFarming"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // Full interval is an hour; only the error cooldown can explain
    // repeated attempts within the test budget.
    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    orch.start(USER, JobKind::Mining).expect("start");

    tokio::time::sleep(Duration::from_millis(300)).await;
    let farm_calls = server
        .received_requests()
        .await
        .expect("requests recorded")
        .iter()
        .filter(|r| {
            r.url.path() == "/user-api/"
                && String::from_utf8_lossy(&r.body).contains("startFarming")
        })
        .count();
    assert!(
        farm_calls >= 6,
        "expected several retried farming attempts, saw {farm_calls}"
    );

    orch.stop(USER, JobKind::Mining);
}

#[tokio::test]
async fn shutdown_stops_every_worker_within_grace() {
    let server = MockServer::start().await;
    mount_registration(&server).await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "startFarming"})))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks-api/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server, fast_timings());
    orch.bootstrap(USER, &deep_link()).await.expect("bootstrap");
    orch.start_all(USER).expect("start all");

    assert!(orch.shutdown(Duration::from_secs(2)).await);
    let status = orch.status(USER);
    assert_eq!(status.mining, JobState::Stopped);
    assert_eq!(status.tasks, JobState::Stopped);
}

#[tokio::test]
async fn rebootstrap_overwrites_session_for_new_workers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "checkOrRegisterUser"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-a"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user-api/"))
        .and(body_partial_json(json!({"task": "checkOrRegisterUser"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-b"})))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server, fast_timings());
    let first = orch.bootstrap(USER, &deep_link()).await.expect("first");
    let second = orch.bootstrap(USER, &deep_link()).await.expect("second");
    assert_eq!(first.auth_token, "tok-a");
    assert_eq!(second.auth_token, "tok-b");
}
