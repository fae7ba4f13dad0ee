use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use live_core::{
    poll_once, spawn_poller, ChangeSet, Endpoints, Item, ListQuery, LiveConfig, LiveSession,
    MemoryStore, PollError, PollState, SharedStore, ViewObserver,
};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn list_body(ids: &[u64]) -> serde_json::Value {
    let data: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            json!({
                "no": id.to_string(),
                "headnum": "0",
                "headtext": "일반",
                "subject": format!("post {id}"),
                "name": "ㅇㅇ",
                "user_id": "",
                "ip": "1.2",
                "write_time": "12:00",
                "hit": "1",
                "total_comment": "0",
                "recommend": 0,
                "ismember": 0,
                "nicktype": "",
                "title_icon": "sp-lst-txt"
            })
        })
        .collect();
    json!({ "gall_list": { "data": data } })
}

fn detail_body(id: &str) -> String {
    format!(r#"<html><body><div class="thum-txtin"><p>content {id}</p></div></body></html>"#)
}

async fn mount_details(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/board/gall/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("x")))
        .mount(server)
        .await;
}

async fn session_for(server: &MockServer, config: LiveConfig) -> LiveSession {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let config = LiveConfig {
        endpoints: Endpoints::rooted_at(&server.uri()),
        retry_backoff_ms: 1,
        ..config
    };
    config.save(store.as_ref()).await.unwrap();
    LiveSession::open(Client::new(), store, ListQuery::new("gall")).await
}

#[derive(Default)]
struct ChangeLog {
    changes: Mutex<Vec<ChangeSet>>,
}

impl ViewObserver for ChangeLog {
    fn apply(&self, changes: &ChangeSet) {
        self.changes.lock().unwrap().push(changes.clone());
    }
}

#[tokio::test]
async fn cycle_inserts_and_caches_new_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[10, 30, 20])))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let log = Arc::new(ChangeLog::default());
    let session = session_for(&server, LiveConfig::default())
        .await
        .with_observer(log.clone());
    let config = session.config().await;

    let report = session.run_cycle(&config).await.unwrap();
    assert_eq!(report.inserted_ids, vec![30, 20, 10]);
    assert_eq!(report.fetch.succeeded().len(), 3);

    {
        let view = session.view().read().await;
        assert_eq!(view.ids(), vec![30, 20, 10]);
        assert!(view.iter().all(|item| item.detail_available));
    }
    assert!(session.cache().has("gall", 20).await);
    assert_eq!(log.changes.lock().unwrap()[0].inserted, vec![30, 20, 10]);

    // Same list again: nothing new to fetch.
    let report = session.run_cycle(&config).await.unwrap();
    assert!(report.inserted_ids.is_empty());
    assert!(report.fetch.outcomes.is_empty());
}

#[tokio::test]
async fn invalid_list_json_is_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let session = session_for(&server, LiveConfig::default()).await;
    let config = session.config().await;

    let err = session.run_cycle(&config).await.unwrap_err();
    assert!(matches!(err, PollError::Parse(_)));
    assert!(poll_once(&session, &config).await.is_none());
    assert!(session.view().read().await.is_empty());
}

#[tokio::test]
async fn disabled_config_skips_the_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[1])))
        .expect(0)
        .mount(&server)
        .await;

    let config = LiveConfig {
        enabled: false,
        ..LiveConfig::default()
    };
    let session = session_for(&server, config).await;
    let config = session.config().await;

    assert!(poll_once(&session, &config).await.is_none());
}

#[tokio::test]
async fn failing_details_do_not_fail_the_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[6, 5])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board/gall/5"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board/gall/6"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("6")))
        .mount(&server)
        .await;

    let session = session_for(&server, LiveConfig::default()).await;
    let config = session.config().await;

    let report = session.run_cycle(&config).await.unwrap();
    assert_eq!(report.fetch.failed(), vec![5]);
    assert_eq!(report.fetch.outcome(5).unwrap().attempts, 1);
    assert_eq!(report.fetch.succeeded(), vec![6]);

    let view = session.view().read().await;
    assert!(view.get(6).unwrap().detail_available);
    assert!(!view.get(5).unwrap().detail_available);
}

#[tokio::test]
async fn bootstrap_seeds_view_and_fetches_missing_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board/gall"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>list</html>"))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let session = session_for(&server, LiveConfig::default()).await;
    session.cache().set("gall", 10, "<p>old</p>".into()).await;

    let remote = live_core::listing::parse_list(
        &json!({ "gall_list": { "data": [
            { "no": 1, "headnum": -2100000000, "subject": "rules", "title_icon": "icon_notice" },
            { "no": 20, "subject": "a", "title_icon": "sp-lst-txt" },
            { "no": 10, "subject": "b", "title_icon": "sp-lst-txt" }
        ] } })
        .to_string(),
    )
    .unwrap();
    let initial: Vec<Item> = remote
        .iter()
        .filter_map(|entry| Item::from_remote("gall", entry))
        .collect();

    let report = session.bootstrap(initial).await.unwrap();
    assert_eq!(report.succeeded(), vec![20]);

    let view = session.view().read().await;
    assert_eq!(view.ids(), vec![1, 20, 10]);
    assert!(view.get(1).unwrap().is_notice);
    assert!(view.get(10).unwrap().detail_available);
    assert!(view.get(20).unwrap().detail_available);
}

#[tokio::test]
async fn bootstrap_rejects_restricted_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board/gall"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<div class="penalty-box">blocked</div>"#),
        )
        .mount(&server)
        .await;

    let session = session_for(&server, LiveConfig::default()).await;
    let err = session.bootstrap(Vec::new()).await.unwrap_err();
    assert!(matches!(err, PollError::AccessRestricted(ref id) if id == "gall"));
}

#[tokio::test]
async fn spawned_poller_runs_until_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[2, 1])))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let config = LiveConfig {
        interval_ms: 20,
        ..LiveConfig::default()
    };
    let session = Arc::new(session_for(&server, config).await);
    let handle = spawn_poller(session.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while session.cache().len().await < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("poller never cached the list");

    let mut state = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), state.wait_for(|s| *s == PollState::Idle))
        .await
        .expect("poller never went idle")
        .unwrap();

    handle.stop().await.expect("stop poller");
    assert_eq!(session.view().read().await.ids(), vec![2, 1]);
}

/// Serves the list after `delay` and records when each request arrived.
struct SlowList {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowList {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_json(list_body(&[1]))
            .set_delay(self.delay)
    }
}

async fn list_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/ajax/response-list")
        .count()
}

#[tokio::test]
async fn slow_cycles_never_overlap() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(SlowList {
            delay: Duration::from_millis(150),
            arrivals: arrivals.clone(),
        })
        .mount(&server)
        .await;
    mount_details(&server).await;

    let config = LiveConfig {
        interval_ms: 10,
        ..LiveConfig::default()
    };
    let session = Arc::new(session_for(&server, config).await);
    let handle = spawn_poller(session.clone());

    let mut state = handle.subscribe();
    let mut transitions = Vec::new();
    let _ = tokio::time::timeout(Duration::from_millis(700), async {
        while state.changed().await.is_ok() {
            transitions.push(*state.borrow_and_update());
        }
    })
    .await;
    handle.stop().await.expect("stop poller");

    let arrivals = arrivals.lock().unwrap().clone();
    assert!(arrivals.len() >= 2, "expected several cycles, got {}", arrivals.len());
    assert!(arrivals.len() <= 5, "cycles overlapped: {} polls", arrivals.len());
    for pair in arrivals.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(150));
    }

    // Polling and Idle strictly alternate.
    assert!(!transitions.is_empty());
    for pair in transitions.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test]
async fn disabling_takes_effect_without_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax/response-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(&[1])))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let config = LiveConfig {
        interval_ms: 20,
        ..LiveConfig::default()
    };
    let session = Arc::new(session_for(&server, config).await);
    let handle = spawn_poller(session.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while list_requests(&server).await < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("poller never polled");

    let mut config = session.config().await;
    config.enabled = false;
    config.save(session.store().as_ref()).await.unwrap();

    // Let a cycle already in flight settle.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let mut state = handle.subscribe();
    state.borrow_and_update();
    let settled = list_requests(&server).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(list_requests(&server).await, settled);
    assert_eq!(handle.state(), PollState::Idle);
    assert!(!state.has_changed().unwrap(), "disabled loop published a state change");

    handle.stop().await.expect("stop poller");
}
