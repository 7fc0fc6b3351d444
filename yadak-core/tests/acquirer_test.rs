use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use yadak_core::browser::{
    AcquirerConfig, BlockHeuristics, BrowserAcquirer, BrowserEngineId, BrowserError, BrowserResult,
    EngineDriver, EngineSession, StealthProfile,
};

/// What a fake engine does when the acquirer drives it.
#[derive(Debug, Clone)]
enum EngineScript {
    LaunchFailure,
    NavigationTimeout,
    Page { title: String, body: String },
    PageWithBrokenClose { title: String, body: String },
}

type EventLog = Rc<RefCell<Vec<String>>>;

struct FakeDriver {
    scripts: HashMap<BrowserEngineId, EngineScript>,
    events: EventLog,
}

impl FakeDriver {
    fn new(scripts: Vec<(BrowserEngineId, EngineScript)>) -> (Arc<Self>, EventLog) {
        let events: EventLog = Rc::new(RefCell::new(Vec::new()));
        let driver = Arc::new(Self {
            scripts: scripts.into_iter().collect(),
            events: events.clone(),
        });
        (driver, events)
    }
}

#[async_trait(?Send)]
impl EngineDriver for FakeDriver {
    async fn launch(
        &self,
        engine: BrowserEngineId,
        _profile: &StealthProfile,
    ) -> BrowserResult<Box<dyn EngineSession>> {
        let script = self
            .scripts
            .get(&engine)
            .cloned()
            .unwrap_or(EngineScript::LaunchFailure);
        if matches!(script, EngineScript::LaunchFailure) {
            self.events.borrow_mut().push(format!("launch-fail {engine}"));
            return Err(BrowserError::Launch(format!("{engine} is not installed")));
        }
        self.events.borrow_mut().push(format!("launch {engine}"));
        Ok(Box::new(FakeSession {
            engine,
            script,
            events: self.events.clone(),
            closed: false,
        }))
    }
}

struct FakeSession {
    engine: BrowserEngineId,
    script: EngineScript,
    events: EventLog,
    closed: bool,
}

#[async_trait(?Send)]
impl EngineSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.events
            .borrow_mut()
            .push(format!("navigate {} {url}", self.engine));
        match &self.script {
            EngineScript::NavigationTimeout => {
                Err(BrowserError::Timeout(format!("navigation to {url}")))
            }
            _ => Ok(()),
        }
    }

    async fn title(&mut self) -> BrowserResult<String> {
        match &self.script {
            EngineScript::Page { title, .. } | EngineScript::PageWithBrokenClose { title, .. } => {
                Ok(title.clone())
            }
            _ => Ok(String::new()),
        }
    }

    async fn body_text(&mut self) -> BrowserResult<String> {
        match &self.script {
            EngineScript::Page { body, .. } | EngineScript::PageWithBrokenClose { body, .. } => {
                Ok(body.clone())
            }
            _ => Ok(String::new()),
        }
    }

    async fn evaluate(&mut self, _script: &str) -> BrowserResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn click(&mut self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> BrowserResult<()> {
        Ok(())
    }

    async fn idle(&mut self, _range_ms: (u64, u64)) -> BrowserResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        assert!(!self.closed, "close must not be called twice");
        self.closed = true;
        self.events.borrow_mut().push(format!("close {}", self.engine));
        if matches!(self.script, EngineScript::PageWithBrokenClose { .. }) {
            return Err(BrowserError::Unexpected("engine already gone".to_string()));
        }
        Ok(())
    }
}

fn acquirer(driver: Arc<FakeDriver>, fallback: Vec<BrowserEngineId>) -> BrowserAcquirer {
    let profile = StealthProfile {
        user_agent: "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36".into(),
        viewport_width: 390,
        viewport_height: 844,
        locale: "fa-IR".into(),
        languages: vec!["fa-IR".into()],
        accept_language: None,
        bypass_csp: true,
    };
    let config = AcquirerConfig {
        fallback,
        navigation_timeout: Duration::from_millis(50),
        human_delay_ms: (0, 0),
        heuristics: BlockHeuristics::default(),
    };
    BrowserAcquirer::new(driver, profile, config)
}

fn shop_body() -> String {
    "brake pads and timing belts for sale ".repeat(50)
}

#[tokio::test]
async fn every_engine_failing_exhausts_in_configured_order() {
    let (driver, events) = FakeDriver::new(vec![
        (BrowserEngineId::Chromium, EngineScript::LaunchFailure),
        (BrowserEngineId::Chrome, EngineScript::NavigationTimeout),
        (BrowserEngineId::Edge, EngineScript::LaunchFailure),
    ]);
    let acquirer = acquirer(
        driver,
        vec![
            BrowserEngineId::Chromium,
            BrowserEngineId::Chrome,
            BrowserEngineId::Edge,
        ],
    );

    let result = acquirer.acquire("https://stopyadak.com").await;
    match result {
        Err(BrowserError::ExhaustedFallback(url)) => {
            assert_eq!(url, "https://stopyadak.com");
        }
        other => panic!("expected exhausted fallback, got {other:?}"),
    }

    let log = events.borrow();
    assert_eq!(
        *log,
        vec![
            "launch-fail chromium",
            "launch chrome",
            "navigate chrome https://stopyadak.com",
            "close chrome",
            "launch-fail edge",
        ]
    );
}

#[tokio::test]
async fn first_clean_engine_wins_and_later_ones_stay_untouched() {
    let (driver, events) = FakeDriver::new(vec![
        (
            BrowserEngineId::Chromium,
            EngineScript::Page {
                title: "Saipa Parts Shop".into(),
                body: shop_body(),
            },
        ),
        (BrowserEngineId::Chrome, EngineScript::LaunchFailure),
    ]);
    let acquirer = acquirer(
        driver,
        vec![BrowserEngineId::Chromium, BrowserEngineId::Chrome],
    );

    let acquired = acquirer
        .acquire("https://stopyadak.com")
        .await
        .expect("first engine is clean");
    assert_eq!(acquired.engine, BrowserEngineId::Chromium);
    acquired.close().await;

    let log = events.borrow();
    assert!(!log.iter().any(|event| event.contains("chrome")));
}

#[tokio::test]
async fn title_marker_blocks_even_with_a_long_body() {
    let (driver, _events) = FakeDriver::new(vec![(
        BrowserEngineId::Chromium,
        EngineScript::Page {
            title: "Just a moment...".into(),
            body: shop_body(),
        },
    )]);
    let acquirer = acquirer(driver, vec![BrowserEngineId::Chromium]);

    let result = acquirer.acquire("https://stopyadak.com").await;
    assert!(matches!(result, Err(BrowserError::ExhaustedFallback(_))));
}

#[tokio::test]
async fn thin_body_is_treated_as_a_block() {
    let (driver, _events) = FakeDriver::new(vec![(
        BrowserEngineId::Chromium,
        EngineScript::Page {
            title: "Shop".into(),
            body: "nearly empty".into(),
        },
    )]);
    let acquirer = acquirer(driver, vec![BrowserEngineId::Chromium]);

    let result = acquirer.acquire("https://stopyadak.com").await;
    assert!(matches!(result, Err(BrowserError::ExhaustedFallback(_))));
}

#[tokio::test]
async fn failed_attempts_close_exactly_once_even_when_close_errors() {
    let (driver, events) = FakeDriver::new(vec![
        (
            BrowserEngineId::Chromium,
            EngineScript::PageWithBrokenClose {
                title: "Just a moment...".into(),
                body: shop_body(),
            },
        ),
        (
            BrowserEngineId::Chrome,
            EngineScript::Page {
                title: "Shop".into(),
                body: shop_body(),
            },
        ),
    ]);
    let acquirer = acquirer(
        driver,
        vec![BrowserEngineId::Chromium, BrowserEngineId::Chrome],
    );

    // The chromium close error is swallowed; chrome still gets its turn.
    let acquired = acquirer
        .acquire("https://stopyadak.com")
        .await
        .expect("second engine is clean");
    assert_eq!(acquired.engine, BrowserEngineId::Chrome);
    acquired.close().await;

    let log = events.borrow();
    let chromium_closes = log.iter().filter(|e| *e == "close chromium").count();
    assert_eq!(chromium_closes, 1);
}

#[tokio::test]
async fn timed_out_engine_is_closed_before_the_next_launches() {
    let (driver, events) = FakeDriver::new(vec![
        (BrowserEngineId::Chromium, EngineScript::NavigationTimeout),
        (
            BrowserEngineId::Chrome,
            EngineScript::Page {
                title: "Shop".into(),
                body: shop_body(),
            },
        ),
    ]);
    let acquirer = acquirer(
        driver,
        vec![BrowserEngineId::Chromium, BrowserEngineId::Chrome],
    );

    let acquired = acquirer
        .acquire("https://stopyadak.com")
        .await
        .expect("second engine is clean");
    assert_eq!(acquired.engine, BrowserEngineId::Chrome);
    acquired.close().await;

    let log = events.borrow();
    let close_chromium = log
        .iter()
        .position(|e| e == "close chromium")
        .expect("chromium was closed");
    let launch_chrome = log
        .iter()
        .position(|e| e == "launch chrome")
        .expect("chrome was launched");
    assert!(close_chromium < launch_chrome);
}

#[tokio::test]
async fn single_blocked_engine_means_one_attempt_and_failure() {
    let (driver, events) = FakeDriver::new(vec![(
        BrowserEngineId::Chromium,
        EngineScript::Page {
            title: "Just a moment...".into(),
            body: shop_body(),
        },
    )]);
    let acquirer = acquirer(driver, vec![BrowserEngineId::Chromium]);

    let result = acquirer.acquire("https://stopyadak.com").await;
    assert!(matches!(result, Err(BrowserError::ExhaustedFallback(_))));

    let log = events.borrow();
    let launches = log.iter().filter(|e| e.starts_with("launch")).count();
    assert_eq!(launches, 1);
}

#[tokio::test]
async fn empty_fallback_list_is_a_configuration_error() {
    let (driver, _events) = FakeDriver::new(vec![]);
    let acquirer = acquirer(driver, vec![]);

    let result = acquirer.acquire("https://stopyadak.com").await;
    assert!(matches!(result, Err(BrowserError::Configuration(_))));
}
