//! Integration test: real WebDriver client + browser resolver against a fake driver.

mod common;

use common::webdriver_server::{self, FakePage, Media};
use pahe_core::browser::{LaunchOptions, WebDriverLauncher};
use pahe_core::catalog::EpisodeRef;
use pahe_core::control::RunControl;
use pahe_core::resolver::{BrowserStreamResolver, ResolveError, StreamResolver};
use std::collections::HashMap;
use std::time::Duration;

const SITE: &str = "https://pahe.test";

fn episode(index: u32) -> EpisodeRef {
    EpisodeRef {
        index,
        watch_page_id: format!("show/ep{}", index),
        title: format!("Episode {}", index),
    }
}

fn pages() -> HashMap<String, FakePage> {
    HashMap::from([
        (
            "/play/show/ep1".to_string(),
            FakePage::Player {
                frame_src: "https://kwik.test/e/abc".to_string(),
                media: Media::SourceTag("/d/ep1.mp4?expires=4102444800".to_string()),
            },
        ),
        (
            "/play/show/ep2".to_string(),
            FakePage::Player {
                frame_src: "//kwik.test/e/def".to_string(),
                media: Media::Script("https://cdn.test/hls/ep2/uwu.m3u8".to_string()),
            },
        ),
        ("/play/show/ep3".to_string(), FakePage::NoFrame),
        ("/play/show/ep4".to_string(), FakePage::SlowLoad),
        (
            "/play/show/ep5".to_string(),
            FakePage::Player {
                frame_src: "https://kwik.test/e/ghi".to_string(),
                media: Media::Nothing,
            },
        ),
    ])
}

fn resolver(endpoint: &str) -> BrowserStreamResolver<WebDriverLauncher> {
    let launcher = WebDriverLauncher::new(
        endpoint,
        LaunchOptions {
            headless: true,
            ..LaunchOptions::default()
        },
    );
    BrowserStreamResolver::new(launcher, SITE).with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn source_tag_resolves_and_session_is_closed() {
    let driver = webdriver_server::start(pages());
    let mut r = resolver(&driver.endpoint);

    let stream = r
        .resolve(&episode(1), Duration::from_secs(2), &RunControl::new())
        .await
        .unwrap();
    assert_eq!(stream.media_url, "https://kwik.test/d/ep1.mp4?expires=4102444800");
    assert_eq!(stream.referer(), Some("https://kwik.test/e/abc"));
    assert!(stream.expires_at.is_some());
    assert!(!stream.is_expired());

    assert_eq!(
        driver.stats.navigations.lock().unwrap().as_slice(),
        &["https://pahe.test/play/show/ep1".to_string()]
    );
    assert_eq!(driver.stats.open_sessions(), 0);

    let caps = driver.stats.capabilities.lock().unwrap()[0].clone();
    let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].to_string();
    assert!(args.contains("--headless=new"));
}

#[tokio::test]
async fn script_scan_resolves_protocol_relative_frame() {
    let driver = webdriver_server::start(pages());
    let mut r = resolver(&driver.endpoint);

    let stream = r
        .resolve(&episode(2), Duration::from_secs(2), &RunControl::new())
        .await
        .unwrap();
    assert_eq!(stream.media_url, "https://cdn.test/hls/ep2/uwu.m3u8");
    assert_eq!(stream.referer(), Some("https://kwik.test/e/def"));
    assert!(stream.expires_at.is_none());
    assert_eq!(driver.stats.open_sessions(), 0);
}

#[tokio::test]
async fn failure_modes_are_distinct_and_release_sessions() {
    let driver = webdriver_server::start(pages());
    let mut r = resolver(&driver.endpoint);
    let control = RunControl::new();
    let timeout = Duration::from_millis(300);

    let err = r.resolve(&episode(3), timeout, &control).await.unwrap_err();
    assert!(matches!(err, ResolveError::FrameNotFound { .. }), "{err:?}");

    let err = r.resolve(&episode(4), timeout, &control).await.unwrap_err();
    assert!(matches!(err, ResolveError::NavigationTimeout { .. }), "{err:?}");

    let err = r.resolve(&episode(5), timeout, &control).await.unwrap_err();
    assert!(matches!(err, ResolveError::ExtractionFailed(_)), "{err:?}");

    assert_eq!(driver.stats.created.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(driver.stats.open_sessions(), 0);
}

#[tokio::test]
async fn unreachable_driver_is_session_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut r = resolver(&format!("http://127.0.0.1:{}", port));
    let err = r
        .resolve(&episode(1), Duration::from_secs(1), &RunControl::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::SessionError(_)), "{err:?}");
}
