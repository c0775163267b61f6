//! Browser-driven resolver: watch page → player frame → media URL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::extract::{expiry_from_url, normalize_candidate, SelectorContract};
use super::{ResolveError, ResolvedStream, StreamResolver};
use crate::browser::{BrowserError, BrowserLauncher, BrowserSession, ElementHandle};
use crate::catalog::EpisodeRef;
use crate::config::{BrowserConfig, CatalogConfig};
use crate::control::RunControl;

/// Headroom past the resolve deadline for the command already in flight.
const COMMAND_GRACE: Duration = Duration::from_secs(1);

/// Resolves episodes by driving one browser session per call.
///
/// The session is launched at the start of `resolve` and closed before it
/// returns, on success, failure and cancellation alike.
pub struct BrowserStreamResolver<L> {
    launcher: L,
    base_url: String,
    contract: SelectorContract,
    poll_interval: Duration,
}

impl<L: BrowserLauncher> BrowserStreamResolver<L> {
    pub fn new(launcher: L, base_url: impl Into<String>) -> Self {
        Self {
            launcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            contract: SelectorContract::default(),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn from_config(launcher: L, catalog: &CatalogConfig, browser: &BrowserConfig) -> Self {
        Self::new(launcher, catalog.base_url.clone())
            .with_contract(SelectorContract::default().with_frame_selector(browser.frame_selector.clone()))
            .with_poll_interval(Duration::from_millis(browser.poll_interval_ms.max(1)))
    }

    pub fn with_contract(mut self, contract: SelectorContract) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn watch_url(&self, watch_page_id: &str) -> String {
        format!("{}/play/{}", self.base_url, watch_page_id.trim_start_matches('/'))
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        episode: &EpisodeRef,
        timeout: Duration,
    ) -> Result<ResolvedStream, ResolveError> {
        let url = self.watch_url(&episode.watch_page_id);
        let deadline = Instant::now() + timeout;
        let nav_timeout = || ResolveError::NavigationTimeout {
            url: url.clone(),
            timeout,
        };
        let frame_not_found = || ResolveError::FrameNotFound {
            url: url.clone(),
            selector: self.contract.frame_selector.clone(),
        };

        tracing::debug!(episode = episode.index, url = %url, "navigating to watch page");
        match bounded(deadline, session.navigate(&url, timeout)).await {
            Ok(()) => {}
            Err(BrowserError::Timeout(_)) => return Err(nav_timeout()),
            Err(e) => return Err(session_error(e)),
        }

        loop {
            arm(session, deadline);
            match bounded(deadline, session.ready_state()).await {
                Ok(state) if state == "complete" => break,
                Ok(_) => {}
                Err(BrowserError::Timeout(_)) => return Err(nav_timeout()),
                Err(e) => return Err(session_error(e)),
            }
            if Instant::now() >= deadline {
                return Err(nav_timeout());
            }
            self.pause(deadline).await;
        }

        let frame = match self
            .wait_for_element(session, &self.contract.frame_selector, deadline)
            .await
        {
            Ok(Some(frame)) => frame,
            Ok(None) | Err(BrowserError::Timeout(_)) => return Err(frame_not_found()),
            Err(e) => return Err(session_error(e)),
        };

        arm(session, deadline);
        let frame_src = match bounded(deadline, session.attribute(&frame, "src")).await {
            Ok(src) => src.and_then(|src| normalize_candidate(&src, Some(&url))),
            Err(BrowserError::Timeout(_)) => return Err(frame_not_found()),
            Err(e) => return Err(session_error(e)),
        };

        arm(session, deadline);
        match bounded(deadline, session.switch_to_frame(&frame)).await {
            Ok(()) => {}
            Err(BrowserError::NoSuchFrame(_))
            | Err(BrowserError::NoSuchElement(_))
            | Err(BrowserError::Timeout(_)) => return Err(frame_not_found()),
            Err(e) => return Err(session_error(e)),
        }

        let media_url = self
            .extract_media_url(session, frame_src.as_deref(), deadline)
            .await?;

        let mut headers = HashMap::new();
        headers.insert(
            "Referer".to_string(),
            frame_src.clone().unwrap_or_else(|| url.clone()),
        );
        tracing::debug!(episode = episode.index, media = %media_url, "media url extracted");
        Ok(ResolvedStream {
            episode: episode.clone(),
            expires_at: expiry_from_url(&media_url),
            media_url,
            headers,
        })
    }

    /// Probes the current (frame) context until a media URL shows up or the
    /// deadline passes. Always makes at least one pass.
    async fn extract_media_url(
        &self,
        session: &mut dyn BrowserSession,
        frame_src: Option<&str>,
        deadline: Instant,
    ) -> Result<String, ResolveError> {
        let failed = || {
            ResolveError::ExtractionFailed(format!(
                "no media url in player frame{}",
                frame_src.map(|s| format!(" {s}")).unwrap_or_default()
            ))
        };
        let extract_error = |e: BrowserError| match e {
            BrowserError::Timeout(_) => failed(),
            other => session_error(other),
        };
        loop {
            for probe in &self.contract.probes {
                arm(session, deadline);
                let Some(el) = bounded(deadline, session.find_element(&probe.selector))
                    .await
                    .map_err(extract_error)?
                else {
                    continue;
                };
                let value = bounded(deadline, session.attribute(&el, &probe.attribute))
                    .await
                    .map_err(extract_error)?;
                if let Some(found) = value.and_then(|v| normalize_candidate(&v, frame_src)) {
                    return Ok(found);
                }
            }
            arm(session, deadline);
            let html = bounded(deadline, session.page_source())
                .await
                .map_err(extract_error)?;
            if let Some(found) = self.contract.scan_source(&html) {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(failed());
            }
            self.pause(deadline).await;
        }
    }

    async fn wait_for_element(
        &self,
        session: &mut dyn BrowserSession,
        css: &str,
        deadline: Instant,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        loop {
            arm(session, deadline);
            if let Some(el) = bounded(deadline, session.find_element(css)).await? {
                return Ok(Some(el));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.pause(deadline).await;
        }
    }

    async fn pause(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(self.poll_interval.min(remaining)).await;
    }
}

#[async_trait]
impl<L: BrowserLauncher> StreamResolver for BrowserStreamResolver<L> {
    async fn resolve(
        &mut self,
        episode: &EpisodeRef,
        timeout: Duration,
        control: &RunControl,
    ) -> Result<ResolvedStream, ResolveError> {
        if control.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        // Not raced against cancellation: an abandoned launch would leak the session.
        let mut session = self.launcher.launch().await.map_err(session_error)?;

        let outcome = if control.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            tokio::select! {
                biased;
                _ = control.cancelled() => Err(ResolveError::Cancelled),
                r = self.drive(session.as_mut(), episode, timeout) => r,
            }
        };

        release(session.as_mut()).await;
        outcome
    }
}

async fn release(session: &mut dyn BrowserSession) {
    if let Err(e) = session.switch_to_top().await {
        tracing::debug!(error = %e, "switch to top-level context failed");
    }
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "failed to close browser session");
    }
}

/// HTTP budget for the next browser command: the time left before the
/// deadline plus [`COMMAND_GRACE`].
fn command_budget(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now) + COMMAND_GRACE
}

/// Caps the session's per-command timeout to the remaining resolve budget.
fn arm(session: &mut dyn BrowserSession, deadline: Instant) {
    session.set_command_timeout(command_budget(deadline, Instant::now()));
}

/// Awaits one browser command, giving up once the deadline (plus grace) has
/// passed. A late command surfaces as [`BrowserError::Timeout`].
async fn bounded<T>(
    deadline: Instant,
    command: impl Future<Output = Result<T, BrowserError>>,
) -> Result<T, BrowserError> {
    match tokio::time::timeout_at(deadline + COMMAND_GRACE, command).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout("resolve deadline reached".into())),
    }
}

fn session_error(e: BrowserError) -> ResolveError {
    ResolveError::SessionError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserSession;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const FRAME_SRC: &str = "https://kwik.example/e/abc";

    #[derive(Clone)]
    enum Page {
        NavigateTimeout,
        NeverComplete,
        NoFrame,
        EmptyFrame,
        Probe(&'static str),
        Script(&'static str),
        Hang,
        /// The iframe lookup never answers.
        StuckFrameLookup,
        /// Element lookups inside the player frame never answer.
        StuckPlayer,
    }

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        budgets: Mutex<Vec<Duration>>,
    }

    struct FakeLauncher {
        page: Page,
        counters: Arc<Counters>,
    }

    impl FakeLauncher {
        fn new(page: Page) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            (
                Self {
                    page,
                    counters: counters.clone(),
                },
                counters,
            )
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                page: self.page.clone(),
                counters: self.counters.clone(),
                in_frame: false,
                closed: false,
            }))
        }
    }

    struct FakeSession {
        page: Page,
        counters: Arc<Counters>,
        in_frame: bool,
        closed: bool,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), BrowserError> {
            match self.page {
                Page::NavigateTimeout => Err(BrowserError::Timeout("page load".into())),
                Page::Hang => std::future::pending().await,
                _ => Ok(()),
            }
        }

        async fn ready_state(&mut self) -> Result<String, BrowserError> {
            Ok(match self.page {
                Page::NeverComplete => "loading".into(),
                _ => "complete".into(),
            })
        }

        async fn find_element(&mut self, css: &str) -> Result<Option<ElementHandle>, BrowserError> {
            match (&self.page, self.in_frame) {
                (Page::StuckFrameLookup, false) | (Page::StuckPlayer, true) => {
                    return std::future::pending().await
                }
                _ => {}
            }
            if !self.in_frame {
                let has_frame = !matches!(self.page, Page::NoFrame);
                return Ok((has_frame && css.starts_with("iframe"))
                    .then(|| ElementHandle("frame".into())));
            }
            Ok(match (&self.page, css) {
                (Page::Probe(_), "video source[src]") => Some(ElementHandle("source".into())),
                _ => None,
            })
        }

        async fn attribute(
            &mut self,
            element: &ElementHandle,
            _name: &str,
        ) -> Result<Option<String>, BrowserError> {
            Ok(match (element.0.as_str(), &self.page) {
                ("frame", _) => Some(FRAME_SRC.to_string()),
                ("source", Page::Probe(url)) => Some(url.to_string()),
                _ => None,
            })
        }

        async fn switch_to_frame(&mut self, _element: &ElementHandle) -> Result<(), BrowserError> {
            self.in_frame = true;
            Ok(())
        }

        async fn switch_to_top(&mut self) -> Result<(), BrowserError> {
            self.in_frame = false;
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String, BrowserError> {
            Ok(match self.page {
                Page::Script(html) if self.in_frame => html.to_string(),
                _ => "<html></html>".to_string(),
            })
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn set_command_timeout(&mut self, timeout: Duration) {
            self.counters.budgets.lock().unwrap().push(timeout);
        }
    }

    fn episode() -> EpisodeRef {
        EpisodeRef {
            index: 3,
            watch_page_id: "anime-s/ep-s".to_string(),
            title: "Episode 3".to_string(),
        }
    }

    fn resolver(page: Page) -> (BrowserStreamResolver<FakeLauncher>, Arc<Counters>) {
        let (launcher, counters) = FakeLauncher::new(page);
        let r = BrowserStreamResolver::new(launcher, "https://pahe.example/")
            .with_poll_interval(Duration::from_millis(2));
        (r, counters)
    }

    async fn run(page: Page) -> (Result<ResolvedStream, ResolveError>, Arc<Counters>) {
        let (mut r, counters) = resolver(page);
        let out = r
            .resolve(&episode(), Duration::from_millis(40), &RunControl::new())
            .await;
        (out, counters)
    }

    fn assert_released(counters: &Counters) {
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watch_url_joins_base_and_id() {
        let (r, _) = resolver(Page::NoFrame);
        assert_eq!(r.watch_url("a/b"), "https://pahe.example/play/a/b");
    }

    #[tokio::test]
    async fn probe_hit_resolves_with_referer() {
        let (out, counters) = run(Page::Probe("/d/ep3.mp4?expires=1700000000")).await;
        let stream = out.unwrap();
        assert_eq!(stream.media_url, "https://kwik.example/d/ep3.mp4?expires=1700000000");
        assert_eq!(stream.referer(), Some(FRAME_SRC));
        assert!(stream.expires_at.is_some());
        assert_eq!(stream.episode.index, 3);
        assert_released(&counters);
    }

    #[tokio::test]
    async fn script_scan_resolves() {
        let (out, counters) =
            run(Page::Script("<script>var s='https://cdn.example/hls/uwu.m3u8';</script>")).await;
        let stream = out.unwrap();
        assert_eq!(stream.media_url, "https://cdn.example/hls/uwu.m3u8");
        assert!(stream.expires_at.is_none());
        assert_released(&counters);
    }

    #[tokio::test]
    async fn navigate_timeout_maps_to_navigation_timeout() {
        let (out, counters) = run(Page::NavigateTimeout).await;
        assert!(matches!(out, Err(ResolveError::NavigationTimeout { .. })));
        assert_released(&counters);
    }

    #[tokio::test]
    async fn incomplete_load_maps_to_navigation_timeout() {
        let (out, counters) = run(Page::NeverComplete).await;
        match out {
            Err(ResolveError::NavigationTimeout { url, .. }) => {
                assert_eq!(url, "https://pahe.example/play/anime-s/ep-s")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_released(&counters);
    }

    #[tokio::test]
    async fn missing_frame_is_frame_not_found() {
        let (out, counters) = run(Page::NoFrame).await;
        assert!(matches!(out, Err(ResolveError::FrameNotFound { .. })));
        assert_released(&counters);
    }

    #[tokio::test]
    async fn empty_frame_is_extraction_failure() {
        let (out, counters) = run(Page::EmptyFrame).await;
        assert!(matches!(out, Err(ResolveError::ExtractionFailed(_))));
        assert_released(&counters);
    }

    #[test]
    fn command_budget_shrinks_toward_grace() {
        let now = Instant::now();
        assert_eq!(
            command_budget(now + Duration::from_secs(5), now),
            Duration::from_secs(5) + COMMAND_GRACE
        );
        assert_eq!(command_budget(now, now + Duration::from_secs(3)), COMMAND_GRACE);
    }

    #[tokio::test]
    async fn stuck_frame_lookup_is_frame_not_found_within_deadline() {
        let started = std::time::Instant::now();
        let (out, counters) = run(Page::StuckFrameLookup).await;
        assert!(matches!(out, Err(ResolveError::FrameNotFound { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_released(&counters);
    }

    #[tokio::test]
    async fn stuck_player_is_extraction_failure_within_deadline() {
        let started = std::time::Instant::now();
        let (out, counters) = run(Page::StuckPlayer).await;
        assert!(matches!(out, Err(ResolveError::ExtractionFailed(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_released(&counters);
    }

    #[tokio::test]
    async fn command_timeouts_never_exceed_resolve_budget() {
        let (out, counters) = run(Page::EmptyFrame).await;
        assert!(out.is_err());
        let budgets = counters.budgets.lock().unwrap();
        assert!(!budgets.is_empty());
        let cap = Duration::from_millis(40) + COMMAND_GRACE;
        assert!(budgets.iter().all(|b| *b <= cap), "{budgets:?}");
    }

    #[tokio::test]
    async fn cancellation_unwinds_and_closes_session() {
        let (mut r, counters) = resolver(Page::Hang);
        let control = RunControl::new();
        let c = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            c.cancel();
        });
        let out = r
            .resolve(&episode(), Duration::from_secs(30), &control)
            .await;
        assert_eq!(out.unwrap_err(), ResolveError::Cancelled);
        assert_released(&counters);
    }

    #[tokio::test]
    async fn already_cancelled_never_launches() {
        let (mut r, counters) = resolver(Page::Probe("https://cdn.example/a.mp4"));
        let control = RunControl::new();
        control.cancel();
        let out = r.resolve(&episode(), Duration::from_secs(1), &control).await;
        assert_eq!(out.unwrap_err(), ResolveError::Cancelled);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }
}
