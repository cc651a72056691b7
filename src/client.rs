//! The dashboard client: loads and follows logs, polls status, dispatches
//! actions and manages alerts, all against one [`Page`].
//!
//! Every background activity (log feeds, the status timer, alert timers) is a
//! tokio task registered here, so [`DashboardClient::teardown`] can release
//! all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, AlertId, Severity};
use crate::api::{Action, ActionResponse, Backend, Cursor, ProgramId};
use crate::config::{DashboardConfig, DeliveryMode};
use crate::document::{Document, FeedState, Page, Placeholder};
use crate::error::ApiError;
use crate::locale::Locale;

/// Timings and program set the client runs with.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub programs: Vec<ProgramId>,
    pub delivery: DeliveryMode,
    pub locale: Locale,
    pub status_interval: Duration,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub alert_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

impl From<&DashboardConfig> for ClientSettings {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            programs: config.programs.clone(),
            delivery: config.delivery,
            locale: config.locale,
            status_interval: config.status_interval(),
            poll_interval: config.poll_interval(),
            reconnect_delay: config.reconnect_delay(),
            alert_timeout: config.alert_timeout(),
        }
    }
}

/// The live-update resource of one program.
enum LogFeed {
    Stream(JoinHandle<()>),
    Poll(JoinHandle<()>),
}

impl LogFeed {
    fn mode(&self) -> DeliveryMode {
        match self {
            LogFeed::Stream(_) => DeliveryMode::Stream,
            LogFeed::Poll(_) => DeliveryMode::Poll,
        }
    }

    fn abort(self) {
        match self {
            LogFeed::Stream(handle) | LogFeed::Poll(handle) => handle.abort(),
        }
    }
}

#[derive(Default)]
struct Resources {
    feeds: HashMap<ProgramId, LogFeed>,
    status_timer: Option<JoinHandle<()>>,
    alert_timers: HashMap<AlertId, JoinHandle<()>>,
    closed: bool,
}

/// What [`DashboardClient::teardown`] released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Push subscriptions closed.
    pub streams_closed: usize,
    /// Poll timers, the status timer and pending alert timers cleared.
    pub timers_cleared: usize,
}

struct Shared<B> {
    backend: B,
    page: Page,
    settings: ClientSettings,
    runtime: Handle,
    cursors: Mutex<HashMap<ProgramId, Cursor>>,
    /// Held across fetch and apply so log requests of one program land in
    /// the order they were issued.
    log_locks: HashMap<ProgramId, AsyncMutex<()>>,
    resources: Mutex<Resources>,
}

pub struct DashboardClient<B: Backend> {
    shared: Arc<Shared<B>>,
}

impl<B: Backend> Clone for DashboardClient<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Backend> DashboardClient<B> {
    /// Create a client with a fresh page for `settings.programs`.
    pub fn new(backend: B, settings: ClientSettings, runtime: Handle) -> Self {
        let page = Page::new(Document::new(&settings.programs, settings.locale));
        Self::with_page(backend, page, settings, runtime)
    }

    pub fn with_page(backend: B, page: Page, settings: ClientSettings, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                page,
                runtime,
                cursors: Mutex::new(HashMap::new()),
                log_locks: settings
                    .programs
                    .iter()
                    .map(|program| (*program, AsyncMutex::new(())))
                    .collect(),
                settings,
                resources: Mutex::new(Resources::default()),
            }),
        }
    }

    pub fn page(&self) -> &Page {
        &self.shared.page
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.shared.settings
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    fn locale(&self) -> Locale {
        self.shared.settings.locale
    }

    fn resources(&self) -> MutexGuard<'_, Resources> {
        self.shared
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cursors(&self) -> MutexGuard<'_, HashMap<ProgramId, Cursor>> {
        self.shared
            .cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_logs(&self, program: ProgramId) -> Option<AsyncMutexGuard<'_, ()>> {
        match self.shared.log_locks.get(&program) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Last cursor recorded for `program`.
    pub fn cursor(&self, program: ProgramId) -> Option<Cursor> {
        self.cursors().get(&program).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.resources().closed
    }

    /// Delivery mode of the program's active feed, if it has one.
    pub fn active_feed(&self, program: ProgramId) -> Option<DeliveryMode> {
        self.resources().feeds.get(&program).map(LogFeed::mode)
    }

    /// Start a log feed for every program and the status timer.
    pub fn initialize(&self) {
        info!(
            programs = self.shared.settings.programs.len(),
            delivery = %self.shared.settings.delivery,
            "initializing dashboard"
        );
        for program in self.shared.settings.programs.clone() {
            self.start_log_feed(program);
        }
        self.start_status_monitoring();
    }

    /// Release every feed, timer and pending alert timer. Safe to call twice;
    /// the second call releases nothing.
    pub fn teardown(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let released: Vec<ProgramId> = {
            let mut resources = self.resources();
            if resources.closed {
                return report;
            }
            resources.closed = true;

            let mut programs = Vec::new();
            for (program, feed) in resources.feeds.drain() {
                match feed {
                    LogFeed::Stream(_) => report.streams_closed += 1,
                    LogFeed::Poll(_) => report.timers_cleared += 1,
                }
                feed.abort();
                programs.push(program);
            }
            if let Some(timer) = resources.status_timer.take() {
                timer.abort();
                report.timers_cleared += 1;
            }
            for (_, timer) in resources.alert_timers.drain() {
                timer.abort();
                report.timers_cleared += 1;
            }
            programs
        };

        self.shared.page.update(|doc| {
            for program in released {
                if let Some(pane) = doc.pane_mut(program) {
                    pane.set_feed_state(FeedState::Closed);
                }
            }
        });
        info!(
            streams_closed = report.streams_closed,
            timers_cleared = report.timers_cleared,
            "dashboard torn down"
        );
        report
    }

    // --- Log loader -------------------------------------------------------

    /// Load the full log snapshot of one program into its pane. Failures are
    /// logged and shown in the pane, never returned. The feed state is left
    /// to the program's feed task.
    pub async fn load_logs(&self, program: ProgramId) {
        let _serial = self.lock_logs(program).await;
        match self.shared.backend.fetch_logs(program, None).await {
            Ok(response) => {
                debug!(%program, lines = response.logs.len(), "logs loaded");
                if let Some(cursor) = response.timestamp {
                    self.cursors().insert(program, cursor);
                }
                self.shared.page.update_pane(program, |pane| {
                    pane.replace_lines(response.logs);
                    pane.scroll_to_bottom();
                });
            }
            Err(e) => {
                error!(%program, error = %e, code = e.error_code(), "Error loading logs");
                self.shared
                    .page
                    .update_pane(program, |pane| pane.show_placeholder(Placeholder::LoadError));
            }
        }
    }

    // --- Log updater ------------------------------------------------------

    /// Start the configured live-update feed for `program`, replacing any
    /// feed it already has.
    pub fn start_log_feed(&self, program: ProgramId) {
        self.switch_delivery(program, self.shared.settings.delivery);
    }

    /// Replace the program's feed with one in `mode`. The previous feed is
    /// aborted before the new one is spawned.
    pub fn switch_delivery(&self, program: ProgramId, mode: DeliveryMode) {
        let mut resources = self.resources();
        if resources.closed {
            debug!(%program, "client closed; not starting log feed");
            return;
        }
        if let Some(previous) = resources.feeds.remove(&program) {
            debug!(%program, previous = %previous.mode(), "releasing previous log feed");
            previous.abort();
        }

        let client = self.clone();
        let feed = match mode {
            DeliveryMode::Stream => LogFeed::Stream(
                self.shared
                    .runtime
                    .spawn(async move { client.run_stream_feed(program).await }),
            ),
            DeliveryMode::Poll => LogFeed::Poll(
                self.shared
                    .runtime
                    .spawn(async move { client.run_poll_feed(program).await }),
            ),
        };
        resources.feeds.insert(program, feed);
    }

    fn set_feed_state(&self, program: ProgramId, state: FeedState) {
        self.shared
            .page
            .update_pane(program, |pane| pane.set_feed_state(state));
    }

    async fn run_stream_feed(self, program: ProgramId) {
        self.set_feed_state(program, FeedState::Loading);
        self.load_logs(program).await;
        loop {
            let result = self.follow_stream(program).await;
            if let Err(e) = result {
                error!(%program, error = %e, "Error in log stream");
            }
            self.set_feed_state(program, FeedState::Backoff);
            tokio::time::sleep(self.shared.settings.reconnect_delay).await;
            debug!(%program, "reconnecting log stream");
        }
    }

    /// Consume one subscription until it fails or the server ends it.
    async fn follow_stream(&self, program: ProgramId) -> Result<(), ApiError> {
        let mut stream = self.shared.backend.open_log_stream(program).await?;
        self.set_feed_state(program, FeedState::Streaming);

        // The server replays its recent tail on connect, so the first event
        // of each connection resets the pane.
        let mut first = true;
        while let Some(item) = stream.next().await {
            let line = item?;
            let reset = std::mem::take(&mut first);
            self.shared.page.update_pane(program, |pane| {
                if reset {
                    pane.clear();
                }
                pane.append_line(line);
                pane.scroll_to_bottom();
            });
        }
        Err(ApiError::StreamClosed { program })
    }

    async fn run_poll_feed(self, program: ProgramId) {
        self.set_feed_state(program, FeedState::Loading);
        self.load_logs(program).await;
        let period = self.shared.settings.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.set_feed_state(program, FeedState::Polling);
        loop {
            ticker.tick().await;
            self.poll_logs(program).await;
        }
    }

    /// One differential poll: lines newer than the stored cursor are appended,
    /// or the pane is replaced when there is no cursor yet.
    pub async fn poll_logs(&self, program: ProgramId) {
        let _serial = self.lock_logs(program).await;
        let since = self.cursor(program);
        let had_cursor = since.is_some();

        match self.shared.backend.fetch_logs(program, since).await {
            Ok(response) => {
                if let Some(cursor) = response.timestamp {
                    self.cursors().insert(program, cursor);
                }
                if !had_cursor {
                    self.shared.page.update_pane(program, |pane| {
                        pane.replace_lines(response.logs);
                        pane.scroll_to_bottom();
                    });
                } else if !response.logs.is_empty() {
                    self.shared.page.update_pane(program, |pane| {
                        for line in response.logs {
                            pane.append_line(line);
                        }
                        pane.scroll_to_bottom();
                    });
                }
                self.set_feed_state(program, FeedState::Polling);
            }
            Err(e) => {
                warn!(%program, error = %e, "Error polling logs");
            }
        }
    }

    // --- Status poller ----------------------------------------------------

    fn start_status_monitoring(&self) {
        let mut resources = self.resources();
        if resources.closed {
            return;
        }
        if let Some(previous) = resources.status_timer.take() {
            previous.abort();
        }

        let client = self.clone();
        let period = self.shared.settings.status_interval;
        resources.status_timer = Some(self.shared.runtime.spawn(async move {
            // First tick completes immediately.
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                client.poll_status().await;
            }
        }));
    }

    /// Fetch status for all programs and update their cards. Failures are
    /// logged; the next tick retries.
    pub async fn poll_status(&self) {
        if let Err(e) = self.refresh_status().await {
            error!(error = %e, code = e.error_code(), "Error updating program status");
        }
    }

    async fn refresh_status(&self) -> Result<(), ApiError> {
        let statuses = self.shared.backend.fetch_status().await?;
        let locale = self.locale();
        self.shared.page.update(|doc| {
            for (program, snapshot) in &statuses {
                match doc.card_mut(*program) {
                    Some(card) => card.apply(snapshot, locale),
                    None => debug!(%program, "status for program not on page"),
                }
            }
        });
        Ok(())
    }

    // --- Action dispatcher ------------------------------------------------

    pub async fn start_program(&self, program: ProgramId) -> Option<ActionResponse> {
        self.dispatch(program, Action::Start).await
    }

    pub async fn stop_program(&self, program: ProgramId) -> Option<ActionResponse> {
        self.dispatch(program, Action::Stop).await
    }

    /// Prepare a clear-logs request. Nothing is sent unless the returned
    /// request is confirmed.
    pub fn request_clear_logs(&self, program: ProgramId) -> ClearLogsRequest<B> {
        ClearLogsRequest {
            client: self.clone(),
            program,
            prompt: self.locale().confirm_clear(program),
        }
    }

    /// Ask `confirm` with the localised prompt and clear only on `true`.
    pub async fn clear_logs(
        &self,
        program: ProgramId,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Option<ActionResponse> {
        let request = self.request_clear_logs(program);
        if confirm(request.prompt()) {
            request.confirm().await
        } else {
            debug!(%program, "clear logs cancelled");
            None
        }
    }

    /// Send one action and turn the outcome into alerts. Returns the backend's
    /// answer when one was received.
    async fn dispatch(&self, program: ProgramId, action: Action) -> Option<ActionResponse> {
        let locale = self.locale();
        self.show_alert(Severity::Info, locale.in_progress(action, program));

        match self.shared.backend.send_action(program, action).await {
            Ok(response) if response.is_success() => {
                info!(%program, ?action, message = %response.message, "action succeeded");
                if action == Action::ClearLogs {
                    self.shared.page.update_pane(program, |pane| {
                        pane.show_placeholder(Placeholder::Cleared)
                    });
                }
                self.show_alert(Severity::Success, response.message.clone());
                Some(response)
            }
            Ok(response) => {
                warn!(%program, ?action, message = %response.message, "action rejected");
                self.show_alert(Severity::Danger, response.message.clone());
                Some(response)
            }
            Err(e) => {
                error!(%program, ?action, error = %e, code = e.error_code(), "action failed");
                self.show_alert(Severity::Danger, locale.action_failed(action, program));
                None
            }
        }
    }

    /// Reload every pane and force one status fetch, then report. Returns
    /// whether the status fetch succeeded.
    pub async fn refresh_all(&self) -> bool {
        let locale = self.locale();
        self.show_alert(Severity::Info, locale.refreshing());

        let loads = self
            .shared
            .settings
            .programs
            .iter()
            .map(|program| self.load_logs(*program));
        let (_, status) = tokio::join!(futures::future::join_all(loads), self.refresh_status());

        match status {
            Ok(()) => {
                self.show_alert(Severity::Success, locale.refreshed());
                true
            }
            Err(e) => {
                error!(error = %e, "Error refreshing programs");
                self.show_alert(Severity::Danger, locale.refresh_failed());
                false
            }
        }
    }

    // --- Alerts -----------------------------------------------------------

    /// Add an alert and schedule its removal after the alert timeout. Once
    /// the client is torn down nothing is shown.
    pub fn show_alert(&self, severity: Severity, message: impl Into<String>) -> AlertId {
        let alert = Alert::new(severity, message);
        let id = alert.id.clone();

        let mut resources = self.resources();
        if resources.closed {
            debug!(severity = severity.as_str(), "client closed; alert dropped");
            return id;
        }
        self.shared.page.update(|doc| doc.push_alert(alert));
        let client = self.clone();
        let timer_id = id.clone();
        let timeout = self.shared.settings.alert_timeout;
        let timer = self.shared.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            client.resources().alert_timers.remove(&timer_id);
            client
                .shared
                .page
                .update(|doc| doc.dismiss_alert(&timer_id));
        });
        resources.alert_timers.insert(id.clone(), timer);
        id
    }

    /// Dismiss an alert before its timer fires.
    pub fn dismiss_alert(&self, id: &AlertId) -> bool {
        if let Some(timer) = self.resources().alert_timers.remove(id) {
            timer.abort();
        }
        self.shared.page.update(|doc| doc.dismiss_alert(id))
    }
}

/// A clear-logs action waiting for the user's confirmation. Dropping it
/// cancels the action.
#[must_use = "dropping the request cancels it"]
pub struct ClearLogsRequest<B: Backend> {
    client: DashboardClient<B>,
    program: ProgramId,
    prompt: String,
}

impl<B: Backend> ClearLogsRequest<B> {
    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Send exactly one clear request.
    pub async fn confirm(self) -> Option<ActionResponse> {
        self.client.dispatch(self.program, Action::ClearLogs).await
    }
}
