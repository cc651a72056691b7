//! In-memory page: one log pane and status card per program plus the alert
//! container, addressed by the same element ids the web page used.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::alerts::{escape_html, Alert, AlertId};
use crate::api::ProgramId;
use crate::locale::Locale;
use crate::status::StatusCard;

/// Lines kept per pane; older lines are evicted first.
pub const MAX_LOG_LINES: usize = 500;

pub const ALERT_CONTAINER_ID: &str = "alert-container";

/// Per-program binding points of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Logs,
    StatusIndicator,
    StatusText,
    Pid,
    StartButton,
    StopButton,
}

impl Binding {
    pub fn element_id(self, program: ProgramId) -> String {
        let prefix = match self {
            Binding::Logs => "logs",
            Binding::StatusIndicator => "status",
            Binding::StatusText => "status-text",
            Binding::Pid => "pid",
            Binding::StartButton => "start-btn",
            Binding::StopButton => "stop-btn",
        };
        format!("{prefix}-{program}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Loading,
    NoLogs,
    LoadError,
    Cleared,
}

impl Placeholder {
    pub fn text(self, locale: Locale) -> &'static str {
        match self {
            Placeholder::Loading => locale.loading(),
            Placeholder::NoLogs => locale.no_logs(),
            Placeholder::LoadError => locale.load_error(),
            Placeholder::Cleared => locale.cleared(),
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Placeholder::LoadError)
    }

    fn css_class(self) -> &'static str {
        if self.is_error() {
            "text-danger"
        } else {
            "text-muted"
        }
    }
}

/// Where a program's live log delivery currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Loading,
    Streaming,
    Polling,
    Backoff,
    Closed,
}

impl FeedState {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedState::Idle => "idle",
            FeedState::Loading => "loading",
            FeedState::Streaming => "streaming",
            FeedState::Polling => "polling",
            FeedState::Backoff => "reconnecting",
            FeedState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaneContent {
    Placeholder(Placeholder),
    Lines(VecDeque<String>),
}

#[derive(Debug, Clone)]
pub struct LogPane {
    content: PaneContent,
    feed_state: FeedState,
    /// Bumped whenever the pane should be scrolled to its newest line.
    scroll_requests: u64,
}

impl Default for LogPane {
    fn default() -> Self {
        Self {
            content: PaneContent::Placeholder(Placeholder::Loading),
            feed_state: FeedState::Idle,
            scroll_requests: 0,
        }
    }
}

impl LogPane {
    pub fn content(&self) -> &PaneContent {
        &self.content
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        match &self.content {
            PaneContent::Placeholder(p) => Some(*p),
            PaneContent::Lines(_) => None,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        let lines = match &self.content {
            PaneContent::Lines(lines) => Some(lines.iter().map(String::as_str)),
            PaneContent::Placeholder(_) => None,
        };
        lines.into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        match &self.content {
            PaneContent::Lines(lines) => lines.len(),
            PaneContent::Placeholder(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn show_placeholder(&mut self, placeholder: Placeholder) {
        self.content = PaneContent::Placeholder(placeholder);
    }

    /// Replace the pane with `lines`, or the "no logs" placeholder when empty.
    pub fn replace_lines(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            self.content = PaneContent::Placeholder(Placeholder::NoLogs);
            return;
        }
        let mut buffer = VecDeque::from(lines);
        while buffer.len() > MAX_LOG_LINES {
            buffer.pop_front();
        }
        self.content = PaneContent::Lines(buffer);
    }

    /// Append one line, dropping a placeholder and evicting from the front
    /// past the cap.
    pub fn append_line(&mut self, line: String) {
        match &mut self.content {
            PaneContent::Lines(lines) => {
                lines.push_back(line);
                while lines.len() > MAX_LOG_LINES {
                    lines.pop_front();
                }
            }
            PaneContent::Placeholder(_) => {
                self.content = PaneContent::Lines(VecDeque::from([line]));
            }
        }
    }

    pub fn clear(&mut self) {
        self.content = PaneContent::Lines(VecDeque::new());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_requests = self.scroll_requests.wrapping_add(1);
    }

    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }

    pub fn feed_state(&self) -> FeedState {
        self.feed_state
    }

    pub fn set_feed_state(&mut self, state: FeedState) {
        self.feed_state = state;
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    locale: Locale,
    panes: BTreeMap<ProgramId, LogPane>,
    cards: BTreeMap<ProgramId, StatusCard>,
    alerts: Vec<Alert>,
}

impl Document {
    pub fn new(programs: &[ProgramId], locale: Locale) -> Self {
        Self {
            locale,
            panes: programs.iter().map(|id| (*id, LogPane::default())).collect(),
            cards: programs
                .iter()
                .map(|id| (*id, StatusCard::new(locale)))
                .collect(),
            alerts: Vec::new(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn programs(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.panes.keys().copied()
    }

    pub fn pane(&self, program: ProgramId) -> Option<&LogPane> {
        self.panes.get(&program)
    }

    pub fn pane_mut(&mut self, program: ProgramId) -> Option<&mut LogPane> {
        self.panes.get_mut(&program)
    }

    pub fn card(&self, program: ProgramId) -> Option<&StatusCard> {
        self.cards.get(&program)
    }

    pub fn card_mut(&mut self, program: ProgramId) -> Option<&mut StatusCard> {
        self.cards.get_mut(&program)
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    /// Remove an alert; `false` if it was already gone.
    pub fn dismiss_alert(&mut self, id: &AlertId) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|alert| &alert.id != id);
        self.alerts.len() != before
    }

    /// Render the page fragment with its element ids. All text is
    /// escaped.
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str(&format!(r#"<div id="{ALERT_CONTAINER_ID}">"#));
        for alert in &self.alerts {
            html.push_str(&alert.to_html());
        }
        html.push_str("</div>\n");

        for (program, pane) in &self.panes {
            let program = *program;
            let fallback;
            let card = match self.cards.get(&program) {
                Some(card) => card,
                None => {
                    fallback = StatusCard::new(self.locale);
                    &fallback
                }
            };
            let name = card
                .name
                .clone()
                .unwrap_or_else(|| self.locale.program_label(program));

            html.push_str(&format!(r#"<div class="program-card" data-program="{program}">"#));
            html.push_str(&format!(
                r#"<h5><span id="{}" class="{}"></span> {}</h5>"#,
                Binding::StatusIndicator.element_id(program),
                escape_html(&card.indicator_class()),
                escape_html(&name),
            ));
            html.push_str(&format!(
                r#"<span id="{}">{}</span> <span id="{}">{}</span>"#,
                Binding::StatusText.element_id(program),
                escape_html(&card.label),
                Binding::Pid.element_id(program),
                escape_html(&card.pid_text),
            ));
            html.push_str(&format!(
                r#"<button id="{}"{}>Start</button><button id="{}"{}>Stop</button>"#,
                Binding::StartButton.element_id(program),
                if card.start_enabled { "" } else { " disabled" },
                Binding::StopButton.element_id(program),
                if card.stop_enabled { "" } else { " disabled" },
            ));
            html.push_str(&format!(
                r#"<div id="{}" class="log-container">"#,
                Binding::Logs.element_id(program)
            ));
            match pane.content() {
                PaneContent::Placeholder(p) => html.push_str(&format!(
                    r#"<div class="{}">{}</div>"#,
                    p.css_class(),
                    escape_html(p.text(self.locale))
                )),
                PaneContent::Lines(lines) => {
                    for line in lines {
                        html.push_str(&format!(
                            r#"<div class="log-line">{}</div>"#,
                            escape_html(line)
                        ));
                    }
                }
            }
            html.push_str("</div></div>\n");
        }
        html
    }
}

/// Shared handle to the document. Every mutation bumps a version counter so
/// the window only repaints when something changed.
#[derive(Clone)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
    version_tx: Arc<watch::Sender<u64>>,
}

impl Page {
    pub fn new(document: Document) -> Self {
        let (version_tx, _version_rx) = watch::channel(0u64);
        Self {
            doc: Arc::new(Mutex::new(document)),
            version_tx: Arc::new(version_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version_tx.borrow()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        f(&doc)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = {
            let mut doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut doc)
        };
        self.version_tx.send_modify(|v| *v = v.wrapping_add(1));
        result
    }

    /// Run `f` on one program's pane, if that program is on the page.
    pub fn update_pane(&self, program: ProgramId, f: impl FnOnce(&mut LogPane)) {
        self.update(|doc| {
            if let Some(pane) = doc.pane_mut(program) {
                f(pane);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;

    fn lines(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_element_ids_follow_page_contract() {
        let p = ProgramId(3);
        assert_eq!(Binding::Logs.element_id(p), "logs-3");
        assert_eq!(Binding::StatusIndicator.element_id(p), "status-3");
        assert_eq!(Binding::StatusText.element_id(p), "status-text-3");
        assert_eq!(Binding::Pid.element_id(p), "pid-3");
        assert_eq!(Binding::StartButton.element_id(p), "start-btn-3");
        assert_eq!(Binding::StopButton.element_id(p), "stop-btn-3");
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut pane = LogPane::default();
        pane.replace_lines(lines(0..7));
        let shown: Vec<&str> = pane.lines().collect();
        assert_eq!(shown.len(), 7);
        assert_eq!(shown.first(), Some(&"line 0"));
        assert_eq!(shown.last(), Some(&"line 6"));
    }

    #[test]
    fn test_replace_with_nothing_shows_placeholder() {
        let mut pane = LogPane::default();
        pane.replace_lines(Vec::new());
        assert_eq!(pane.placeholder(), Some(Placeholder::NoLogs));
        assert!(pane.is_empty());
    }

    #[test]
    fn test_append_evicts_oldest_past_cap() {
        let mut pane = LogPane::default();
        pane.replace_lines(lines(0..MAX_LOG_LINES));
        pane.append_line("newest".to_string());
        assert_eq!(pane.len(), MAX_LOG_LINES);
        assert_eq!(pane.lines().next(), Some("line 1"));
        assert_eq!(pane.lines().last(), Some("newest"));
    }

    #[test]
    fn test_replace_longer_than_cap_keeps_tail() {
        let mut pane = LogPane::default();
        pane.replace_lines(lines(0..(MAX_LOG_LINES + 20)));
        assert_eq!(pane.len(), MAX_LOG_LINES);
        assert_eq!(pane.lines().next(), Some("line 20"));
    }

    #[test]
    fn test_append_replaces_placeholder() {
        let mut pane = LogPane::default();
        assert_eq!(pane.placeholder(), Some(Placeholder::Loading));
        pane.append_line("first".to_string());
        assert_eq!(pane.placeholder(), None);
        assert_eq!(pane.lines().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn test_dismiss_alert_once() {
        let mut doc = Document::new(&[ProgramId(1)], Locale::En);
        let alert = Alert::new(Severity::Info, "hello");
        let id = alert.id.clone();
        doc.push_alert(alert);
        assert!(doc.dismiss_alert(&id));
        assert!(!doc.dismiss_alert(&id));
        assert!(doc.alerts().is_empty());
    }

    #[test]
    fn test_render_html_escapes_and_binds_ids() {
        let mut doc = Document::new(&[ProgramId(1), ProgramId(2)], Locale::En);
        doc.pane_mut(ProgramId(1))
            .unwrap()
            .replace_lines(vec!["<b>bold</b> & more".to_string()]);
        doc.pane_mut(ProgramId(2))
            .unwrap()
            .show_placeholder(Placeholder::LoadError);
        doc.push_alert(Alert::new(Severity::Warning, "<img src=x>"));

        let html = doc.render_html();
        assert!(html.contains(r#"id="alert-container""#));
        assert!(html.contains(r#"id="logs-1""#));
        assert!(html.contains(r#"id="status-text-2""#));
        assert!(html.contains(r#"id="stop-btn-2" disabled"#));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; more"));
        assert!(html.contains(r#"<div class="text-danger">Error loading logs</div>"#));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_page_update_bumps_version() {
        let page = Page::new(Document::new(&[ProgramId(1)], Locale::En));
        let before = page.version();
        page.update_pane(ProgramId(1), |pane| pane.append_line("x".to_string()));
        assert_eq!(page.version(), before + 1);
        assert_eq!(page.read(|doc| doc.pane(ProgramId(1)).unwrap().len()), 1);
    }
}
