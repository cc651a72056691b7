//! In-memory supervisor used by the client tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;

use program_dashboard::api::{
    Action, ActionResponse, Backend, Cursor, LogStream, LogsResponse, ProgramSnapshot, StatusMap,
};
use program_dashboard::{ApiError, ClientSettings, DeliveryMode, Locale, ProgramId};

/// A request the fake backend received.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Logs {
        program: ProgramId,
        since: Option<String>,
    },
    Status,
    Action {
        program: ProgramId,
        action: Action,
    },
    Stream {
        program: ProgramId,
    },
}

type Scripted<T> = Mutex<VecDeque<Result<T, ApiError>>>;

#[derive(Default)]
pub struct FakeBackend {
    requests: Mutex<Vec<Request>>,
    logs: Mutex<HashMap<ProgramId, VecDeque<(Duration, Result<LogsResponse, ApiError>)>>>,
    status: Scripted<StatusMap>,
    actions: Scripted<ActionResponse>,
    streams: Mutex<HashMap<ProgramId, VecDeque<LogStream>>>,
    stream_opens: AtomicUsize,
}

/// Error a real transport would produce for a refused connection.
pub fn refused(url: &str) -> ApiError {
    ApiError::Status {
        url: url.to_string(),
        status: 503,
    }
}

pub fn logs(lines: &[&str], timestamp: Option<&str>) -> LogsResponse {
    LogsResponse {
        logs: lines.iter().map(|l| l.to_string()).collect(),
        timestamp: timestamp.map(|t| Cursor(t.to_string())),
    }
}

pub fn snapshot(status: &str, pid: Option<u32>) -> ProgramSnapshot {
    ProgramSnapshot {
        status: status.to_string(),
        pid,
        name: None,
        last_update: None,
    }
}

pub fn action_response(status: &str, message: &str) -> ActionResponse {
    ActionResponse {
        status: status.to_string(),
        message: message.to_string(),
    }
}

pub fn settings(programs: &[u32], delivery: DeliveryMode) -> ClientSettings {
    ClientSettings {
        programs: programs.iter().copied().map(ProgramId).collect(),
        delivery,
        locale: Locale::En,
        status_interval: Duration::from_secs(3),
        poll_interval: Duration::from_secs(2),
        reconnect_delay: Duration::from_secs(5),
        alert_timeout: Duration::from_secs(5),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_logs(&self, program: u32, response: Result<LogsResponse, ApiError>) {
        self.push_logs_delayed(program, Duration::ZERO, response);
    }

    /// Like `push_logs`, but the answer arrives `delay` after the request.
    pub fn push_logs_delayed(
        &self,
        program: u32,
        delay: Duration,
        response: Result<LogsResponse, ApiError>,
    ) {
        self.logs
            .lock()
            .unwrap()
            .entry(ProgramId(program))
            .or_default()
            .push_back((delay, response));
    }

    pub fn push_status(&self, response: Result<StatusMap, ApiError>) {
        self.status.lock().unwrap().push_back(response);
    }

    pub fn push_action(&self, response: Result<ActionResponse, ApiError>) {
        self.actions.lock().unwrap().push_back(response);
    }

    /// Queue a stream for the next subscription to `program`; the returned
    /// sender feeds it. Dropping the sender ends the stream.
    pub fn push_stream(&self, program: u32) -> mpsc::UnboundedSender<Result<String, ApiError>> {
        let (tx, rx) = mpsc::unbounded();
        self.streams
            .lock()
            .unwrap()
            .entry(ProgramId(program))
            .or_default()
            .push_back(rx.boxed());
        tx
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Request) -> bool) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| predicate(r)).count()
    }

    pub fn stream_opens(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }

    fn record(&self, request: Request) {
        self.requests.lock().unwrap().push(request);
    }
}

impl Backend for FakeBackend {
    async fn fetch_logs(
        &self,
        program: ProgramId,
        since: Option<Cursor>,
    ) -> Result<LogsResponse, ApiError> {
        self.record(Request::Logs {
            program,
            since: since.map(|c| c.0),
        });
        let (delay, response) = self
            .logs
            .lock()
            .unwrap()
            .get_mut(&program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| (Duration::ZERO, Ok(logs(&[], None))));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn fetch_status(&self) -> Result<StatusMap, ApiError> {
        self.record(Request::Status);
        self.status
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusMap::new()))
    }

    async fn send_action(
        &self,
        program: ProgramId,
        action: Action,
    ) -> Result<ActionResponse, ApiError> {
        self.record(Request::Action { program, action });
        self.actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(action_response("success", "ok")))
    }

    async fn open_log_stream(&self, program: ProgramId) -> Result<LogStream, ApiError> {
        self.record(Request::Stream { program });
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        let queued = self
            .streams
            .lock()
            .unwrap()
            .get_mut(&program)
            .and_then(VecDeque::pop_front);
        // An unscripted subscription stays open and silent.
        Ok(queued.unwrap_or_else(|| futures::stream::pending().boxed()))
    }
}
