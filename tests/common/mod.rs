//! Shared fixtures for gateway and guard tests: a scripted transport and
//! recording implementations of the UI seams.
#![allow(dead_code)]

use async_trait::async_trait;
use gardisto::gateway::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use gardisto::hooks::{Navigator, Notifier, NoticeLevel};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs a per-binary tracing subscriber so `RUST_LOG` surfaces gateway
/// logs during a test run. Repeat calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub enum Scripted {
    Status(u16, Value),
    /// Response delivered after a delay, used to hold a refresh or fetch open
    /// while overlapping requests pile up.
    Delayed(u16, Value, Duration),
    Failure(TransportError),
}

/// Transport that answers from per-path queues and records every request.
/// Paths with no scripted response answer 200 with a null body.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn enqueue(&self, path: &str, status: u16, body: Value) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Status(status, body));
    }

    pub fn enqueue_delayed(&self, path: &str, status: u16, body: Value, delay: Duration) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Delayed(status, body, delay));
    }

    pub fn enqueue_failure(&self, path: &str, failure: TransportError) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Failure(failure));
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub fn last_bearer_for(&self, path: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|request| request.path == path)
            .and_then(|request| request.bearer_token.clone())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);

        match scripted {
            None => Ok(ApiResponse {
                status: StatusCode::OK,
                body: Value::Null,
            }),
            Some(Scripted::Status(status, body)) => Ok(ApiResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body,
            }),
            Some(Scripted::Delayed(status, body, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ApiResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    body,
                })
            }
            Some(Scripted::Failure(failure)) => Err(failure),
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub logins: Mutex<Vec<Option<String>>>,
}

impl RecordingNavigator {
    pub fn login_count(&self) -> usize {
        self.logins.lock().unwrap().len()
    }
}

impl Navigator for RecordingNavigator {
    fn to_login(&self, redirect: Option<&str>) {
        self.logins
            .lock()
            .unwrap()
            .push(redirect.map(str::to_string));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}
