//! Scripted transport for unit tests

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, StatusCode, Transport};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

pub(crate) enum Reply {
    Now(HttpResponse),
    After(Duration, HttpResponse),
}

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Answers every request through `handler` and records what was sent
pub(crate) struct FakeTransport {
    handler: Handler,
    log: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub(crate) fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.log.lock().iter().filter(|r| r.path() == path).count()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let reply = (self.handler)(&request);
        self.log.lock().push(request);
        match reply {
            Reply::Now(response) => Ok(response),
            Reply::After(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }
}

pub(crate) fn json(status: u16, body: Value) -> HttpResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::from_json(status, &body)
}
