//! Shared helpers: a scripted stand-in for the source API.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use noaa_sync::error::{Result, SyncError};
use noaa_sync::models::Record;
use noaa_sync::transport::{ApiRequest, ApiResponse, Transport};

type Responder = Box<dyn Fn(&ApiRequest, usize) -> Result<ApiResponse> + Send + Sync>;

/// A [`Transport`] that answers from a closure and records every request.
///
/// The closure receives the request and its 0-based call index.
pub struct ScriptedTransport {
    responder: Responder,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&ApiRequest, usize) -> Result<ApiResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Serve `records` the way the source does: probe metadata on requests
    /// without an offset, plain pages otherwise.
    pub fn serving(records: Vec<Record>) -> Arc<Self> {
        Self::new(move |req, _| Ok(page_response(&records, req)))
    }

    /// Fail the first `failures` calls with `status`, then serve `records`.
    pub fn flaky(records: Vec<Record>, failures: usize, status: u16) -> Arc<Self> {
        Self::new(move |req, call| {
            if call < failures {
                Ok(ApiResponse {
                    status,
                    body: "Service Unavailable".to_string(),
                })
            } else {
                Ok(page_response(&records, req))
            }
        })
    }

    /// Always fail with `status`.
    pub fn failing(status: u16) -> Arc<Self> {
        Self::new(move |_, _| {
            Ok(ApiResponse {
                status,
                body: String::new(),
            })
        })
    }

    /// Drop the connection on the first `failures` calls, then serve `records`.
    pub fn disconnecting(records: Vec<Record>, failures: usize) -> Arc<Self> {
        Self::new(move |req, call| {
            if call < failures {
                Err(SyncError::Transport("connection reset by peer".to_string()))
            } else {
                Ok(page_response(&records, req))
            }
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(request, call)
    }
}

/// Answer `req` from `records`, honouring `limit` and `offset`.
pub fn page_response(records: &[Record], req: &ApiRequest) -> ApiResponse {
    let limit: usize = req
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(records.len());
    let offset: Option<usize> = req.get("offset").and_then(|o| o.parse().ok());

    let body = match offset {
        None if records.is_empty() => json!({}),
        None => json!({
            "metadata": {"resultset": {"offset": 1, "count": records.len(), "limit": limit}},
            "results": records.iter().take(limit).collect::<Vec<_>>(),
        }),
        Some(offset) => json!({
            "results": records.iter().skip(offset).take(limit).collect::<Vec<_>>(),
        }),
    };
    ApiResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// `n` distinct daily observations for `date`.
pub fn observations(date: &str, n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            record(json!({
                "date": date,
                "datatype": "TMAX",
                "station": format!("GHCND:USW{:08}", i),
                "attributes": ",,W,2400",
                "value": 50 + (i % 40) as i64,
            }))
        })
        .collect()
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}
