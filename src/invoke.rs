//! Invocation boundary.
//!
//! Takes the runtime's event, runs one connector invocation and turns the
//! outcome into a JSON-serializable [`ConnectorResponse`]. No error crosses
//! this boundary: a missing credential or a fetch that exhausted its
//! retries becomes `{ "error": "..." }` with no state and no rows, so the
//! runtime keeps the cursor it already has.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{Config, Credential};
use crate::error::SyncError;
use crate::models::{InvocationInput, InvocationOutput};
use crate::traits::{Connector, ConnectorKind};
use crate::transport::{HttpTransport, Transport};
use crate::window::Clock;

/// What the runtime receives from one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectorResponse {
    Completed(InvocationOutput),
    Failed { error: String },
}

impl ConnectorResponse {
    pub fn output(&self) -> Option<&InvocationOutput> {
        match self {
            ConnectorResponse::Completed(out) => Some(out),
            ConnectorResponse::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConnectorResponse::Completed(_) => None,
            ConnectorResponse::Failed { error } => Some(error),
        }
    }
}

/// Map an invocation result onto the response shape.
pub fn respond(result: Result<InvocationOutput, SyncError>) -> ConnectorResponse {
    match result {
        Ok(output) => ConnectorResponse::Completed(output),
        Err(e) => {
            if e.is_config() {
                warn!(error = %e, "skipping invocation");
            } else {
                error!(error = %e, "invocation failed, state left unchanged");
            }
            ConnectorResponse::Failed {
                error: format!("Error: {}", e),
            }
        }
    }
}

/// Run `connector` once for `event`.
pub async fn run_invocation(
    connector: &dyn Connector,
    event: &InvocationInput,
) -> ConnectorResponse {
    let result = connector.invoke(&event.state).await;
    if let Ok(output) = &result {
        info!(
            connector = connector.name(),
            table = connector.table(),
            rows = output.rows(connector.table()).len(),
            has_more = output.has_more,
            "emitting response"
        );
    }
    respond(result)
}

/// Resolve a connector name given on the command line.
pub fn resolve(connector: &str) -> anyhow::Result<ConnectorKind> {
    ConnectorKind::from_name(connector).ok_or_else(|| {
        let names: Vec<&str> = ConnectorKind::ALL.iter().map(|k| k.name()).collect();
        anyhow!(
            "Unknown connector: '{}'. Available: {}",
            connector,
            names.join(", ")
        )
    })
}

/// Run `kind` against the live API.
///
/// `credential` is resolved by the caller; `None` yields the error response
/// without touching the network.
pub async fn invoke(
    config: &Config,
    kind: ConnectorKind,
    event: &InvocationInput,
    credential: Option<Credential>,
    clock: Arc<dyn Clock>,
) -> ConnectorResponse {
    let Some(credential) = credential else {
        return respond(Err(SyncError::MissingCredential {
            env_var: config.api.token_env.clone(),
        }));
    };

    match HttpTransport::new(&config.api, credential) {
        Ok(transport) => invoke_with(config, kind, event, Arc::new(transport), clock).await,
        Err(e) => respond(Err(e)),
    }
}

/// Run `kind` over an arbitrary transport.
pub async fn invoke_with(
    config: &Config,
    kind: ConnectorKind,
    event: &InvocationInput,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
) -> ConnectorResponse {
    match kind.build(config, transport, clock) {
        Ok(connector) => run_invocation(connector.as_ref(), event).await,
        Err(e) => respond(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 11, 10).unwrap()))
    }

    #[tokio::test]
    async fn test_missing_credential_is_error_shape() {
        let response = invoke(
            &Config::default(),
            ConnectorKind::Daily,
            &InvocationInput::default(),
            None,
            clock(),
        )
        .await;

        assert!(response.output().is_none());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["error"].as_str().unwrap().contains("NOAA_API_KEY"));
        assert!(json.get("state").is_none());
        assert!(json.get("insert").is_none());
    }

    #[test]
    fn test_unknown_connector_is_rejected() {
        let err = resolve("hourly").unwrap_err();
        assert!(err.to_string().contains("Unknown connector"));
        assert!(err.to_string().contains("daily, stations, max_temp"));
        assert_eq!(resolve("max-temp").unwrap(), ConnectorKind::MaxTemp);
    }

    #[test]
    fn test_failed_response_roundtrips_untagged() {
        let response = respond(Err(SyncError::MissingCredential {
            env_var: "NOAA_API_KEY".to_string(),
        }));
        let json = serde_json::to_string(&response).unwrap();
        let back: ConnectorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
