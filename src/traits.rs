//! Connector trait and the built-in connector set.
//!
//! Every source the binary can sync implements [`Connector`]. One call to
//! [`Connector::invoke`] is one unit of work for the runtime: read the
//! persisted state, fetch, normalize, and hand back rows plus the next
//! state. Connectors hold no state between calls.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             ConnectorKind                │
//! │  ┌─────────┐ ┌──────────┐ ┌───────────┐  │
//! │  │  daily  │ │ stations │ │ max_temp  │  │
//! │  └─────────┘ └──────────┘ └───────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼ build()
//!        invoke() → { state, insert, schema, hasMore }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::models::{InvocationOutput, SyncState};
use crate::transport::Transport;
use crate::window::Clock;

/// A source that can be synced one invocation at a time.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use noaa_sync::error::Result;
/// use noaa_sync::models::{InvocationOutput, SyncState};
/// use noaa_sync::traits::Connector;
///
/// pub struct EmptyConnector;
///
/// #[async_trait]
/// impl Connector for EmptyConnector {
///     fn name(&self) -> &str { "empty" }
///     fn description(&self) -> &str { "Emits nothing" }
///     fn table(&self) -> &str { "empty" }
///
///     async fn invoke(&self, _state: &SyncState) -> Result<InvocationOutput> {
///         Ok(InvocationOutput::single_table(
///             "empty", vec![], vec!["id".into()], SyncState::default(), false,
///         ))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name used on the command line (e.g. `"daily"`).
    fn name(&self) -> &str;

    /// One-line description for `noaa-sync connectors`.
    fn description(&self) -> &str;

    /// Destination table the rows are inserted into.
    fn table(&self) -> &str;

    /// Run one invocation against `state`.
    ///
    /// Must be idempotent: the same state and the same upstream data
    /// produce the same output. On error nothing is emitted and the
    /// runtime reuses `state`.
    async fn invoke(&self, state: &SyncState) -> Result<InvocationOutput>;
}

/// The built-in connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Daily,
    Stations,
    MaxTemp,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 3] = [
        ConnectorKind::Daily,
        ConnectorKind::Stations,
        ConnectorKind::MaxTemp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConnectorKind::Daily => crate::connector_daily::NAME,
            ConnectorKind::Stations => crate::connector_stations::NAME,
            ConnectorKind::MaxTemp => crate::connector_max_temp::NAME,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConnectorKind::Daily => crate::connector_daily::DESCRIPTION,
            ConnectorKind::Stations => crate::connector_stations::DESCRIPTION,
            ConnectorKind::MaxTemp => crate::connector_max_temp::DESCRIPTION,
        }
    }

    /// Look a connector up by name. Hyphens and underscores are
    /// interchangeable.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.name() == wanted)
    }

    /// Build the connector over a shared transport and clock.
    pub fn build(
        self,
        config: &Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn Connector>> {
        use crate::connector_daily::DailyConnector;
        use crate::connector_max_temp::MaxTempConnector;
        use crate::connector_stations::StationsConnector;

        Ok(match self {
            ConnectorKind::Daily => Box::new(DailyConnector::new(config, transport, clock)?),
            ConnectorKind::Stations => Box::new(StationsConnector::new(config, transport)),
            ConnectorKind::MaxTemp => Box::new(MaxTempConnector::new(config, transport, clock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_hyphens() {
        assert_eq!(ConnectorKind::from_name("max-temp"), Some(ConnectorKind::MaxTemp));
        assert_eq!(ConnectorKind::from_name("daily"), Some(ConnectorKind::Daily));
        assert_eq!(ConnectorKind::from_name("hourly"), None);
    }

    #[test]
    fn test_built_connector_matches_kind() {
        use crate::config::Credential;
        use crate::transport::HttpTransport;
        use crate::window::FixedClock;
        use chrono::NaiveDate;

        let config = Config::default();
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.api, Credential::new("t")).unwrap());
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 11, 10).unwrap()));
        for kind in ConnectorKind::ALL {
            let connector = kind.build(&config, transport.clone(), clock.clone()).unwrap();
            assert_eq!(connector.name(), kind.name());
            assert_eq!(connector.description(), kind.description());
        }
    }
}
