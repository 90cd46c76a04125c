//! # NOAA Sync
//!
//! Incremental sync of NOAA Climate Data Online observations into a
//! managed destination.
//!
//! The runtime calls a connector once per cycle with the state it persisted
//! last time. The connector fetches one bounded slice of upstream data,
//! stamps each row with a primary key, and returns the rows together with
//! the next state and a `hasMore` flag telling the runtime whether to call
//! again right away.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │WindowAdvancer│──▶│  Pagination  │──▶│ PageFetcher  │──▶ Transport
//! │ cursor→window│   │    Driver    │   │ retry+backoff│    (HTTP)
//! └──────┬───────┘   └──────┬───────┘   └──────────────┘
//!        │                  ▼
//!        │           ┌──────────────┐
//!        └──────────▶│RowNormalizer │──▶ { state, insert, schema, hasMore }
//!                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export NOAA_API_KEY=...
//! noaa-sync connectors
//! echo '{"state":{}}' | noaa-sync invoke daily --event -
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential handling |
//! | [`error`] | Error type shared by every connector |
//! | [`models`] | Cursor, window, state and invocation payloads |
//! | [`transport`] | HTTP seam to the source API |
//! | [`fetch`] | Single-page fetch with bounded retry |
//! | [`paginate`] | Probe-then-page draining of one query |
//! | [`window`] | Cursor to window mapping and cursor advancement |
//! | [`normalize`] | Primary-key stamping |
//! | [`traits`] | `Connector` trait and the built-in `ConnectorKind` set |
//! | [`connector_daily`] | Daily observations, one day per invocation |
//! | [`connector_stations`] | Station catalogue |
//! | [`connector_max_temp`] | Yearly maximum temperatures per station |
//! | [`invoke`] | Invocation boundary and error shape |

pub mod config;
pub mod connector_daily;
pub mod connector_max_temp;
pub mod connector_stations;
pub mod error;
pub mod fetch;
pub mod invoke;
pub mod models;
pub mod normalize;
pub mod paginate;
pub mod traits;
pub mod transport;
pub mod window;
