//! # podium-client
//!
//! Resilient channel sessions over a managed realtime service.
//!
//! The host application installs its transport client into a
//! [`RealtimeContext`] once; every [`ChannelSession`] opened against
//! that context then composes the gating, classification, and
//! addressing rules from `podium-core` around the transport's publish,
//! subscribe, and presence primitives. Callers never see transport
//! weather: gated operations resolve as no-ops and classified failures
//! are absorbed into telemetry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use podium_client::{ChannelSession, ClientConfig, RealtimeContext};
//! use podium_core::{ChannelDescriptor, ChannelTemplate, SeriesPrivateEvent};
//! use podium_transport::MemoryRealtime;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = RealtimeContext::new();
//!     context.initialize(&ClientConfig::load()?, |_config| {
//!         // In production this constructs the real transport client.
//!         Arc::new(MemoryRealtime::new("conn_local"))
//!     });
//!
//!     let descriptor = ChannelDescriptor::new(ChannelTemplate::SeriesPrivate, "abc123");
//!     let session = ChannelSession::open(context, descriptor)?;
//!
//!     session.subscribe(None, |msg| println!("{msg:?}")).await?;
//!     session
//!         .publish(SeriesPrivateEvent::Navigation, serde_json::json!({"slide": 1}))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod session;
pub mod sink;

pub use auth::{request_token, AuthError, TokenProvider, TokenRequest};
pub use config::{ClientConfig, SetupConfig};
pub use context::RealtimeContext;
pub use session::{ChannelSession, OpOutcome, SessionError};
pub use sink::{
    ExceptionSink, FeatureError, MetricSink, RuntimeMetrics, Sinks, TracingExceptionSink,
};
