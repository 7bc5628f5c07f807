//! # podium-core
//!
//! Pure decision logic and vocabulary types for the Podium realtime layer.
//!
//! This crate answers two questions for every channel operation, without
//! performing any I/O itself:
//!
//! - **Gate** - given the transport's connection state and the channel's
//!   state, should this operation be attempted at all?
//! - **Classify** - given a transport failure, should it be ignored,
//!   counted, or reported?
//!
//! It also owns the **addressing** scheme that turns an abstract channel
//! descriptor into a concrete transport channel name, and the fixed
//! **event taxonomy** the presentation and voting surfaces exchange.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Addressing  │────▶│     Gate     │────▶│  Classifier  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!    descriptor          skip / proceed       ignore / count
//!    → channel name                           / report
//! ```

pub mod address;
pub mod classify;
pub mod error;
pub mod event;
pub mod gate;
pub mod state;

pub use address::{
    resolve, AddressError, ChannelDescriptor, ChannelOptions, ChannelTemplate, DeliveryOptions,
};
pub use classify::{classify, Disposition, ErrorContext};
pub use error::ErrorEnvelope;
pub use event::{EventKind, PresentationStateEvent, SeriesPrivateEvent};
pub use gate::{should_skip, GateInput, OperationKind};
pub use state::{ChannelState, ConnectionState};
