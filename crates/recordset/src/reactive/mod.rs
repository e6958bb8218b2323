//! Reactive layer: typed events for records and record sets.
//!
//! # Modules
//!
//! - [`event`]: [`RecordEvent`] and [`SetEvent`] enums.
//! - [`event_emitter`]: Generic typed pub/sub ([`EventEmitter<T>`]).

pub mod event;
pub mod event_emitter;

pub use event::{RecordEvent, SetEvent};
pub use event_emitter::{EventEmitter, ListenerId};
