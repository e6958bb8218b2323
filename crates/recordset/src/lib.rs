pub mod error;
pub mod types;

pub mod proxy;
pub mod reactive;
pub mod record;
pub mod record_set;

pub use record::{Record, RecordRef, RecordSchema};
pub use record_set::{RecordSet, RecordSetOptions};
