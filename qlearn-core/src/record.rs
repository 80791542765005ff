//! Types and traits for recording training metrics.
//!
//! * [`Record`] - A container of key-value pairs
//! * [`RecordValue`] - The values a record can hold
//! * [`Recorder`] - Writes a record to an output destination
//! * [`AggregateRecorder`] - Stores records and writes their aggregates on flush
//! * [`RecordStorage`] - Aggregation of stored records
//! * [`BufferedRecorder`] - Keeps records in memory
//! * [`NullRecorder`] - Discards all records
//!
//! ```rust
//! use qlearn_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("reward", 10.0);
//! record.insert("state", RecordValue::String("3.4".to_string()));
//! assert_eq!(record.get_scalar("reward").unwrap(), 10.0);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
