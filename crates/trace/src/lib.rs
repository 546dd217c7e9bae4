//! tstream - Trace
//!
//! Bounded on-disk traces for debugging individual components. Each traced
//! component owns a `Tracer` that keeps the last N records in a ring and
//! rewrites its file on flush, so a trace file never grows past the cap.
//!
//! Output traces record post-processing records; input traces record the raw
//! bytes in hex together with sender metadata. Secret-keyed fields are masked
//! before anything is written.

mod tracer;

pub use tracer::{TraceDirection, Tracer, TracerError, default_trace_path};

/// Default number of records kept per trace file
pub const DEFAULT_MAX_RECORDS: usize = 10;

/// Directory trace files are written under
pub const TRACE_DIR: &str = "/var/tmp/telemetry";
