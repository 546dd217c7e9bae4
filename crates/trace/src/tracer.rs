//! Trace ring and file writer
//!
//! The ring is updated synchronously under a short lock; flushing to disk is
//! offloaded with `tokio::task::spawn_blocking` so the data plane never waits
//! on file I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tstream_vault::mask_value;

use crate::{DEFAULT_MAX_RECORDS, TRACE_DIR};

/// Whether a tracer records component input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    Input,
    Output,
}

/// Tracer errors
#[derive(Debug, Error)]
pub enum TracerError {
    /// Failed to create the trace directory
    #[error("failed to create trace directory '{path}': {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the trace file
    #[error("failed to write trace file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Default trace path for a component: `<dir>/<Class>.<id>`, with an
/// `INPUT.` prefix for input traces
pub fn default_trace_path(class: &str, id: &str, direction: TraceDirection) -> PathBuf {
    let file = match direction {
        TraceDirection::Output => format!("{class}.{id}"),
        TraceDirection::Input => format!("INPUT.{class}.{id}"),
    };
    Path::new(TRACE_DIR).join(file)
}

/// Bounded trace ring flushed to one file
///
/// Cloning shares the ring; all clones write to the same file.
#[derive(Debug, Clone)]
pub struct Tracer {
    inner: Arc<Mutex<TracerInner>>,
    path: Arc<PathBuf>,
}

#[derive(Debug)]
struct TracerInner {
    /// The ring, oldest first once full
    records: Vec<Value>,
    /// Next write slot
    write_pos: usize,
    /// Total records ever written
    total_written: u64,
    /// Ring capacity
    max_records: usize,
}

impl Tracer {
    /// Create a tracer writing to `path`, keeping the default record count
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_max_records(path, DEFAULT_MAX_RECORDS)
    }

    /// Create a tracer with an explicit ring size
    pub fn with_max_records(path: impl Into<PathBuf>, max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            inner: Arc::new(Mutex::new(TracerInner {
                records: Vec::with_capacity(max_records),
                write_pos: 0,
                total_written: 0,
                max_records,
            })),
            path: Arc::new(path.into()),
        }
    }

    /// Path this tracer writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a value and schedule a flush
    ///
    /// Secret-keyed fields are masked before the value enters the ring, so
    /// no trace file ever contains plaintext secrets. Flush failures are
    /// logged, never surfaced to the data plane.
    pub fn write(&self, value: &Value) {
        let masked = mask_value(value);
        let snapshot = {
            let mut inner = self.inner.lock();
            let pos = inner.write_pos;
            if inner.records.len() < inner.max_records {
                inner.records.push(masked);
            } else {
                inner.records[pos] = masked;
            }
            inner.write_pos = (pos + 1) % inner.max_records;
            inner.total_written += 1;
            inner.ordered()
        };

        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = flush_to_disk(&path, &snapshot) {
                tracing::warn!(path = %path.display(), error = %e, "trace flush failed");
            }
        });
    }

    /// Record an input event (hex payload plus sender metadata)
    pub fn write_input(&self, data: &[u8], sender_key: &str, protocol: &str) {
        let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
        self.write(&serde_json::json!({
            "data": hex,
            "senderKey": sender_key,
            "protocol": protocol,
            "timestamp": Utc::now().to_rfc3339(),
            "hrtime": [0u64, 0u64],
        }));
    }

    /// Current ring contents, oldest first
    pub fn records(&self) -> Vec<Value> {
        self.inner.lock().ordered()
    }

    /// Total records ever written
    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }
}

impl TracerInner {
    /// Ring contents in write order, oldest first
    fn ordered(&self) -> Vec<Value> {
        if self.records.len() < self.max_records {
            return self.records.clone();
        }
        let mut out = Vec::with_capacity(self.max_records);
        for i in 0..self.max_records {
            out.push(self.records[(self.write_pos + i) % self.max_records].clone());
        }
        out
    }
}

/// Rewrite the trace file with the current ring contents
fn flush_to_disk(path: &Path, records: &[Value]) -> Result<(), TracerError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| TracerError::CreateDir {
            path: dir.display().to_string(),
            source: e,
        })?;
    }
    let body = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    std::fs::write(path, body).map_err(|e| TracerError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_trace_paths() {
        assert_eq!(
            default_trace_path("Telemetry_Listener", "ns::li", TraceDirection::Output),
            Path::new("/var/tmp/telemetry/Telemetry_Listener.ns::li")
        );
        assert_eq!(
            default_trace_path("Telemetry_Listener", "ns::li", TraceDirection::Input),
            Path::new("/var/tmp/telemetry/INPUT.Telemetry_Listener.ns::li")
        );
    }

    #[tokio::test]
    async fn test_ring_keeps_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = Tracer::with_max_records(dir.path().join("t"), 3);

        for i in 0..5 {
            tracer.write(&json!({"seq": i}));
        }

        let records = tracer.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["seq"], 2);
        assert_eq!(records[2]["seq"], 4);
        assert_eq!(tracer.total_written(), 5);
    }

    #[tokio::test]
    async fn test_secrets_masked_in_ring() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = Tracer::new(dir.path().join("t"));

        tracer.write(&json!({"credentials": {"passphrase": "s3cret"}}));

        let records = tracer.records();
        assert_eq!(records[0]["credentials"]["passphrase"], "*********");
    }

    #[tokio::test]
    async fn test_input_trace_is_hex() {
        let dir = tempfile::tempdir().unwrap();
        let tracer = Tracer::new(dir.path().join("t"));

        tracer.write_input(b"ab", "tcp-10.0.0.1-1234", "tcp");

        let records = tracer.records();
        assert_eq!(records[0]["data"], "6162");
        assert_eq!(records[0]["senderKey"], "tcp-10.0.0.1-1234");
        assert_eq!(records[0]["protocol"], "tcp");
    }

    #[test]
    fn test_flush_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.out");

        flush_to_disk(&path, &[json!({"a": 1}), json!({"b": 2})]).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 2);

        flush_to_disk(&path, &[json!({"c": 3})]).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
