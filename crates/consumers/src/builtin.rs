//! Built-in consumers
//!
//! `stdout` backs the `default` consumer type and doubles as the reference
//! implementation; `null` swallows everything and exists for load testing
//! and as a routing target that never fails.

use async_trait::async_trait;

use crate::context::{Consumer, ConsumerContext, ConsumerError};

/// Writes each record to stdout as one JSON line
#[derive(Debug, Default)]
pub struct StdoutConsumer;

impl StdoutConsumer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Consumer for StdoutConsumer {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn consume(&self, ctx: ConsumerContext<'_>) -> Result<(), ConsumerError> {
        let line = serde_json::to_string(&ctx.event)
            .map_err(|e| ConsumerError::dispatch(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

/// Accepts and discards every record
#[derive(Debug, Default)]
pub struct NullConsumer;

impl NullConsumer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Consumer for NullConsumer {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn consume(&self, _ctx: ConsumerContext<'_>) -> Result<(), ConsumerError> {
        Ok(())
    }
}
