//! A small capability trait so the engine never hard-wires a logging
//! backend. `AbeEngine` is handed a `Logger` at construction and calls it
//! for anything worth surfacing to an operator (authority registration,
//! policy rejections, storage faults). The default forwards to `tracing`,
//! so a host that doesn't supply its own still gets structured output
//! through whatever subscriber it installed.

pub trait Logger: Send + Sync {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

#[derive(Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
    }
}

/// A logger that discards everything. Useful for tests that don't want
/// output noise.
#[derive(Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}
