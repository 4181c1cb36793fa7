//! Reporting of recoverable problems found while reading a file.
//!
//! Fatal problems are returned as errors. Everything else (unexpected version strings,
//! oversized descriptions, empty fibers, ...) is reported through a [`Diagnostics`]
//! implementation passed in by the caller.

/// Receiver of non-fatal reader messages.
pub trait Diagnostics {
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn warn(&mut self, msg: &str) {
        (**self).warn(msg)
    }
    fn error(&mut self, msg: &str) {
        (**self).error(msg)
    }
}

/// Forwards all messages to the `log` facade.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&mut self, msg: &str) {
        log::warn!("{}", msg);
    }
    fn error(&mut self, msg: &str) {
        log::error!("{}", msg);
    }
}

/// Stores all messages so they can be presented later, e.g. next to a loaded dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectDiagnostics {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CollectDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

impl Diagnostics for CollectDiagnostics {
    fn warn(&mut self, msg: &str) {
        log::debug!("collected warning: {}", msg);
        self.warnings.push(msg.to_string());
    }
    fn error(&mut self, msg: &str) {
        log::debug!("collected error: {}", msg);
        self.errors.push(msg.to_string());
    }
}
