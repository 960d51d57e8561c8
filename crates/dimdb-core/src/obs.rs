//! Diagnostics sink boundary.
//!
//! Runtime code never writes to stderr directly; every failure line flows
//! through [`diag`] so embedders and tests can redirect the stream.

use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn DiagSink>> = const { RefCell::new(None) };
}

///
/// DiagSink
///

pub trait DiagSink {
    fn emit(&self, line: &str);
}

///
/// StderrSink
///

pub struct StderrSink;

impl DiagSink for StderrSink {
    fn emit(&self, line: &str) {
        eprintln!("dimdb: {line}");
    }
}

///
/// NoopDiagSink
///

pub struct NoopDiagSink;

impl DiagSink for NoopDiagSink {
    fn emit(&self, _: &str) {}
}

const DEFAULT_SINK: StderrSink = StderrSink;

/// Emit one diagnostic line through the active sink.
pub fn diag(line: &str) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY: override is scoped by with_diag_sink and only used synchronously.
        unsafe { (*ptr).emit(line) };
    } else {
        DEFAULT_SINK.emit(line);
    }
}

/// Run a closure with a temporary diagnostics sink override.
pub fn with_diag_sink<T>(sink: &dyn DiagSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn DiagSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY: we erase the reference lifetime for scoped storage in TLS and
    // restore the previous value on scope exit via Guard.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn DiagSink, *const dyn DiagSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}
