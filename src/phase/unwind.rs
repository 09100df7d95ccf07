//! Unwinding out of phase processing without touching the terminal.
//!
//! A process-wide panic hook is installed once. While a thread is inside
//! [`catch_traced`], panics raised on that thread are recorded into a
//! thread-local slot (location and a forced backtrace) instead of being
//! printed. Panics on any other thread, or outside [`catch_traced`], are
//! handed to the hook that was installed before.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

static HOOK: Once = Once::new();

thread_local! {
    // `None`: not armed. `Some(None)`: armed, nothing caught yet.
    static ARMED: RefCell<Option<Option<Caught>>> = const { RefCell::new(None) };
}

struct Caught {
    location: Option<String>,
    backtrace: String,
}

/// A panic caught while processing a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicTrace {
    /// Panic payload, when it was a string
    pub message: String,
    /// `file:line:column` of the panic
    pub location: Option<String>,
    /// Backtrace of the panicking thread
    pub backtrace: Option<String>,
}

impl PanicTrace {
    /// A trace carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            backtrace: None,
        }
    }
}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let recorded = ARMED
                .try_with(|slot| {
                    let Ok(mut slot) = slot.try_borrow_mut() else {
                        return false;
                    };
                    let Some(caught) = slot.as_mut() else {
                        return false;
                    };
                    *caught = Some(Caught {
                        location: info
                            .location()
                            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
                        backtrace: Backtrace::force_capture().to_string(),
                    });
                    true
                })
                .unwrap_or(false);
            if !recorded {
                previous(info);
            }
        }));
    });
}

/// Runs `f`, turning a panic into a [`PanicTrace`].
///
/// Calls may nest; each level only sees panics that escape to it.
pub fn catch_traced<R>(f: impl FnOnce() -> R) -> Result<R, PanicTrace> {
    install_hook();
    let outer = ARMED.with(|slot| slot.replace(Some(None)));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let caught = ARMED.with(|slot| slot.replace(outer)).flatten();

    result.map_err(|payload| {
        let message = panic_message(payload.as_ref());
        match caught {
            Some(Caught {
                location,
                backtrace,
            }) => PanicTrace {
                message,
                location,
                backtrace: Some(backtrace),
            },
            None => PanicTrace::message(message),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
