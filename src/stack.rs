//! Stack snapshot capture and frame-link rewriting.
//!
//! A panic unwinds the stack before `catch_unwind` hands control back, so a
//! snapshot taken on the recovery path would show the middleware, not the
//! fault site. Capture therefore happens inside a process-wide panic hook,
//! which runs on the panicking thread while the faulting frames are still
//! live. The snapshot is parked in a thread-local slot and taken exactly
//! once by the recovery path on that same thread; unwinding never crosses
//! an `.await`, so the slot cannot be observed by another request.
//!
//! Snapshot format, one frame at a time:
//!
//! ```text
//! recoverer::stack::capture
//!     /app/src/stack.rs:64
//! ```
//!
//! Frames without resolved source info emit the symbol line only.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::panic;
use std::sync::{LazyLock, Once};

use regex::{Captures, Regex};

thread_local! {
    static FAULT_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Lines of the form `<indent><path>:<digits>`. The path token may not
/// contain whitespace or colons, and the match is anchored at line start,
/// so a `file:line` mention inside free-form text is left alone. Anything
/// after the digits (offsets, columns) stays outside the match.
static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s+([^\s:]+):(\d+)").expect("frame pattern"));

/// Install the snapshot-capturing panic hook.
///
/// Idempotent; the previous hook keeps running after the capture, so panic
/// output still reaches stderr for operators and test harnesses.
pub fn install_capture_hook() {
    HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            FAULT_STACK.with(|slot| *slot.borrow_mut() = Some(capture()));
            prev(info);
        }));
    });
}

/// Take the snapshot recorded by the hook for the current thread, if any.
pub fn take_snapshot() -> Option<String> {
    FAULT_STACK.with(|slot| slot.borrow_mut().take())
}

/// Render the current call stack as snapshot text.
pub fn capture() -> String {
    let trace = backtrace::Backtrace::new();
    let mut out = String::new();
    for frame in trace.frames() {
        for symbol in frame.symbols() {
            match symbol.name() {
                Some(name) => {
                    let _ = writeln!(out, "{name}");
                }
                None => {
                    let _ = writeln!(out, "<unresolved>");
                }
            }
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                let _ = writeln!(out, "\t{}:{}", file.display(), line);
            }
        }
    }
    out
}

/// Rewrite every frame-location line in `stack` into a source-viewer link.
///
/// The matched text is wrapped whole, so the rendered page reads exactly
/// like the raw snapshot with the locations turned clickable. Lines that do
/// not match the frame pattern pass through untouched, which leaves traces
/// in an unexpected format readable as plain preformatted text.
pub fn link_frames(stack: &str) -> String {
    FRAME_LINE
        .replace_all(stack, |caps: &Captures<'_>| {
            format!(
                r#"<a href="/debug/?path={}&line={}">{}</a>"#,
                &caps[1], &caps[2], &caps[0]
            )
        })
        .into_owned()
}
