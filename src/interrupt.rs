//! # Interrupt reasons
//!
//! `Interrupt` is not a separate exception type in this crate — Rust has one `Result` channel,
//! not a distinct "uncatchable throw". It lives as a variant of [`tasker_shared::TaskerError`]
//! instead, and the uncatchability §4.5 asks for comes from how [`crate::engine::execute`]
//! structurally re-raises it rather than from the type system: a handler's `match` on the
//! `Result` returned by `execute` can inspect non-interrupt errors, but an interrupt is always
//! propagated unchanged by the engine and is never handed to application code as something worth
//! matching on. These constants name the three places the engine raises one (§4.3).

use tasker_shared::TaskerError;

/// A concurrent delivery already owns this step (§4.3 "not-yet-started").
pub const IN_PROGRESS: &str = "in progress — skipping";

/// This step was not yet begun; the engine has just staged it and enqueued a continuation
/// (§4.3 "not-yet-started").
pub const TRIGGERED: &str = "execution triggered";

/// This step's callback just resolved and the engine committed its result and enqueued the
/// parent continuation (§4.3 "targeting").
pub const STEP_COMMITTED: &str = "step committed";

/// Build the interrupt sentinel for one of the reasons above.
pub(crate) fn raise(reason: &'static str) -> TaskerError {
    TaskerError::Interrupt { reason }
}
