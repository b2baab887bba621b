use tcc_common::{ErrorKind, TryError};

/// Returns `true` if `error` must not trigger an immediate rollback.
///
/// The error matches when its own kind, or the kind of its root cause, is one of `kinds` or a
/// descendant of one of them.
pub fn is_delay_cancel_error<'a>(
    error: &TryError,
    kinds: impl IntoIterator<Item = &'a ErrorKind>,
) -> bool {
    let root_cause = error.root_cause();
    kinds.into_iter().any(|kind| {
        error.kind().is_a(kind) || root_cause.is_some_and(|cause| cause.kind().is_a(kind))
    })
}
