use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error_map::{ErrorMap, union_results};

/// Boxed future returned by async validators. `Ok(None)` means the value
/// passed, `Ok(Some(map))` reports failures, `Err` is a validator fault
/// (see [`crate::FormError::ValidatorFault`]).
pub type BoxedValidationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<ErrorMap>, String>> + Send + 'a>>;

/// Synchronous validator: a pure predicate over the control value.
pub type SyncValidatorFn<T> = Arc<dyn Fn(&T) -> Option<ErrorMap> + Send + Sync>;

/// Asynchronous validator. Must be safely invocable multiple times
/// concurrently; the engine imposes no timeout.
pub type AsyncValidatorFn<T> = Arc<dyn Fn(T) -> BoxedValidationFuture<'static> + Send + Sync>;

/// Wraps a closure into a shared sync validator handle. The handle's identity
/// is what [`crate::Control::remove_validators`] matches on.
pub fn sync_validator<T, F>(f: F) -> SyncValidatorFn<T>
where
    F: Fn(&T) -> Option<ErrorMap> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps an async closure into a shared async validator handle.
pub fn async_validator<T, F, Fut>(f: F) -> AsyncValidatorFn<T>
where
    T: 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<ErrorMap>, String>> + Send + 'static,
{
    Arc::new(move |value: T| -> BoxedValidationFuture<'static> { Box::pin(f(value)) })
}

/// Identity of one async validation batch. Each entry into the async phase
/// issues the next generation; only the most recently issued generation may
/// commit its result.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Runs the sync validator list against a value.
///
/// Short-circuit mode (`run_all == false`) stops at the first validator that
/// reports errors; collect-all mode runs every validator and merges results by
/// key, later validator winning on collision.
pub(crate) fn run_sync_validators<T>(
    value: &T,
    validators: &[SyncValidatorFn<T>],
    run_all: bool,
) -> Option<ErrorMap> {
    if !run_all {
        return validators.iter().find_map(|validator| validator(value));
    }
    union_results(validators.iter().map(|validator| validator(value)))
}
