use std::sync::{Arc, RwLock};

use futures::future::join_all;
use log::{debug, trace};

use crate::error::{FormError, FormResult, read_lock, write_lock};
use crate::error_map::{ErrorMap, union_results};
use crate::group::GroupLink;
use crate::messages::{MessageTable, resolve_message};
use crate::node::{FormNode, Validity};
use crate::validator::{AsyncValidatorFn, Generation, SyncValidatorFn, run_sync_validators};

/// Construction options for a [`Control`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlOptions {
    /// When `false` (the default) the sync phase stops at the first validator
    /// that reports errors; when `true` every validator runs and results are
    /// merged by key, later validator winning on collision.
    pub run_all_sync_validators: bool,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            run_all_sync_validators: false,
        }
    }
}

/// Consistent read of a control's state for the rendering layer.
#[derive(Clone, Debug)]
pub struct ControlSnapshot<T> {
    pub value: T,
    pub validity: Validity,
    pub errors: Option<ErrorMap>,
    pub touched: bool,
    pub dirty: bool,
    pub submitted: bool,
}

type ControlListener<T> = Arc<dyn Fn(&ControlSnapshot<T>) + Send + Sync>;

struct ControlState<T> {
    value: T,
    initial_value: T,
    touched: bool,
    dirty: bool,
    submitted: bool,
    validity: Validity,
    errors: Option<ErrorMap>,
    generation: Generation,
    parent: Option<GroupLink>,
    listeners: Vec<ControlListener<T>>,
}

/// Leaf validation node: one value plus its derived validity and lifecycle
/// flags. Cheap to clone; clones share state, so a clone handed to a widget
/// and a clone nested in a [`crate::ControlGroup`] observe the same control.
///
/// The sync phase of validation runs inside [`Control::change`]; the async
/// phase is driven by whichever caller awaits [`Control::change_async`] or
/// [`Control::validate_async`]. A batch only commits if no newer change
/// superseded it, so the visible state always reflects the latest input.
#[derive(Clone)]
pub struct Control<T>
where
    T: Clone + Send + Sync + 'static,
{
    options: ControlOptions,
    state: Arc<RwLock<ControlState<T>>>,
    sync_validators: Arc<RwLock<Vec<SyncValidatorFn<T>>>>,
    async_validators: Arc<RwLock<Vec<AsyncValidatorFn<T>>>>,
}

impl<T> Control<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        initial_value: T,
        validators: Vec<SyncValidatorFn<T>>,
        async_validators: Vec<AsyncValidatorFn<T>>,
        options: ControlOptions,
    ) -> Self {
        let sync_errors =
            run_sync_validators(&initial_value, &validators, options.run_all_sync_validators);
        let (validity, errors) = match sync_errors {
            Some(errors) => (Validity::Invalid, Some(errors)),
            None if async_validators.is_empty() => (Validity::Valid, None),
            None => (Validity::Pending, None),
        };

        Self {
            options,
            state: Arc::new(RwLock::new(ControlState {
                value: initial_value.clone(),
                initial_value,
                touched: false,
                dirty: false,
                submitted: false,
                validity,
                errors,
                generation: Generation(1),
                parent: None,
                listeners: Vec::new(),
            })),
            sync_validators: Arc::new(RwLock::new(validators)),
            async_validators: Arc::new(RwLock::new(async_validators)),
        }
    }

    /// Sets the value, marks the control dirty and re-runs the sync phase.
    /// If async validators apply and the sync phase passed, the control
    /// enters `Pending` under a fresh generation; await
    /// [`Control::validate_async`] to drive the batch.
    pub fn change(&self, value: T) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "changing control value")?;
            state.value = value;
            state.dirty = true;
        }
        self.revalidate()
    }

    /// [`Control::change`] followed by driving the async batch it issued.
    pub async fn change_async(&self, value: T) -> FormResult<()> {
        self.change(value)?;
        self.validate_async().await
    }

    /// Marks the control touched. Does not re-run validation.
    pub fn blur(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "blurring control")?;
            state.touched = true;
        }
        self.finish_commit(self.validity()?)
    }

    /// Restores the construction value, clears touched/dirty, discards any
    /// in-flight async run and re-validates, so a required-but-empty initial
    /// value correctly reports invalid again.
    pub fn reset(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "resetting control")?;
            state.value = state.initial_value.clone();
            state.touched = false;
            state.dirty = false;
        }
        self.revalidate()
    }

    pub fn set_validators(&self, validators: Vec<SyncValidatorFn<T>>) -> FormResult<()> {
        *write_lock(&self.sync_validators, "replacing sync validators")? = validators;
        self.revalidate()
    }

    pub fn add_validators(
        &self,
        validators: impl IntoIterator<Item = SyncValidatorFn<T>>,
    ) -> FormResult<()> {
        write_lock(&self.sync_validators, "adding sync validators")?.extend(validators);
        self.revalidate()
    }

    /// Removes validators by handle identity, then re-validates.
    pub fn remove_validators(&self, validators: &[SyncValidatorFn<T>]) -> FormResult<()> {
        {
            let mut current = write_lock(&self.sync_validators, "removing sync validators")?;
            current.retain(|existing| !validators.iter().any(|v| Arc::ptr_eq(existing, v)));
        }
        self.revalidate()
    }

    pub fn set_async_validators(&self, validators: Vec<AsyncValidatorFn<T>>) -> FormResult<()> {
        *write_lock(&self.async_validators, "replacing async validators")? = validators;
        self.revalidate()
    }

    pub fn add_async_validators(
        &self,
        validators: impl IntoIterator<Item = AsyncValidatorFn<T>>,
    ) -> FormResult<()> {
        write_lock(&self.async_validators, "adding async validators")?.extend(validators);
        self.revalidate()
    }

    pub fn remove_async_validators(&self, validators: &[AsyncValidatorFn<T>]) -> FormResult<()> {
        {
            let mut current = write_lock(&self.async_validators, "removing async validators")?;
            current.retain(|existing| !validators.iter().any(|v| Arc::ptr_eq(existing, v)));
        }
        self.revalidate()
    }

    /// Runs the async validator batch for the control's current generation
    /// and commits the union of its results, unless a newer change superseded
    /// the batch in the meantime. A validator rejection poisons the whole
    /// batch: nothing commits and the fault propagates to the caller.
    pub async fn validate_async(&self) -> FormResult<()> {
        let validators = read_lock(&self.async_validators, "reading async validators")?.clone();
        let (generation, value, pending) = {
            let state = read_lock(&self.state, "starting async validation")?;
            (
                state.generation,
                state.value.clone(),
                state.validity == Validity::Pending,
            )
        };
        if !pending || validators.is_empty() {
            return Ok(());
        }

        let batch = validators
            .iter()
            .map(|validator| validator(value.clone()))
            .collect::<Vec<_>>();
        let mut results = Vec::with_capacity(batch.len());
        for settled in join_all(batch).await {
            results.push(settled.map_err(FormError::ValidatorFault)?);
        }
        self.commit_async(generation, union_results(results))
    }

    /// Registers (or replaces) the parent group and refreshes its aggregate,
    /// so groups assembled after their children start out consistent.
    pub fn set_parent(&self, parent: GroupLink) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "registering control parent")?;
            state.parent = Some(parent.clone());
        }
        parent.refresh()
    }

    pub fn mark_submitted(&self) -> FormResult<()> {
        self.set_submitted(true)
    }

    pub fn mark_retracted(&self) -> FormResult<()> {
        self.set_submitted(false)
    }

    /// Registers a listener invoked after every committed state transition.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ControlSnapshot<T>) + Send + Sync + 'static,
    ) -> FormResult<()> {
        write_lock(&self.state, "subscribing to control")?
            .listeners
            .push(Arc::new(listener));
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<ControlSnapshot<T>> {
        let state = read_lock(&self.state, "creating control snapshot")?;
        Ok(snapshot_of(&state))
    }

    pub fn value(&self) -> FormResult<T> {
        Ok(read_lock(&self.state, "reading control value")?.value.clone())
    }

    pub fn validity(&self) -> FormResult<Validity> {
        Ok(read_lock(&self.state, "reading control validity")?.validity)
    }

    pub fn errors(&self) -> FormResult<Option<ErrorMap>> {
        Ok(read_lock(&self.state, "reading control errors")?
            .errors
            .clone())
    }

    pub fn is_touched(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched flag")?.touched)
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading dirty flag")?.dirty)
    }

    pub fn is_submitted(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submitted flag")?.submitted)
    }

    /// Resolved error message for display, or `None` while the control is
    /// pristine and unsubmitted. Errors are never dropped from state, only
    /// from display.
    pub fn display_error(&self, overrides: Option<&MessageTable>) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error")?;
        if !(state.touched || state.submitted) {
            return Ok(None);
        }
        Ok(state
            .errors
            .as_ref()
            .map(|errors| resolve_message(errors, overrides)))
    }

    /// Type-erased handle for nesting this control into a group.
    pub fn as_node(&self) -> Box<dyn FormNode> {
        Box::new(self.clone())
    }

    /// Sync phase of the validation algorithm. Always supersedes any
    /// in-flight async batch: the old batch ran against a value or validator
    /// set that is no longer current.
    fn revalidate(&self) -> FormResult<()> {
        let run_all = self.options.run_all_sync_validators;
        let validators = read_lock(&self.sync_validators, "reading sync validators")?.clone();
        let has_async = !read_lock(&self.async_validators, "reading async validators")?.is_empty();
        let outcome = {
            let state = read_lock(&self.state, "reading value for validation")?;
            run_sync_validators(&state.value, &validators, run_all)
        };

        let previous = {
            let mut state = write_lock(&self.state, "committing sync validation")?;
            state.generation = state.generation.next();
            let previous = state.validity;
            match outcome {
                Some(errors) => {
                    state.errors = Some(errors);
                    state.validity = Validity::Invalid;
                }
                None if has_async => {
                    state.errors = None;
                    state.validity = Validity::Pending;
                }
                None => {
                    state.errors = None;
                    state.validity = Validity::Valid;
                }
            }
            previous
        };
        self.finish_commit(previous)
    }

    fn commit_async(&self, generation: Generation, union: Option<ErrorMap>) -> FormResult<()> {
        let previous = {
            let mut state = write_lock(&self.state, "committing async validation")?;
            if state.generation != generation {
                trace!(
                    "discarding async result of superseded generation {}",
                    generation.0
                );
                return Ok(());
            }
            let previous = state.validity;
            state.validity = if union.is_none() {
                Validity::Valid
            } else {
                Validity::Invalid
            };
            state.errors = union;
            previous
        };
        self.finish_commit(previous)
    }

    fn set_submitted(&self, submitted: bool) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "updating submitted flag")?;
            state.submitted = submitted;
        }
        self.finish_commit(self.validity()?)
    }

    /// Notifies subscribers of the committed state and, on a validity
    /// transition, triggers the parent's aggregate recomputation. Locks are
    /// released before either notification, so listeners and parents may call
    /// back into this control.
    fn finish_commit(&self, previous: Validity) -> FormResult<()> {
        let (snapshot, parent, listeners) = {
            let state = read_lock(&self.state, "reading committed control state")?;
            (snapshot_of(&state), state.parent.clone(), state.listeners.clone())
        };
        for listener in &listeners {
            listener(&snapshot);
        }
        if snapshot.validity != previous {
            debug!(
                "control validity {:?} -> {:?}",
                previous, snapshot.validity
            );
            if let Some(parent) = parent {
                parent.refresh()?;
            }
        }
        Ok(())
    }
}

fn snapshot_of<T: Clone>(state: &ControlState<T>) -> ControlSnapshot<T> {
    ControlSnapshot {
        value: state.value.clone(),
        validity: state.validity,
        errors: state.errors.clone(),
        touched: state.touched,
        dirty: state.dirty,
        submitted: state.submitted,
    }
}

impl<T> FormNode for Control<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn validity(&self) -> FormResult<Validity> {
        Control::validity(self)
    }

    fn is_submitted(&self) -> FormResult<bool> {
        Control::is_submitted(self)
    }

    fn mark_submitted(&self) -> FormResult<()> {
        Control::mark_submitted(self)
    }

    fn mark_retracted(&self) -> FormResult<()> {
        Control::mark_retracted(self)
    }

    fn set_parent(&self, parent: GroupLink) -> FormResult<()> {
        Control::set_parent(self, parent)
    }
}
