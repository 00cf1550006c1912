use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use log::debug;

use crate::error::{FormResult, read_lock, write_lock};
use crate::node::{FormNode, Validity};

/// Consistent read of a group's state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupSnapshot {
    pub validity: Validity,
    pub submitted: bool,
}

type GroupListener = Arc<dyn Fn(GroupSnapshot) + Send + Sync>;

struct GroupState {
    validity: Validity,
    submitted: bool,
    parent: Option<GroupLink>,
    listeners: Vec<GroupListener>,
}

struct GroupInner {
    // Membership is fixed at construction, so the children live outside the
    // state lock.
    children: BTreeMap<&'static str, Box<dyn FormNode>>,
    state: RwLock<GroupState>,
}

/// Weak upward handle held by children. Upgrading fails once the group is
/// discarded, at which point propagation simply stops.
#[derive(Clone)]
pub struct GroupLink(Weak<GroupInner>);

impl GroupLink {
    /// Recomputes the linked group's aggregate, if the group is still alive.
    pub(crate) fn refresh(&self) -> FormResult<()> {
        match self.0.upgrade() {
            Some(inner) => ControlGroup { inner }.update_validity(),
            None => Ok(()),
        }
    }
}

/// Composite validation node: a fixed mapping of named children, each a
/// [`crate::Control`] or a nested `ControlGroup`, aggregated under the
/// tri-state AND rule. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ControlGroup {
    inner: Arc<GroupInner>,
}

impl ControlGroup {
    /// Builds the group bottom-up: the completed child set is wired (every
    /// child gets this group as parent) and the first aggregate is computed
    /// before the group is returned, so its validity never reflects a stale
    /// default.
    pub fn new(
        children: impl IntoIterator<Item = (&'static str, Box<dyn FormNode>)>,
    ) -> FormResult<Self> {
        let group = Self {
            inner: Arc::new(GroupInner {
                children: children.into_iter().collect(),
                state: RwLock::new(GroupState {
                    validity: Validity::Valid,
                    submitted: false,
                    parent: None,
                    listeners: Vec::new(),
                }),
            }),
        };
        for child in group.inner.children.values() {
            child.set_parent(group.link())?;
        }
        group.update_validity()?;
        Ok(group)
    }

    /// Recomputes the aggregate: `Invalid` if any child is invalid, else
    /// `Pending` if any child is pending, else `Valid`. On a transition the
    /// group's own parent is refreshed in turn, rippling level by level.
    pub fn update_validity(&self) -> FormResult<()> {
        let mut validity = Validity::Valid;
        for child in self.inner.children.values() {
            match child.validity()? {
                Validity::Invalid => {
                    validity = Validity::Invalid;
                    break;
                }
                Validity::Pending => validity = Validity::Pending,
                Validity::Valid => {}
            }
        }

        let (changed, snapshot, parent, listeners) = {
            let mut state = write_lock(&self.inner.state, "updating group validity")?;
            let changed = state.validity != validity;
            state.validity = validity;
            (
                changed,
                GroupSnapshot {
                    validity,
                    submitted: state.submitted,
                },
                state.parent.clone(),
                state.listeners.clone(),
            )
        };
        if changed {
            debug!("group validity -> {validity:?}");
            for listener in &listeners {
                listener(snapshot);
            }
            if let Some(parent) = parent {
                parent.refresh()?;
            }
        }
        Ok(())
    }

    /// Marks this group and every descendant, leaf or group, as submitted.
    pub fn mark_submitted(&self) -> FormResult<()> {
        self.set_submitted(true)
    }

    /// Clears the submitted flag on this group and every descendant.
    pub fn mark_retracted(&self) -> FormResult<()> {
        self.set_submitted(false)
    }

    pub fn set_parent(&self, parent: GroupLink) -> FormResult<()> {
        {
            let mut state = write_lock(&self.inner.state, "registering group parent")?;
            state.parent = Some(parent.clone());
        }
        parent.refresh()
    }

    /// Registers a listener invoked after every committed state transition.
    pub fn subscribe(
        &self,
        listener: impl Fn(GroupSnapshot) + Send + Sync + 'static,
    ) -> FormResult<()> {
        write_lock(&self.inner.state, "subscribing to group")?
            .listeners
            .push(Arc::new(listener));
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<GroupSnapshot> {
        let state = read_lock(&self.inner.state, "creating group snapshot")?;
        Ok(GroupSnapshot {
            validity: state.validity,
            submitted: state.submitted,
        })
    }

    pub fn validity(&self) -> FormResult<Validity> {
        Ok(read_lock(&self.inner.state, "reading group validity")?.validity)
    }

    pub fn is_submitted(&self) -> FormResult<bool> {
        Ok(read_lock(&self.inner.state, "reading group submitted flag")?.submitted)
    }

    pub fn child_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inner.children.keys().copied()
    }

    pub fn child_validity(&self, name: &str) -> FormResult<Option<Validity>> {
        match self.inner.children.get(name) {
            Some(child) => Ok(Some(child.validity()?)),
            None => Ok(None),
        }
    }

    /// Type-erased handle for nesting this group into an enclosing group.
    pub fn as_node(&self) -> Box<dyn FormNode> {
        Box::new(self.clone())
    }

    /// Upward handle for registering this group as a node's parent.
    pub fn link(&self) -> GroupLink {
        GroupLink(Arc::downgrade(&self.inner))
    }

    fn set_submitted(&self, submitted: bool) -> FormResult<()> {
        debug!("cascading submitted={submitted} over group subtree");
        let (snapshot, listeners) = {
            let mut state = write_lock(&self.inner.state, "updating group submitted flag")?;
            state.submitted = submitted;
            (
                GroupSnapshot {
                    validity: state.validity,
                    submitted,
                },
                state.listeners.clone(),
            )
        };
        for child in self.inner.children.values() {
            if submitted {
                child.mark_submitted()?;
            } else {
                child.mark_retracted()?;
            }
        }
        for listener in &listeners {
            listener(snapshot);
        }
        Ok(())
    }
}

impl FormNode for ControlGroup {
    fn validity(&self) -> FormResult<Validity> {
        ControlGroup::validity(self)
    }

    fn is_submitted(&self) -> FormResult<bool> {
        ControlGroup::is_submitted(self)
    }

    fn mark_submitted(&self) -> FormResult<()> {
        ControlGroup::mark_submitted(self)
    }

    fn mark_retracted(&self) -> FormResult<()> {
        ControlGroup::mark_retracted(self)
    }

    fn set_parent(&self, parent: GroupLink) -> FormResult<()> {
        ControlGroup::set_parent(self, parent)
    }
}
