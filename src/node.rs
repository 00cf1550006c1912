use crate::error::FormResult;
use crate::group::GroupLink;

/// Tri-state validity of a node. `Pending` means the outcome depends on an
/// in-flight asynchronous validation batch for the current value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Validity {
    Valid,
    Invalid,
    Pending,
}

impl Validity {
    pub fn is_valid(self) -> bool {
        self == Validity::Valid
    }

    pub fn is_pending(self) -> bool {
        self == Validity::Pending
    }
}

/// Object-safe surface shared by [`crate::Control`] and
/// [`crate::ControlGroup`]: what a parent group needs from its children.
pub trait FormNode: Send + Sync {
    fn validity(&self) -> FormResult<Validity>;

    fn is_submitted(&self) -> FormResult<bool>;

    fn mark_submitted(&self) -> FormResult<()>;

    fn mark_retracted(&self) -> FormResult<()>;

    /// Registers (or replaces) the parent group and informs it of this node's
    /// current validity.
    fn set_parent(&self, parent: GroupLink) -> FormResult<()>;
}
