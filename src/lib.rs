pub mod control;
pub mod error;
pub mod error_map;
pub mod group;
pub mod messages;
pub mod node;
pub mod validator;
pub mod validators;


pub use control::{Control, ControlOptions, ControlSnapshot};
pub use error::{FormError, FormResult};
pub use error_map::{EMAIL, ErrorKey, ErrorMap, ErrorValue, REQUIRED};
pub use group::{ControlGroup, GroupLink, GroupSnapshot};
pub use messages::{DEFAULT_MESSAGE, MessageTable, resolve_message, resolve_messages};
pub use node::{FormNode, Validity};
pub use validator::{
    AsyncValidatorFn, BoxedValidationFuture, Generation, SyncValidatorFn, async_validator,
    sync_validator,
};
pub use validators::{Blank, email, required};
