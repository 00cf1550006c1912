use std::sync::OnceLock;

use regex::Regex;

use crate::error_map::{EMAIL, ErrorMap, REQUIRED};
use crate::validator::{SyncValidatorFn, sync_validator};

/// Emptiness as seen by [`required`]: absent options, whitespace-only strings
/// and empty sequences all count as blank.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Blank for &str {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<B: Blank> Blank for Option<B> {
    fn is_blank(&self) -> bool {
        match self {
            None => true,
            Some(inner) => inner.is_blank(),
        }
    }
}

impl<V> Blank for Vec<V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// Fails with `{required}` when the value is blank.
pub fn required<T>() -> SyncValidatorFn<T>
where
    T: Blank + 'static,
{
    sync_validator(|value: &T| value.is_blank().then(|| ErrorMap::flag(REQUIRED)))
}

/// Passes on blank values (presence is [`required`]'s job); otherwise fails
/// with `{email}` unless the value is a plausible address: local part up to
/// 64 characters, 254 characters overall, domain labels of 1-63
/// alphanumeric-or-hyphen characters not starting or ending with a hyphen.
pub fn email<T>() -> SyncValidatorFn<T>
where
    T: AsRef<str> + 'static,
{
    sync_validator(|value: &T| {
        let text = value.as_ref();
        if text.trim().is_empty() {
            return None;
        }
        (!is_valid_email(text)).then(|| ErrorMap::flag(EMAIL))
    })
}

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
        )
        .expect("email pattern is a valid regex")
    })
}

fn is_valid_email(text: &str) -> bool {
    // Length bounds first; the pattern itself is length-agnostic.
    if text.len() > 254 {
        return false;
    }
    match text.find('@') {
        Some(at) if (1..=64).contains(&at) => {}
        _ => return false,
    }
    email_pattern().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_bounds_are_enforced() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@-example.com"));

        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(!is_valid_email(&long_local));
        let max_local = format!("{}@example.com", "a".repeat(64));
        assert!(is_valid_email(&max_local));

        let long_total = format!("user@{}.com", "a".repeat(250));
        assert!(!is_valid_email(&long_total));

        let long_label = format!("user@{}.com", "a".repeat(64));
        assert!(!is_valid_email(&long_label));
        let max_label = format!("user@{}.com", "a".repeat(63));
        assert!(is_valid_email(&max_label));
    }
}
