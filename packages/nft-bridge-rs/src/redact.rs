//! Secret redaction for signing keys, API keys and database URLs.
//!
//! Config structs hand-write `Debug` and wrap each secret field in
//! [`Redacted`], so a `{:?}` of any config never leaks credentials.

use std::fmt::{self, Debug, Display};

/// Wrapper that prints `"<redacted>"` instead of its inner value.
///
/// ```
/// use nft_bridge_rs::redact::Redacted;
///
/// let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// assert_eq!(format!("{}", Redacted(key)), "<redacted>");
/// ```
#[derive(Clone, Copy)]
pub struct Redacted<T>(pub T);

const MASK: &str = "<redacted>";

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_value() {
        let key = Redacted("super-secret");
        assert_eq!(format!("{:?}", key), "<redacted>");
        assert_eq!(key.to_string(), "<redacted>");
    }

    #[test]
    fn test_optional_secret_keeps_presence() {
        let key = Some("super-secret".to_string());
        assert_eq!(format!("{:?}", key.as_ref().map(Redacted)), "Some(<redacted>)");

        let absent: Option<String> = None;
        assert_eq!(format!("{:?}", absent.as_ref().map(Redacted)), "None");
    }
}
