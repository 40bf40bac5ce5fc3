//! Capability token escaping
//!
//! Tokens reach us either raw or already percent-encoded (copied from a
//! browser URL). Encoding an encoded token turns `%2B` into `%252B` and the
//! remote rejects it, so a token is encoded at most once.

use std::borrow::Cow;

/// Percent-encode `token` unless it is already safe to place in a query string.
///
/// A token made only of unreserved characters and well-formed `%XX` escapes is
/// returned unchanged; anything else is encoded with [`urlencoding::encode`].
pub fn escape_token_once(token: &str) -> Cow<'_, str> {
    if is_query_safe(token) {
        Cow::Borrowed(token)
    } else {
        urlencoding::encode(token)
    }
}

fn is_query_safe(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = bytes.get(i + 1..i + 3);
                match escape {
                    Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                    _ => return false,
                }
            }
            b if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') => i += 1,
            _ => return false,
        }
    }

    true
}
