//! Relaxed user-agent comparison.
//!
//! Some platforms mint a new installation when an app is added to the home
//! screen, and the new instance reports a slightly different user agent. Two
//! agents are treated as the same device family when they agree on the
//! platform part, i.e. everything up to the first `)`, or failing that,
//! everything up to the second `;` inside that part.

/// Byte offset of the second `;` in `s`, if any.
fn second_semicolon(s: &str) -> Option<usize> {
    let first = s.find(';')?;
    s[first + 1..].find(';').map(|i| first + 1 + i)
}

/// Check whether two user-agent strings describe the same device family.
///
/// Strings without a `)` must be identical.
pub fn is_similar_user_agent(a: &str, b: &str) -> bool {
    let (Some(a_close), Some(b_close)) = (a.find(')'), b.find(')')) else {
        return a == b;
    };

    let a_platform = &a[..a_close];
    let b_platform = &b[..b_close];
    if a_platform == b_platform {
        return true;
    }

    match (second_semicolon(a_platform), second_semicolon(b_platform)) {
        (Some(a_end), Some(b_end)) => a[..a_end] == b[..b_end],
        _ => false,
    }
}
