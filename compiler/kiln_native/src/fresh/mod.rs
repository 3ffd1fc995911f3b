//! Fresh native names.
//!
//! Every build gets a C symbol (also its file stem) that nothing else in the
//! process has used. Names are derived from the definition's qualified name
//! by [`sanitize_symbol`], then bumped with [`freshen`] until free.
//!
//! Incrementing treats the name as an identifier with an optional numeric
//! suffix: `x` becomes `x0`, `x0` becomes `x1`, `x9` becomes `x10`. The
//! numeral strictly grows on every step, so the search terminates for any
//! finite set of used names.

use std::collections::HashSet;
use std::hash::BuildHasher;

/// The first name, starting at `base`, for which `is_used` is false.
///
/// `base` itself is returned when it is free.
pub fn freshen_with(base: &str, mut is_used: impl FnMut(&str) -> bool) -> String {
    let mut candidate = base.to_string();
    while is_used(&candidate) {
        candidate = increment(&candidate);
    }
    candidate
}

/// The first name, starting at `base`, that is not in `used`.
pub fn freshen<S: BuildHasher>(base: &str, used: &HashSet<String, S>) -> String {
    freshen_with(base, |name| used.contains(name))
}

/// The next name after `name` in increment order.
pub fn increment(name: &str) -> String {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(name.len(), |(i, _)| i);

    let (stem, digits) = name.split_at(digits_start);
    if digits.is_empty() {
        return format!("{name}0");
    }

    let mut bumped = digits.as_bytes().to_vec();
    for digit in bumped.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            return format!("{stem}{}", String::from_utf8_lossy(&bumped));
        }
    }
    // Carry out of the most significant digit: `9..9` becomes `10..0`.
    format!("{stem}1{}", String::from_utf8_lossy(&bumped))
}

/// A C identifier for `prefix` followed by the qualified name `id`.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and a leading digit gets a
/// `_` in front. Distinct ids may map to the same identifier; callers
/// [`freshen`] the result against the names already taken.
pub fn sanitize_symbol(prefix: &str, id: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + id.len() + 1);
    for c in prefix.chars().chain(id.chars()) {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
