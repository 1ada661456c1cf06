use std::collections::BTreeSet;

use prop::option;
use proptest::collection::btree_set as prop_btree_set;
use proptest::prelude::*;

/// Produces strings that only contain alphanumeric characters.
///
/// This is handy for slugs, search terms and spec values that should
/// survive trimming and URL encoding unchanged.
pub fn alphanum_string(max_size: usize) -> impl Strategy<Value = String> {
    let ranges = vec!['a'..='z', 'A'..='Z', '0'..='9'];
    prop::collection::vec(
        proptest::char::ranges(std::borrow::Cow::Owned(ranges)),
        1..=max_size,
    )
    .prop_map(|v| v.into_iter().collect())
}

/// Produces `Option<String>` instances with limited sizes for performance
/// reasons.
pub fn optional_string(string_max_size: usize) -> impl Strategy<Value = Option<String>> {
    option::of(alphanum_string(string_max_size))
}

/// Produces sets of strings that only contain alphanumeric characters.
pub fn btree_set(key_max_size: usize, max_keys: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop_btree_set(alphanum_string(key_max_size), 0..max_keys)
}

/// Produces strings padded with spaces and tabs on either side.
pub fn padded_string(max_size: usize) -> impl Strategy<Value = (String, String)> {
    ("[ \t]{0,3}", alphanum_string(max_size), "[ \t]{0,3}")
        .prop_map(|(before, inner, after)| (format!("{before}{inner}{after}"), inner))
}
