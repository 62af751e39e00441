// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic container naming (spec.md §4.6 step 2).

/// Derive a stable container name from a repository full name and commit.
///
/// Filters `full_name` to `[A-Za-z_.-]`, mapping `/` to `_` and dropping
/// anything else, then appends `-<commit_id>`. Pure and idempotent: the
/// same inputs always produce the same name (spec.md §8).
#[must_use]
pub fn container_name(full_name: &str, commit_id: &str) -> String {
    let filtered: String = full_name
        .chars()
        .filter_map(|c| {
            if c == '/' {
                Some('_')
            } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    format!("{filtered}-{commit_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn maps_slash_and_drops_unsafe_characters() {
        assert_eq!(container_name("alice/proj", "abc123"), "alice_proj-abc123");
        assert_eq!(
            container_name("alice!/pr oj#1", "abc123"),
            "alice_proj1-abc123"
        );
    }

    #[test]
    fn is_pure_and_idempotent() {
        let a = container_name("alice/proj", "abc123");
        let b = container_name("alice/proj", "abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn matches_expected_suffix_pattern() {
        let name = container_name("alice/proj", "abc123");
        assert!(name.ends_with("-abc123"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()
            || c == '_'
            || c == '.'
            || c == '-'));
    }

    proptest! {
        /// Purity (spec.md §8): any `(full_name, commit_id)` pair always
        /// produces the same name, twice in a row.
        #[test]
        fn is_pure_for_arbitrary_inputs(full_name in ".{0,40}", commit_id in ".{0,40}") {
            let a = container_name(&full_name, &commit_id);
            let b = container_name(&full_name, &commit_id);
            prop_assert_eq!(a, b);
        }

        /// Output is always restricted to the allowed character set plus
        /// exactly one `-<commit_id>` suffix, regardless of what junk
        /// `full_name` contains.
        #[test]
        fn output_is_always_in_the_safe_character_set(full_name in ".{0,40}", commit_id in "[A-Za-z0-9]{0,40}") {
            let name = container_name(&full_name, &commit_id);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric()
                || c == '_'
                || c == '.'
                || c == '-'));
            prop_assert!(name.ends_with(&format!("-{commit_id}")));
        }
    }
}
