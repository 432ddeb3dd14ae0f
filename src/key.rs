//! Fingerprint composer (component H).
//!
//! Pure function combining a window identifier with client, resource and
//! rule identifiers into the counter key that every store variant keys its
//! counters on.

use crate::window::Window;

/// A composed counter key, `W_client_resource_rule`.
///
/// No escaping is performed (spec.md §3, §4.8): callers guarantee the
/// component identifiers contain no `_`, or accept that distinct inputs may
/// alias to the same key. This is a documented limitation, not a bug.
pub type Key = String;

/// Composes a counter key from its four components.
///
/// Injective as long as none of `client_id`, `resource_id`, `rule_id`
/// contain the `_` separator (spec.md §8 round-trip law).
pub fn make_key(window: &str, client_id: &str, resource_id: &str, rule_id: &str) -> Key {
    format!("{window}_{client_id}_{resource_id}_{rule_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_the_four_parts_in_order() {
        let k = make_key("12:00:00", "dp1", "api/call1", "cr1");
        assert_eq!(k, "12:00:00_dp1_api/call1_cr1");
    }

    #[test]
    fn injective_when_inputs_contain_no_separator() {
        let a = make_key("w", "client-a", "res", "rule");
        let b = make_key("w", "client-b", "res", "rule");
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_windows_yield_distinct_keys() {
        let a = make_key("12:00:00", "c", "r", "rule");
        let b = make_key("12:00:10", "c", "r", "rule");
        assert_ne!(a, b);
    }
}
