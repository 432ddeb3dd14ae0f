//! Time-window keyer (component A).
//!
//! Maps the current wall-clock instant and a rule interval to a short,
//! human-readable window identifier that is identical on every node whose
//! clock agrees within one window.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// A window identifier: `HH:MM:SS` of the instant the current window opened.
///
/// Deliberately omits the date (see module docs on [`get_time_window`]) -
/// rule intervals are seconds to a few minutes, so the omission only
/// matters for events separated by exact multiples of 24h, which
/// [`crate::key::make_key`] callers are not expected to straddle.
pub type Window = String;

/// Greatest common divisor via the Euclidean algorithm.
fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Least common multiple of `a` and `b`.
fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

/// Returns the stable window identifier for `interval` seconds, evaluated at
/// the current wall-clock time.
///
/// Algorithm (spec.md §4.1):
/// 1. `u` = current wall-clock seconds since epoch.
/// 2. `L = lcm(60, interval)`, the outer alignment period - guarantees every
///    outer period starts on a minute boundary so windows stay
///    human-comparable even when `interval` doesn't divide 60 (e.g. 7s).
/// 3. `outer_start = u - (u mod L)`.
/// 4. `n = (u - outer_start) / interval`; `current = outer_start + n*interval`.
/// 5. Format `current` as `HH:MM:SS`.
///
/// Formats in UTC rather than the host's local timezone: two nodes whose
/// processes run under different `TZ` settings would otherwise derive
/// different window strings for the same instant, breaking the
/// no-coordination invariant this function exists to provide.
pub fn get_time_window(interval_secs: u64) -> Window {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs();
    get_time_window_at(now, interval_secs)
}

/// [`get_time_window`], parameterized on the current time - exposed for
/// deterministic tests.
pub fn get_time_window_at(now_secs: u64, interval_secs: u64) -> Window {
    assert!(interval_secs > 0, "window interval must be positive");

    let outer_period = lcm(60, interval_secs);
    let outer_start = now_secs - (now_secs % outer_period);
    let n = (now_secs - outer_start) / interval_secs;
    let current = outer_start + n * interval_secs;

    format_hms(current)
}

fn format_hms(epoch_secs: u64) -> String {
    let secs_of_day = epoch_secs % 86_400;
    let h = secs_of_day / 3600;
    let m = (secs_of_day % 3600) / 60;
    let s = secs_of_day % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
