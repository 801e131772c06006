//! Boolean-ish coercion for flag attributes such as `is_startup`.
//!
//! Flag columns were written by several forms over the years and hold
//! `true`, `"Yes"`, `"TRUE"`, `"1"` and friends. Every count that splits
//! on a flag goes through [`is_flagged`] so the call sites cannot drift.

use serde_json::Value;

/// True for boolean `true`, or for a string equal (ignoring ASCII case)
/// to `"yes"`, `"true"` or `"1"`. False for everything else, including
/// numbers, null and a missing column.
pub fn is_flagged(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true") || s == "1"
        }
        _ => false,
    }
}
