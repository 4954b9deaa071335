//! Status normalization onto the five canonical lifecycle values.
//!
//! Input is trimmed and lower-cased before lookup. Unknown values are
//! passed through untouched so the API can judge them.

pub const PENDING: &str = "pending";
pub const STARTED: &str = "started";
pub const COMPLETED: &str = "completed";
pub const FAILED: &str = "failed";
pub const ABORTED: &str = "aborted";

/// Canonical values, in lifecycle order.
pub const CANONICAL: [&str; 5] = [PENDING, STARTED, COMPLETED, FAILED, ABORTED];

const ALIASES: &[(&str, &str)] = &[
    ("queued", PENDING),
    ("scheduled", PENDING),
    ("in_progress", STARTED),
    ("init", STARTED),
    ("building", STARTED),
    ("deploying", STARTED),
    ("success", COMPLETED),
    ("complete", COMPLETED),
    ("finished", COMPLETED),
    ("built", COMPLETED),
    ("deployed", COMPLETED),
    ("fail", FAILED),
    ("failure", FAILED),
    ("error", FAILED),
    ("abort", ABORTED),
    ("cancelled", ABORTED),
    ("cancel", ABORTED),
    ("skipped", ABORTED),
];

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatus {
    pub value: String,
    /// `true` only when an alias was rewritten to a different canonical value.
    pub was_aliased: bool,
}

fn lookup(key: &str) -> Option<&'static str> {
    CANONICAL
        .iter()
        .copied()
        .find(|c| *c == key)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, canonical)| *canonical)
        })
}

/// Map `input` onto its canonical status.
///
/// ```
/// use versioner_core::status::normalize;
///
/// assert_eq!(normalize(" Success ").value, "completed");
/// assert_eq!(normalize("bogus").value, "bogus");
/// ```
pub fn normalize(input: &str) -> NormalizedStatus {
    let key = input.trim().to_lowercase();
    match lookup(&key) {
        Some(canonical) => NormalizedStatus {
            value: canonical.to_string(),
            was_aliased: key != canonical,
        },
        None => NormalizedStatus {
            value: input.to_string(),
            was_aliased: false,
        },
    }
}

/// Whether `input` is a canonical value or a known alias.
pub fn is_valid(input: &str) -> bool {
    lookup(&input.trim().to_lowercase()).is_some()
}

/// Canonical form of `input`, or `input` itself when unknown.
pub fn canonical(input: &str) -> String {
    normalize(input).value
}
