//! Slot naming.
//!
//! Each entry occupies its primary slot `<key>` and a shadow slot
//! `$$<key>_data` holding the type tag. Anything reading a storage area
//! directly has to skip shadow slots.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix of every shadow slot.
pub const SHADOW_PREFIX: &str = "$$";
/// Suffix of every shadow slot.
pub const SHADOW_SUFFIX: &str = "_data";

fn shadow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)^\$\$.*_data$").expect("shadow slot pattern is valid"))
}

/// The shadow slot holding the type tag for `key`.
#[must_use]
pub fn shadow_key(key: &str) -> String {
    format!("{SHADOW_PREFIX}{key}{SHADOW_SUFFIX}")
}

/// Returns true if `key` names a shadow slot.
#[must_use]
pub fn is_shadow_key(key: &str) -> bool {
    shadow_pattern().is_match(key)
}

/// The primary key a shadow slot belongs to.
#[must_use]
pub fn primary_key_of(shadow: &str) -> Option<&str> {
    if !is_shadow_key(shadow) {
        return None;
    }
    shadow
        .strip_prefix(SHADOW_PREFIX)?
        .strip_suffix(SHADOW_SUFFIX)
}
