//! Translation of cross-context change records into session events.

use crate::events::EventName;
use crate::storage::{is_shadow_key, StorageChange};

/// Classifies a change made by another context.
///
/// Returns the event to fire and its key, or `None` when the change must be
/// ignored: key-less records (area cleared elsewhere), shadow-slot writes, and
/// records with neither an old nor a new value.
#[must_use]
pub fn classify(change: &StorageChange) -> Option<(EventName, &str)> {
    let key = change.key.as_deref()?;
    if is_shadow_key(key) {
        return None;
    }
    let event = match (&change.old_value, &change.new_value) {
        (None, Some(_)) => EventName::Init,
        (Some(_), Some(_)) => EventName::Set,
        (Some(_), None) => EventName::Remove,
        (None, None) => return None,
    };
    Some((event, key))
}
