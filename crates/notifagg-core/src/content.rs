use crate::EventType;

/// Display name used when the profile of the leading actor cannot be found.
pub const FALLBACK_NAME: &str = "Someone";

/// Compose the human-readable text of an aggregate notification.
///
/// `total_actors` is the number of distinct actors represented by the
/// aggregate, including the named one. Zero is treated as one.
///
/// ```
/// use notifagg_core::{compose_content, EventType};
///
/// assert_eq!(compose_content("Ada", 1, EventType::Like), "Ada liked your post");
/// assert_eq!(
///     compose_content("Ada", 3, EventType::Like),
///     "Ada and 2 others liked your post"
/// );
/// ```
pub fn compose_content(leading_name: &str, total_actors: u64, event_type: EventType) -> String {
    let others = total_actors.saturating_sub(1);
    match others {
        0 => format!("{} {}", leading_name, event_type.verb_phrase()),
        n => format!("{} and {} others {}", leading_name, n, event_type.verb_phrase()),
    }
}
