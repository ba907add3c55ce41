//! Read-only view over the session's collections.

use chrono::{DateTime, Duration, Utc};

use super::{ConversationEntry, GeneratedImage};

/// Borrowed view of the current session state.
///
/// Built on demand by the store; owns nothing. Callers that need isolation
/// (e.g. exports that outlive the borrow) clone the slices themselves.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot<'a> {
    /// Conversation entries in insertion order.
    pub conversation_history: &'a [ConversationEntry],
    /// Images in insertion order.
    pub image_gallery: &'a [GeneratedImage],
}

impl<'a> SessionSnapshot<'a> {
    pub const fn new(
        conversation_history: &'a [ConversationEntry],
        image_gallery: &'a [GeneratedImage],
    ) -> Self {
        Self {
            conversation_history,
            image_gallery,
        }
    }

    /// Total number of items across both collections.
    pub const fn total_count(&self) -> usize {
        self.conversation_history.len() + self.image_gallery.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Earliest timestamp across both collections.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps().min()
    }

    /// Latest timestamp across both collections.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps().max()
    }

    /// Span between the first and last item.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.last_timestamp()? - self.first_timestamp()?)
    }

    fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + 'a {
        self.conversation_history
            .iter()
            .map(|e| e.timestamp)
            .chain(self.image_gallery.iter().map(|i| i.timestamp))
    }
}

/// Human-readable session duration, e.g. "1h 05m" or "12 minutes".
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    if minutes < 1 {
        return "less than a minute".to_string();
    }
    if minutes < 60 {
        return if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        };
    }
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn entry_at(ts: DateTime<Utc>) -> ConversationEntry {
        let mut e = ConversationEntry::new("q".into(), "r".into(), BTreeMap::new());
        e.timestamp = ts;
        e
    }

    #[test]
    fn empty_snapshot_has_no_bounds() {
        let snap = SessionSnapshot::new(&[], &[]);
        assert!(snap.is_empty());
        assert_eq!(snap.first_timestamp(), None);
        assert_eq!(snap.duration(), None);
    }

    #[test]
    fn duration_spans_both_collections() {
        let start = Utc::now();
        let entries = vec![entry_at(start), entry_at(start + Duration::minutes(10))];
        let mut image = GeneratedImage::new("AAAA".into(), "p".into(), "s".into(), None, false);
        image.timestamp = start + Duration::minutes(75);
        let images = vec![image];

        let snap = SessionSnapshot::new(&entries, &images);
        assert_eq!(snap.total_count(), 3);
        assert_eq!(snap.duration(), Some(Duration::minutes(75)));
        assert_eq!(format_duration(Duration::minutes(75)), "1h 15m");
    }

    #[test]
    fn formats_short_durations() {
        assert_eq!(format_duration(Duration::seconds(20)), "less than a minute");
        assert_eq!(format_duration(Duration::minutes(1)), "1 minute");
        assert_eq!(format_duration(Duration::minutes(12)), "12 minutes");
    }
}
