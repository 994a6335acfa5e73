use crate::event::{Event, EventType, Sender, Tag};
use std::ops::RangeInclusive;

/// Predicate selecting queued events for removal.
///
/// `None` for `sender` or `tag` is a wildcard. Events carrying
/// [`EventAttrs::NO_PURGE`](crate::event::EventAttrs::NO_PURGE) never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Filter {
    sender: Option<Sender>,
    types: RangeInclusive<EventType>,
    tag: Option<Tag>,
}

impl Filter {
    pub(crate) fn new(sender: Option<Sender>, ty: EventType, tag: Option<Tag>) -> Self {
        Self::range(sender, ty, ty, tag)
    }

    /// An inverted range (`first > last`) is empty and matches nothing.
    pub(crate) fn range(
        sender: Option<Sender>,
        first: EventType,
        last: EventType,
        tag: Option<Tag>,
    ) -> Self {
        Self {
            sender,
            types: first..=last,
            tag,
        }
    }

    pub(crate) fn matches(&self, event: &Event) -> bool {
        event.is_purgeable()
            && self.sender.is_none_or(|s| s == event.sender())
            && self.types.contains(&event.event_type())
            && self.tag.is_none_or(|t| t == event.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn event(sender: usize, ty: EventType, tag: usize) -> Event {
        Event::new(Sender::new(sender), ty, |_, _| {}).with_tag(Tag::new(tag))
    }

    #[rstest]
    #[case::exact(Filter::new(Some(Sender::new(2)), 4, Some(Tag::new(8))), true)]
    #[case::other_sender(Filter::new(Some(Sender::new(3)), 4, Some(Tag::new(8))), false)]
    #[case::any_sender(Filter::new(None, 4, Some(Tag::new(8))), true)]
    #[case::any_tag(Filter::new(Some(Sender::new(2)), 4, None), true)]
    #[case::other_type(Filter::new(None, 5, None), false)]
    #[case::in_range(Filter::range(None, 3, 4, None), true)]
    #[case::range_edge(Filter::range(None, 4, 9, None), true)]
    #[case::out_of_range(Filter::range(None, 5, 9, None), false)]
    #[case::inverted_range(Filter::range(None, 5, 3, None), false)]
    fn test_filter_matches(#[case] filter: Filter, #[case] expected: bool) {
        assert_eq!(filter.matches(&event(2, 4, 8)), expected);
    }

    #[test]
    fn test_filter_skips_no_purge() {
        let filter = Filter::new(None, 4, None);
        assert!(!filter.matches(&event(2, 4, 8).no_purge()));
    }

    #[test]
    fn test_untagged_event_matches_only_wildcard_or_none() {
        let untagged = Event::new(Sender::new(1), 4, |_, _| {});

        assert!(Filter::new(None, 4, None).matches(&untagged));
        assert!(Filter::new(None, 4, Some(Tag::NONE)).matches(&untagged));
        assert!(!Filter::new(None, 4, Some(Tag::new(8))).matches(&untagged));
    }
}
