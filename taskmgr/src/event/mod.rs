//! Events are the unit of work delivered to a [`Task`].
//!
//! An event carries matching metadata (`sender`, `type`, `tag`), an attribute
//! bitset, and a one-shot action. Once sent, the task owns the event until it
//! is either dispatched (the action consumes it) or purged (it is dropped).

use crate::task::Task;
use bitflags::bitflags;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Application-defined event kind.
pub type EventType = u32;

/// One-shot action invoked when an event is dispatched. It receives the task
/// the event was delivered to and the event itself, and is responsible for
/// whatever the event carries.
pub type Action = Box<dyn FnOnce(&Task, Event) + Send + 'static>;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct EventAttrs: u32 {
        /// The event is exempt from every purge operation.
        const NO_PURGE = 1;
    }
}

/// Opaque sender identity. Only ever compared, never dereferenced.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Sender(usize);

impl Sender {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Identity derived from the address of `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self((value as *const T).cast::<()>() as usize)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Opaque free-form tag. Only ever compared, never dereferenced.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Tag(usize);

impl Tag {
    /// Tag carried by events that were never given one.
    pub const NONE: Tag = Tag(0);

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Identity derived from the address of `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self((value as *const T).cast::<()>() as usize)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Unique identity of an event, assigned at construction. Used to target a
/// single queued event with [`Task::purge_event`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct EventId(NonZeroU64);

impl EventId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let Some(id) = NonZeroU64::new(id) else {
            Self::exhausted();
        };

        Self(id)
    }

    #[cold]
    fn exhausted() -> ! {
        panic!("failed to generate unique event ID: bitspace exhausted")
    }

    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub struct Event {
    id: EventId,
    sender: Sender,
    ty: EventType,
    tag: Tag,
    attrs: EventAttrs,

    // Taken exactly once, on dispatch.
    action: Option<Action>,
}

impl Event {
    pub fn new<F>(sender: Sender, ty: EventType, action: F) -> Self
    where
        F: FnOnce(&Task, Event) + Send + 'static,
    {
        Self {
            id: EventId::next(),
            sender,
            ty,
            tag: Tag::NONE,
            attrs: EventAttrs::empty(),
            action: Some(Box::new(action)),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_attrs(mut self, attrs: EventAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Shorthand for `with_attrs(attrs | NO_PURGE)`.
    pub fn no_purge(mut self) -> Self {
        self.attrs.insert(EventAttrs::NO_PURGE);
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn event_type(&self) -> EventType {
        self.ty
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn attrs(&self) -> EventAttrs {
        self.attrs
    }

    pub fn is_purgeable(&self) -> bool {
        !self.attrs.contains(EventAttrs::NO_PURGE)
    }

    /// Hands the event to its action. An event whose action was already taken
    /// is simply dropped.
    pub(crate) fn dispatch(mut self, task: &Task) {
        if let Some(action) = self.action.take() {
            action(task, self);
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .field("type", &self.ty)
            .field("tag", &self.tag)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::collections::HashSet;

    assert_impl_all!(Event: Send);
    assert_impl_all!(Sender: Send, Sync, Copy);
    assert_impl_all!(Tag: Send, Sync, Copy);

    #[test]
    fn test_event_ids_are_unique() {
        let ids = (0..64)
            .map(|_| Event::new(Sender::new(1), 1, |_, _| {}).id())
            .collect::<HashSet<_>>();

        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_event_builder() {
        let event = Event::new(Sender::new(3), 42, |_, _| {})
            .with_tag(Tag::new(9))
            .no_purge();

        assert_eq!(event.sender(), Sender::new(3));
        assert_eq!(event.event_type(), 42);
        assert_eq!(event.tag(), Tag::new(9));
        assert!(event.attrs().contains(EventAttrs::NO_PURGE));
        assert!(!event.is_purgeable());
    }

    #[test]
    fn test_default_tag_and_attrs() {
        let event = Event::new(Sender::new(1), 7, |_, _| {});
        assert_eq!(event.tag(), Tag::NONE);
        assert!(event.is_purgeable());
    }

    #[test]
    fn test_identity_from_address() {
        let a = 1u8;
        let b = 2u8;

        assert_eq!(Sender::of(&a), Sender::of(&a));
        assert_ne!(Sender::of(&a), Sender::of(&b));
        assert_eq!(Tag::of(&a).as_usize(), Sender::of(&a).as_usize());
    }
}
