use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::input::InputEvent;

/// Where a subscription listens. Keyboard and bound actions are window-wide; pointer input is
/// delivered to whoever owns the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    Window,
    Viewport,
}

impl EventScope {
    pub fn of(event: &InputEvent) -> Self {
        if event.is_keyboard() {
            EventScope::Window
        } else {
            EventScope::Viewport
        }
    }
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventScope::Window => write!(f, "window"),
            EventScope::Viewport => write!(f, "viewport"),
        }
    }
}

type Mailbox = Rc<RefCell<VecDeque<InputEvent>>>;

struct Listener {
    scope: EventScope,
    mailbox: Weak<RefCell<VecDeque<InputEvent>>>,
}

/// Fan-out point for input. The hub only holds weak references, so dropping a
/// [`Subscription`] detaches it without any bookkeeping on the owner's side.
#[derive(Default)]
pub struct EventHub {
    listeners: Vec<Listener>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, scope: EventScope) -> Subscription {
        self.prune();
        let mailbox: Mailbox = Rc::new(RefCell::new(VecDeque::new()));
        self.listeners.push(Listener { scope, mailbox: Rc::downgrade(&mailbox) });
        Subscription { scope, mailbox: Some(mailbox) }
    }

    /// Delivers `event` to every live subscription of the matching scope. Returns the number of
    /// mailboxes that received it.
    pub fn publish(&mut self, event: &InputEvent) -> usize {
        let scope = EventScope::of(event);
        let mut delivered = 0;
        self.listeners.retain(|listener| match listener.mailbox.upgrade() {
            Some(mailbox) => {
                if listener.scope == scope {
                    mailbox.borrow_mut().push_back(event.clone());
                    delivered += 1;
                }
                true
            }
            None => false,
        });
        delivered
    }

    pub fn live_subscriptions(&self) -> usize {
        self.listeners.iter().filter(|listener| listener.mailbox.strong_count() > 0).count()
    }

    fn prune(&mut self) {
        self.listeners.retain(|listener| listener.mailbox.strong_count() > 0);
    }
}

/// Receiving end of an [`EventHub`] registration.
pub struct Subscription {
    scope: EventScope,
    mailbox: Option<Mailbox>,
}

impl Subscription {
    pub fn scope(&self) -> EventScope {
        self.scope
    }

    pub fn is_active(&self) -> bool {
        self.mailbox.is_some()
    }

    pub fn drain(&self) -> Vec<InputEvent> {
        match &self.mailbox {
            Some(mailbox) => mailbox.borrow_mut().drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Unsubscribes immediately; queued but undrained events are discarded.
    pub fn release(&mut self) {
        self.mailbox = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("scope", &self.scope).field("active", &self.is_active()).finish()
    }
}
