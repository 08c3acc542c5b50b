//! Keyed one-shot hand-off between a paused caller and a later resolver.
//!
//! A caller opens (or joins) a slot for a key and waits until a deadline. Another
//! task resolves the slot with a value. Every waiter of that slot observes the same
//! value. A slot is resolved at most once: resolution removes it, so a second
//! attempt reports [`RendezvousError::NotPending`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RendezvousError {
    #[error("no pending rendezvous for this key")]
    NotPending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome<V> {
    Resolved(V),
    TimedOut,
    /// The slot was dropped without a value.
    Abandoned,
}

struct Slot<T, V> {
    sender: watch::Sender<Option<V>>,
    ticket: T,
    deadline: Instant,
}

/// Handle held by one paused caller.
#[derive(Debug)]
pub struct Waiter<T, V> {
    ticket: T,
    deadline: Instant,
    receiver: watch::Receiver<Option<V>>,
}

impl<T, V: Clone> Waiter<T, V> {
    pub fn ticket(&self) -> &T {
        &self.ticket
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub async fn wait(mut self) -> WaitOutcome<V> {
        let observed =
            tokio::time::timeout_at(self.deadline, self.receiver.wait_for(Option::is_some)).await;
        match observed {
            Ok(Ok(value)) => match value.as_ref() {
                Some(value) => WaitOutcome::Resolved(value.clone()),
                None => WaitOutcome::Abandoned,
            },
            Ok(Err(_closed)) => WaitOutcome::Abandoned,
            Err(_elapsed) => WaitOutcome::TimedOut,
        }
    }
}

#[derive(Debug)]
pub enum Registration<T, V> {
    /// This caller created the slot and owns the follow-up work for it.
    Opened(Waiter<T, V>),
    /// A slot already existed for the key; this caller shares its outcome.
    Joined(Waiter<T, V>),
}

impl<T, V> Registration<T, V> {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened(_))
    }

    pub fn into_waiter(self) -> Waiter<T, V> {
        match self {
            Self::Opened(waiter) | Self::Joined(waiter) => waiter,
        }
    }
}

pub struct Rendezvous<K, T, V> {
    slots: Mutex<HashMap<K, Slot<T, V>>>,
}

impl<K, T, V> Default for Rendezvous<K, T, V> {
    fn default() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }
}

impl<K, T, V> Rendezvous<K, T, V>
where
    K: Eq + Hash + Clone,
    T: Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<T, V>>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Joins the pending slot for `key`, or opens one carrying `ticket` with a
    /// deadline `timeout` from now. Check-and-insert happens under one lock.
    pub fn open_or_join(&self, key: K, ticket: T, timeout: Duration) -> Registration<T, V> {
        let mut slots = self.slots();
        if let Some(slot) = slots.get(&key) {
            return Registration::Joined(Waiter {
                ticket: slot.ticket.clone(),
                deadline: slot.deadline,
                receiver: slot.sender.subscribe(),
            });
        }

        let deadline = Instant::now() + timeout;
        let (sender, receiver) = watch::channel(None);
        slots.insert(key, Slot { sender, ticket: ticket.clone(), deadline });
        Registration::Opened(Waiter { ticket, deadline, receiver })
    }

    pub fn join(&self, key: &K) -> Option<Waiter<T, V>> {
        self.slots().get(key).map(|slot| Waiter {
            ticket: slot.ticket.clone(),
            deadline: slot.deadline,
            receiver: slot.sender.subscribe(),
        })
    }

    /// Hands `value` to every waiter of `key` and closes the slot. Returns the
    /// number of waiters still listening.
    pub fn resolve(&self, key: &K, value: V) -> Result<usize, RendezvousError> {
        let slot = self.slots().remove(key).ok_or(RendezvousError::NotPending)?;
        let listeners = slot.sender.receiver_count();
        slot.sender.send_replace(Some(value));
        Ok(listeners)
    }

    pub fn abandon(&self, key: &K) -> bool {
        self.slots().remove(key).is_some()
    }

    /// Drops every slot whose deadline has passed. Their waiters observe
    /// [`WaitOutcome::Abandoned`] if they are still listening. Returns how many
    /// slots were dropped.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| slot.deadline > now);
        before - slots.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.slots().contains_key(key)
    }

    pub fn ticket(&self, key: &K) -> Option<T> {
        self.slots().get(key).map(|slot| slot.ticket.clone())
    }

    pub fn pending(&self) -> Vec<(K, T)> {
        self.slots().iter().map(|(key, slot)| (key.clone(), slot.ticket.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}
