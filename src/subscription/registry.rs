// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic-keyed observer registry.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{Observer, SubscriptionId};
use crate::error::Error;
use crate::protocol::Payload;

struct Registration {
    id: SubscriptionId,
    observer: Arc<dyn Observer>,
}

/// Registry mapping topics to ordered lists of observers.
///
/// Registration order is dispatch order. The registry does not deduplicate:
/// registering the same observer twice on a topic delivers every message to
/// it twice.
///
/// # Thread Safety
///
/// The observer map is behind a `parking_lot::RwLock`. Dispatch only takes
/// the read lock long enough to clone the topic's observer list, so
/// dispatches on different topics never wait on each other, and observers
/// run without any map lock held.
///
/// A separate gate lock implements shutdown: every dispatch holds it shared,
/// and [`shutdown`](Self::shutdown) takes it exclusively. Once shutdown
/// returns, all in-flight dispatches have finished and no further dispatch
/// invokes an observer.
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    topics: RwLock<HashMap<String, Vec<Registration>>>,
    closed: RwLock<bool>,
}

impl SubscriptionRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            topics: RwLock::new(HashMap::new()),
            closed: RwLock::new(false),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Appends an observer to the topic's list.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShutDown` once the registry has been shut down.
    pub fn register(
        &self,
        topic: impl Into<String>,
        observer: Arc<dyn Observer>,
    ) -> crate::Result<SubscriptionId> {
        let closed = self.closed.read_recursive();
        if *closed {
            return Err(Error::ShutDown);
        }

        let topic = topic.into();
        let id = self.next_id();
        tracing::trace!(topic = %topic, subscription = %id, "Registering observer");
        self.topics
            .write()
            .entry(topic)
            .or_default()
            .push(Registration { id, observer });
        Ok(id)
    }

    /// Removes a registration.
    ///
    /// Returns `true` if the registration existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let mut found = false;
        topics.retain(|_, registrations| {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            found |= registrations.len() != before;
            !registrations.is_empty()
        });
        found
    }

    /// Delivers a payload to every observer of `topic`, in registration order.
    ///
    /// An observer that returns an error or panics is logged and skipped;
    /// the remaining observers still receive the payload. A topic without
    /// observers is a no-op.
    ///
    /// Returns the number of observers that handled the payload successfully.
    pub fn dispatch(&self, topic: &str, payload: &Payload) -> usize {
        let closed = self.closed.read_recursive();
        if *closed {
            tracing::trace!(topic = %topic, "Registry shut down, dropping message");
            return 0;
        }

        let observers: Vec<(SubscriptionId, Arc<dyn Observer>)> = {
            let topics = self.topics.read();
            match topics.get(topic) {
                Some(registrations) => registrations
                    .iter()
                    .map(|r| (r.id, Arc::clone(&r.observer)))
                    .collect(),
                None => {
                    tracing::debug!(topic = %topic, "No observer for topic, dropping message");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_message(topic, payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        topic = %topic,
                        subscription = %id,
                        error = %e,
                        "Observer failed to handle message"
                    );
                }
                Err(panic) => {
                    tracing::warn!(
                        topic = %topic,
                        subscription = %id,
                        panic = %panic_message(panic.as_ref()),
                        "Observer panicked while handling message"
                    );
                }
            }
        }

        drop(closed);
        delivered
    }

    /// Waits for in-flight dispatches, then removes every observer and
    /// refuses further registrations and dispatches.
    ///
    /// Must not be called from inside an observer.
    pub fn shutdown(&self) {
        let mut closed = self.closed.write();
        *closed = true;
        let removed = {
            let mut topics = self.topics.write();
            let count = topics.values().map(Vec::len).sum::<usize>();
            topics.clear();
            count
        };
        tracing::debug!(observers = removed, "Subscription registry shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.closed.read_recursive()
    }

    /// Returns the number of topics with at least one observer.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Returns the number of observers registered on `topic`.
    #[must_use]
    pub fn observer_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &self.topic_count())
            .field("closed", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
