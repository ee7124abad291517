// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for unit tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::{DeliveryHint, Transport};
use crate::error::ProtocolError;

#[derive(Default)]
struct Recorded {
    published: Mutex<Vec<(String, String, DeliveryHint)>>,
    subscriptions: Mutex<BTreeSet<String>>,
    fail_publishes: AtomicBool,
    publish_attempts: AtomicU32,
    closed: AtomicBool,
}

/// Records every request instead of talking to a broker.
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    inner: Arc<Recorded>,
}

impl RecordingTransport {
    pub(crate) fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn published(&self) -> Vec<(String, String)> {
        self.inner
            .published
            .lock()
            .iter()
            .map(|(t, p, _)| (t.clone(), p.clone()))
            .collect()
    }

    pub(crate) fn deliveries(&self) -> Vec<DeliveryHint> {
        self.inner.published.lock().iter().map(|(_, _, d)| *d).collect()
    }

    pub(crate) fn publish_attempts(&self) -> u32 {
        self.inner.publish_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> BTreeSet<String> {
        self.inner.subscriptions.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner.subscriptions.lock().insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner.subscriptions.lock().remove(topic);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: String,
        delivery: DeliveryHint,
    ) -> Result<(), ProtocolError> {
        self.inner.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_publishes.load(Ordering::SeqCst) {
            return Err(ProtocolError::NotConnected);
        }
        self.inner
            .published
            .lock()
            .push((topic.to_string(), payload, delivery));
        Ok(())
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
