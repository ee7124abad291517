// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer trait and subscription identifiers.

use crate::protocol::Payload;

/// Receives decoded messages for the topics it is registered on.
///
/// Observers run on the transport's delivery task. They must not block and
/// must not call back into the registry's [`shutdown`].
///
/// Any `Fn(&str, &Payload) -> Result<()>` closure is an observer:
///
/// ```
/// use std::sync::Arc;
/// use nestor_lib::protocol::Payload;
/// use nestor_lib::subscription::SubscriptionRegistry;
///
/// let registry = SubscriptionRegistry::new();
/// registry
///     .register(
///         "nest/A/device/away",
///         Arc::new(|topic: &str, payload: &Payload| -> nestor_lib::Result<()> {
///             println!("{topic}: {payload}");
///             Ok(())
///         }),
///     )
///     .unwrap();
/// ```
///
/// [`shutdown`]: super::SubscriptionRegistry::shutdown
pub trait Observer: Send + Sync {
    /// Handles one message.
    ///
    /// # Errors
    ///
    /// An error is logged by the registry; it does not affect other
    /// observers of the same message.
    fn on_message(&self, topic: &str, payload: &Payload) -> crate::Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&str, &Payload) -> crate::Result<()> + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: &Payload) -> crate::Result<()> {
        self(topic, payload)
    }
}

/// Unique identifier for a registration.
///
/// Returned by [`SubscriptionRegistry::register`] and used to remove the
/// registration later. IDs are never reused within a registry.
///
/// [`SubscriptionRegistry::register`]: super::SubscriptionRegistry::register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_display() {
        assert_eq!(SubscriptionId::new(7).to_string(), "Sub(7)");
        assert_eq!(SubscriptionId::new(7).value(), 7);
    }

    #[test]
    fn closure_is_observer() {
        let observer = |_: &str, payload: &Payload| -> crate::Result<()> {
            assert_eq!(payload.as_text(), Some("on"));
            Ok(())
        };
        observer
            .on_message("t", &Payload::Text("on".to_string()))
            .unwrap();
    }
}
