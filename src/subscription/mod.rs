// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer registration and message fan-out.
//!
//! # Overview
//!
//! - [`Observer`] - A typed handler for decoded messages on one topic
//! - [`SubscriptionId`] - Identifier returned on registration, used to remove it
//! - [`SubscriptionRegistry`] - Topic to observers map with isolated dispatch
//!
//! Thermostats register themselves once per field topic when they are
//! attached. The [`MessageRelay`](crate::protocol::MessageRelay) dispatches
//! every decoded inbound message through the registry.

mod observer;
mod registry;

pub use observer::{Observer, SubscriptionId};
pub use registry::SubscriptionRegistry;
