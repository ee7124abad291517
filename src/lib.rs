// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `NestoR` Lib - keep Nest thermostat state in sync over MQTT.
//!
//! Thermostats running the No Longer Evil firmware report every field on
//! its own MQTT topic and accept changes on a matching `/set` topic. This
//! library mirrors each thermostat as a typed [`DeviceState`], derives what
//! the HVAC system is doing from it, and turns control requests into command
//! publishes.
//!
//! # Topics
//!
//! ```text
//! {prefix}/{serial}/device/current_temperature          measured temperature
//! {prefix}/{serial}/shared/target_temperature           single setpoint
//! {prefix}/{serial}/shared/target_temperature_low       heat-cool lower bound
//! {prefix}/{serial}/shared/target_temperature_high      heat-cool upper bound
//! {prefix}/{serial}/shared/target_temperature_type      mode: off|heat|cool|range
//! {prefix}/{serial}/device/fan_timer_active             fan running
//! {prefix}/{serial}/device/away                         away from home
//! {prefix}/{serial}/availability                        thermostat online
//! ```
//!
//! Commands go to the same topic with `/set` appended. The default prefix is
//! `nest`.
//!
//! # Components
//!
//! - [`protocol::TopicRouter`]: field to topic mapping
//! - [`subscription::SubscriptionRegistry`]: topic to observer dispatch
//! - [`protocol::MessageRelay`]: the only contact point with the transport
//! - [`device::Thermostat`]: the per-thermostat state machine
//! - [`manager::DeviceManager`]: configuration-driven glue for all of the above
//!
//! # Quick Start
//!
//! ```no_run
//! use nestor_lib::manager::{BridgeConfig, DeviceConfig, DeviceManager};
//! use nestor_lib::types::{DeviceSerial, HvacMode};
//! use nestor_lib::device::TemperatureRequest;
//!
//! #[tokio::main]
//! async fn main() -> nestor_lib::Result<()> {
//!     let config = BridgeConfig::new("192.168.1.50")
//!         .with_credentials("bridge", "secret")
//!         .with_device(DeviceConfig::new("Hallway", "02aa01ab"));
//!
//!     let manager = DeviceManager::connect(&config).await?;
//!     let serial = DeviceSerial::new("02AA01AB")?;
//!
//!     // Commands are fire-and-forget; state follows the thermostat's report
//!     manager.set_hvac_mode(&serial, HvacMode::HeatCool).await?;
//!     manager
//!         .set_temperature(&serial, TemperatureRequest::range(19.0, 24.0))
//!         .await?;
//!
//!     let mut events = manager.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Observing a topic directly
//!
//! Anything implementing [`Observer`] can be registered on the relay's
//! registry, including closures:
//!
//! ```
//! use std::sync::Arc;
//! use nestor_lib::protocol::Payload;
//! use nestor_lib::subscription::{Observer, SubscriptionRegistry};
//!
//! let registry = SubscriptionRegistry::new();
//! let observer: Arc<dyn Observer> = Arc::new(|topic: &str, payload: &Payload| -> nestor_lib::Result<()> {
//!     println!("{topic}: {payload}");
//!     Ok(())
//! });
//!
//! registry.register("nest/02AA01AB/availability", observer).unwrap();
//! let delivered = registry.dispatch("nest/02AA01AB/availability", &Payload::Bool(true));
//! assert_eq!(delivered, 1);
//! ```

pub mod device;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod types;

pub use device::{DeviceInfo, TemperatureRequest, Thermostat};
pub use error::{ConfigError, Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{DeviceEvent, EventBus};
pub use manager::{BridgeConfig, DeviceConfig, DeviceManager};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttBroker, MqttBrokerBuilder};
pub use protocol::{Field, MessageRelay, Payload, TopicRouter, Transport};
pub use state::{DeviceState, StateChange};
pub use subscription::{Observer, SubscriptionId, SubscriptionRegistry};
pub use types::{DeviceSerial, HvacAction, HvacMode, TemperatureUnit};
