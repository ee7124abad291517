// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration and the device manager.
//!
//! The [`DeviceManager`] is the entry point for applications that run a set
//! of thermostats on one broker connection. It provides:
//!
//! - **Device management**: add and remove thermostats by configuration
//! - **Inbound delivery**: a background task feeds broker messages to the relay
//! - **State tracking**: query or watch each thermostat's state
//! - **Event system**: lifecycle and state change events on a broadcast channel
//!
//! # Examples
//!
//! ## Loading a configuration
//!
//! ```no_run
//! use nestor_lib::manager::{BridgeConfig, DeviceManager};
//!
//! #[tokio::main]
//! async fn main() -> nestor_lib::Result<()> {
//!     let config = BridgeConfig::from_file("bridge.json")?;
//!     let manager = DeviceManager::connect(&config).await?;
//!
//!     for serial in manager.serials().await {
//!         println!("{serial}: {:?}", manager.get_state(&serial).await);
//!     }
//!
//!     manager.shutdown().await
//! }
//! ```
//!
//! ## Watching one thermostat
//!
//! ```no_run
//! use nestor_lib::manager::{BridgeConfig, DeviceConfig, DeviceManager};
//! use nestor_lib::types::DeviceSerial;
//!
//! # async fn example() -> nestor_lib::Result<()> {
//! let config = BridgeConfig::new("broker")
//!     .with_device(DeviceConfig::new("Hallway", "02AA01AB"));
//! let manager = DeviceManager::connect(&config).await?;
//!
//! let serial = DeviceSerial::new("02AA01AB")?;
//! if let Some(mut state_rx) = manager.watch_device(&serial).await {
//!     tokio::spawn(async move {
//!         while state_rx.changed().await.is_ok() {
//!             let state = state_rx.borrow();
//!             println!("Current action: {}", state.hvac_action());
//!         }
//!     });
//! }
//! # Ok(())
//! # }
//! ```

mod device_config;
mod device_manager;

pub use device_config::{BridgeConfig, DEFAULT_MQTT_PORT, DeviceConfig, SERIAL_LENGTH};
pub use device_manager::DeviceManager;
