// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for running several thermostats on one connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::device::{TemperatureRequest, Thermostat};
use crate::error::Error;
use crate::event::{DeviceEvent, EventBus};
use crate::protocol::{InboundMessage, MessageRelay, TopicRouter, Transport};
use crate::state::DeviceState;
use crate::subscription::SubscriptionRegistry;
use crate::types::{DeviceSerial, HvacMode};

use super::device_config::{BridgeConfig, DeviceConfig};

/// Manager for the thermostats sharing one transport.
///
/// The manager owns the [`MessageRelay`] and its registry, attaches a
/// [`Thermostat`] per configured device, subscribes the device topics on the
/// transport, and forwards host commands by serial.
///
/// # Examples
///
/// ```no_run
/// use nestor_lib::manager::{BridgeConfig, DeviceConfig, DeviceManager};
/// use nestor_lib::types::{DeviceSerial, HvacMode};
///
/// #[tokio::main]
/// async fn main() -> nestor_lib::Result<()> {
///     let config = BridgeConfig::new("192.168.1.50")
///         .with_device(DeviceConfig::new("Hallway", "02AA01AB"));
///
///     let manager = DeviceManager::connect(&config).await?;
///
///     // Subscribe to events
///     let mut events = manager.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     let serial = DeviceSerial::new("02AA01AB")?;
///     manager.set_hvac_mode(&serial, HvacMode::Heat).await?;
///
///     manager.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct DeviceManager<T> {
    /// Shared relay; thermostats hold their own handle.
    relay: Arc<MessageRelay<T>>,
    router: TopicRouter,
    /// Event bus for broadcasting device events.
    event_bus: EventBus,
    /// Managed thermostats, keyed by serial.
    devices: RwLock<HashMap<DeviceSerial, Arc<Thermostat<T>>>>,
    recompute_on_target: bool,
    /// Task feeding inbound messages to the relay, if any.
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl<T: Transport> DeviceManager<T> {
    /// Creates a manager without devices.
    #[must_use]
    pub fn new(transport: T, router: TopicRouter) -> Self {
        Self {
            relay: Arc::new(MessageRelay::new(
                transport,
                Arc::new(SubscriptionRegistry::new()),
            )),
            router,
            event_bus: EventBus::new(),
            devices: RwLock::new(HashMap::new()),
            recompute_on_target: false,
            pump: parking_lot::Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Also derive the HVAC action after target temperature updates for
    /// thermostats added from now on.
    #[must_use]
    pub fn with_recompute_action_on_target(mut self, enabled: bool) -> Self {
        self.recompute_on_target = enabled;
        self
    }

    /// Creates a manager from a bridge configuration and adds every
    /// configured device.
    ///
    /// Inbound messages must be fed to [`relay`](Self::relay) by the caller,
    /// for example through [`spawn_inbound_pump`](Self::spawn_inbound_pump).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid, and the
    /// errors of [`add_device`](Self::add_device) otherwise.
    pub async fn from_config(config: &BridgeConfig, transport: T) -> crate::Result<Self> {
        config.validate()?;
        let manager = Self::new(transport, config.router()?)
            .with_recompute_action_on_target(config.recompute_action_on_target);

        for device in &config.devices {
            manager.add_device(device.clone()).await?;
        }
        Ok(manager)
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to device events.
    ///
    /// Returns a receiver for lifecycle and state change events of every
    /// managed thermostat.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }

    /// Returns the relay inbound messages are delivered to.
    #[must_use]
    pub fn relay(&self) -> &Arc<MessageRelay<T>> {
        &self.relay
    }

    /// Returns the topic router.
    #[must_use]
    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Spawns a task delivering every message from `rx` to the relay.
    ///
    /// The task ends when the channel closes or on [`shutdown`](Self::shutdown).
    /// A previously spawned pump is stopped.
    pub fn spawn_inbound_pump(&self, mut rx: mpsc::Receiver<InboundMessage>) {
        let relay = Arc::clone(&self.relay);
        let handle = tokio::spawn(async move {
            tracing::debug!("Starting inbound message pump");
            while let Some(message) = rx.recv().await {
                relay.on_message(&message.topic, &message.payload);
            }
            tracing::debug!("Inbound message pump stopped");
        });

        if let Some(previous) = self.pump.lock().replace(handle) {
            previous.abort();
        }
    }

    // =========================================================================
    // Device Management
    // =========================================================================

    /// Adds a thermostat.
    ///
    /// The thermostat is attached to the registry first and its topics are
    /// then subscribed on the transport. If a subscription fails the
    /// thermostat is removed again.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid configuration,
    /// `Error::DuplicateDevice` if the serial is already managed,
    /// `Error::ShutDown` after [`shutdown`](Self::shutdown), and
    /// `Error::Protocol` if a subscription fails.
    pub async fn add_device(&self, config: DeviceConfig) -> crate::Result<Arc<Thermostat<T>>> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        let serial = config.validate()?;

        let thermostat = {
            let mut devices = self.devices.write().await;
            if devices.contains_key(&serial) {
                return Err(Error::DuplicateDevice(serial.to_string()));
            }

            let thermostat = Thermostat::builder(config, Arc::clone(&self.relay))
                .router(self.router.clone())
                .events(self.event_bus.clone())
                .recompute_action_on_target(self.recompute_on_target)
                .attach()?;
            devices.insert(serial.clone(), Arc::clone(&thermostat));
            thermostat
        };

        let mut subscribed = Vec::new();
        for topic in thermostat.topics() {
            if let Err(e) = self.relay.subscribe(&topic).await {
                tracing::error!(serial = %serial, topic = %topic, error = %e, "Subscription failed");
                self.devices.write().await.remove(&serial);
                thermostat.detach();
                self.unsubscribe_all(&subscribed).await;
                return Err(e.into());
            }
            subscribed.push(topic);
        }

        tracing::info!(
            serial = %serial,
            name = %thermostat.device_info().name,
            "Thermostat added"
        );
        self.event_bus.publish(DeviceEvent::device_added(serial));
        Ok(thermostat)
    }

    /// Removes a thermostat.
    ///
    /// Its observers are detached before the topics are unsubscribed.
    /// Messages dispatched after that never reach the thermostat, but a
    /// dispatch already in progress may still apply its update.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the serial is not managed.
    pub async fn remove_device(&self, serial: &DeviceSerial) -> crate::Result<()> {
        let thermostat = self
            .devices
            .write()
            .await
            .remove(serial)
            .ok_or_else(|| Error::DeviceNotFound(serial.to_string()))?;

        thermostat.detach();
        self.unsubscribe_all(&thermostat.topics()).await;

        tracing::info!(serial = %serial, "Thermostat removed");
        self.event_bus
            .publish(DeviceEvent::device_removed(serial.clone()));
        Ok(())
    }

    async fn unsubscribe_all(&self, topics: &[String]) {
        for topic in topics {
            if let Err(e) = self.relay.unsubscribe(topic).await {
                tracing::warn!(topic = %topic, error = %e, "Failed to unsubscribe");
            }
        }
    }

    /// Returns the thermostat with `serial`.
    pub async fn device(&self, serial: &DeviceSerial) -> Option<Arc<Thermostat<T>>> {
        self.devices.read().await.get(serial).cloned()
    }

    /// Returns the serials of all managed thermostats, sorted.
    pub async fn serials(&self) -> Vec<DeviceSerial> {
        let mut serials: Vec<_> = self.devices.read().await.keys().cloned().collect();
        serials.sort();
        serials
    }

    /// Returns the number of managed thermostats.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    // =========================================================================
    // State Management
    // =========================================================================

    /// Returns the current state of a thermostat.
    pub async fn get_state(&self, serial: &DeviceSerial) -> Option<DeviceState> {
        self.devices.read().await.get(serial).map(|t| t.state())
    }

    /// Creates a watch receiver for a thermostat's state.
    ///
    /// The receiver is notified after every applied update.
    pub async fn watch_device(&self, serial: &DeviceSerial) -> Option<watch::Receiver<DeviceState>> {
        self.devices.read().await.get(serial).map(|t| t.watch())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn require(&self, serial: &DeviceSerial) -> crate::Result<Arc<Thermostat<T>>> {
        self.device(serial)
            .await
            .ok_or_else(|| Error::DeviceNotFound(serial.to_string()))
    }

    /// Requests setpoint changes on a thermostat.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the serial is not managed, and the
    /// errors of [`Thermostat::set_temperature`] otherwise.
    pub async fn set_temperature(
        &self,
        serial: &DeviceSerial,
        request: TemperatureRequest,
    ) -> crate::Result<()> {
        self.require(serial).await?.set_temperature(request).await
    }

    /// Requests a new operating mode on a thermostat.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the serial is not managed, or
    /// `Error::Protocol` if the publish fails.
    pub async fn set_hvac_mode(&self, serial: &DeviceSerial, mode: HvacMode) -> crate::Result<()> {
        self.require(serial).await?.set_hvac_mode(mode).await
    }

    /// Starts or stops the fan timer on a thermostat.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the serial is not managed, or
    /// `Error::Protocol` if the publish fails.
    pub async fn set_fan_active(&self, serial: &DeviceSerial, active: bool) -> crate::Result<()> {
        self.require(serial).await?.set_fan_active(active).await
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stops message delivery, drops every thermostat and closes the
    /// transport.
    ///
    /// Dispatches already in progress complete first. Calling this again
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the transport cannot be closed cleanly.
    pub async fn shutdown(&self) -> crate::Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.relay.registry().shutdown();

        let removed = {
            let mut devices = self.devices.write().await;
            let count = devices.len();
            devices.clear();
            count
        };

        tracing::info!(devices = removed, "Device manager shut down");
        self.relay.transport().close().await?;
        Ok(())
    }
}

#[cfg(feature = "mqtt")]
impl DeviceManager<crate::protocol::MqttBroker> {
    /// Connects to the configured broker and adds every configured device.
    ///
    /// Inbound messages are delivered by a background task until
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid,
    /// `Error::Protocol` if the broker cannot be reached, and the errors of
    /// [`add_device`](Self::add_device) otherwise.
    pub async fn connect(config: &BridgeConfig) -> crate::Result<Self> {
        config.validate()?;
        let broker = config.broker_builder().build().await?;
        let inbound = broker.take_message_receiver();

        let manager = Self::new(broker, config.router()?)
            .with_recompute_action_on_target(config.recompute_action_on_target);
        if let Some(rx) = inbound {
            manager.spawn_inbound_pump(rx);
        }

        for device in &config.devices {
            if let Err(e) = manager.add_device(device.clone()).await {
                if let Err(close) = manager.shutdown().await {
                    tracing::warn!(error = %close, "Failed to close broker after setup error");
                }
                return Err(e);
            }
        }
        Ok(manager)
    }
}

impl<T> std::fmt::Debug for DeviceManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("router", &self.router)
            .field("recompute_on_target", &self.recompute_on_target)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> Drop for DeviceManager<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        // Thermostats are kept alive by the registry until it is cleared
        self.relay.registry().shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use crate::protocol::testing::RecordingTransport;
    use crate::types::HvacAction;

    const SERIAL: &str = "02AA01AB";

    fn serial(s: &str) -> DeviceSerial {
        DeviceSerial::new(s).unwrap()
    }

    fn manager() -> DeviceManager<RecordingTransport> {
        DeviceManager::new(RecordingTransport::default(), TopicRouter::default())
    }

    #[tokio::test]
    async fn add_device_subscribes_topics() {
        let manager = manager();
        let mut events = manager.subscribe();

        manager
            .add_device(DeviceConfig::new("Hallway", "02aa01ab"))
            .await
            .unwrap();

        assert_eq!(manager.device_count().await, 1);
        assert_eq!(manager.serials().await, vec![serial(SERIAL)]);
        let subscribed = manager.relay().transport().subscriptions();
        assert_eq!(subscribed.len(), 8);
        assert!(subscribed.contains("nest/02AA01AB/device/current_temperature"));
        assert!(subscribed.contains("nest/02AA01AB/availability"));

        let event = events.recv().await.unwrap();
        assert_eq!(event, DeviceEvent::device_added(serial(SERIAL)));
    }

    #[tokio::test]
    async fn duplicate_device_is_rejected() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();

        let result = manager.add_device(DeviceConfig::new("Other", SERIAL)).await;
        assert!(matches!(result, Err(Error::DuplicateDevice(_))));
        assert_eq!(manager.relay().registry().topic_count(), 8);
    }

    #[tokio::test]
    async fn invalid_device_is_rejected() {
        let manager = manager();
        let result = manager.add_device(DeviceConfig::new("Hallway", "ABC")).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(manager.device_count().await, 0);
    }

    #[tokio::test]
    async fn remove_device_detaches_and_unsubscribes() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();
        let mut events = manager.subscribe();

        manager.remove_device(&serial(SERIAL)).await.unwrap();

        assert_eq!(manager.device_count().await, 0);
        assert_eq!(manager.relay().registry().topic_count(), 0);
        assert!(manager.relay().transport().subscriptions().is_empty());
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::device_removed(serial(SERIAL))
        );

        let result = manager.remove_device(&serial(SERIAL)).await;
        assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn removed_device_ignores_later_messages() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();
        let thermostat = manager.device(&serial(SERIAL)).await.unwrap();
        let relay = manager.relay();

        manager.remove_device(&serial(SERIAL)).await.unwrap();

        assert_eq!(relay.on_message("nest/02AA01AB/device/away", b"true"), 0);
        assert_eq!(relay.on_message("nest/02AA01AB/availability", b"false"), 0);
        assert!(thermostat.state().is_occupied());
        assert!(thermostat.state().is_available());
    }

    #[tokio::test]
    async fn inbound_updates_reach_state() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();
        let relay = manager.relay();

        relay.on_message("nest/02AA01AB/shared/target_temperature_type", b"cool");
        relay.on_message("nest/02AA01AB/shared/target_temperature", b"22");
        relay.on_message("nest/02AA01AB/device/current_temperature", b"25");

        let state = manager.get_state(&serial(SERIAL)).await.unwrap();
        assert_eq!(state.hvac_action(), HvacAction::Cooling);
        assert!(manager.get_state(&serial("BBBBBBBB")).await.is_none());
    }

    #[tokio::test]
    async fn inbound_pump_delivers_messages() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();
        let mut watch = manager.watch_device(&serial(SERIAL)).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        manager.spawn_inbound_pump(rx);
        tx.send(InboundMessage::new(
            "nest/02AA01AB/device/current_temperature",
            "19.5",
        ))
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), watch.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(watch.borrow().current_temperature(), Some(19.5));
    }

    #[tokio::test]
    async fn commands_by_serial() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();

        manager
            .set_hvac_mode(&serial(SERIAL), HvacMode::Cool)
            .await
            .unwrap();
        manager
            .set_fan_active(&serial(SERIAL), true)
            .await
            .unwrap();
        manager
            .set_temperature(&serial(SERIAL), TemperatureRequest::target(20.0))
            .await
            .unwrap();

        assert_eq!(
            manager.relay().transport().published(),
            vec![
                (
                    "nest/02AA01AB/shared/target_temperature_type/set".to_string(),
                    "cool".to_string()
                ),
                (
                    "nest/02AA01AB/device/fan_timer_active/set".to_string(),
                    "true".to_string()
                ),
                (
                    "nest/02AA01AB/shared/target_temperature/set".to_string(),
                    "20.0".to_string()
                ),
            ]
        );

        let result = manager
            .set_hvac_mode(&serial("BBBBBBBB"), HvacMode::Off)
            .await;
        assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn from_config_adds_devices() {
        let config = BridgeConfig::new("localhost")
            .with_topic_prefix("home/nest")
            .with_device(DeviceConfig::new("Hallway", SERIAL))
            .with_device(DeviceConfig::new("Attic", "BBBBBBBB"));

        let manager = DeviceManager::from_config(&config, RecordingTransport::default())
            .await
            .unwrap();

        assert_eq!(manager.device_count().await, 2);
        assert_eq!(manager.router().prefix(), "home/nest");
        assert!(
            manager
                .relay()
                .transport()
                .subscriptions()
                .contains("home/nest/BBBBBBBB/availability")
        );
    }

    #[tokio::test]
    async fn from_config_rejects_invalid_config() {
        let config = BridgeConfig::new("");
        let result = DeviceManager::from_config(&config, RecordingTransport::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();
        let thermostat = manager.device(&serial(SERIAL)).await.unwrap();

        manager.shutdown().await.unwrap();

        assert!(manager.is_shut_down());
        assert!(manager.relay().registry().is_shut_down());
        assert!(manager.relay().transport().is_closed());
        assert_eq!(manager.device_count().await, 0);

        let delivered = manager
            .relay()
            .on_message("nest/02AA01AB/device/current_temperature", b"20");
        assert_eq!(delivered, 0);
        assert_eq!(thermostat.state().current_temperature(), None);

        let result = manager.add_device(DeviceConfig::new("Attic", "BBBBBBBB")).await;
        assert!(matches!(result, Err(Error::ShutDown)));

        // Second call is a no-op
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn event_subscribers_see_state_changes() {
        let manager = manager();
        manager
            .add_device(DeviceConfig::new("Hallway", SERIAL))
            .await
            .unwrap();

        let counter = Arc::new(AtomicU32::new(0));
        let mut events = manager.subscribe();
        let counter_clone = Arc::clone(&counter);
        let handle = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event.is_state_change() {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        manager
            .relay()
            .on_message("nest/02AA01AB/device/fan_timer_active", b"on");
        manager
            .relay()
            .on_message("nest/02AA01AB/availability", b"true");

        // Dropping the manager closes the bus and ends the task
        drop(manager);
        handle.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
