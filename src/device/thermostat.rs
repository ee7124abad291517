// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-thermostat state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{DeviceInfo, TemperatureRequest};
use crate::error::ValueError;
use crate::event::{DeviceEvent, EventBus};
use crate::manager::DeviceConfig;
use crate::protocol::{Field, MessageRelay, Payload, TopicRouter, Transport};
use crate::state::{DeviceState, StateChange};
use crate::subscription::{Observer, SubscriptionId};
use crate::types::{DeviceSerial, HvacMode};

/// One managed thermostat.
///
/// A thermostat registers itself on the relay's registry for each of its
/// field topics when attached. Every inbound update is decoded, applied to
/// the state, and followed by a [`DeviceEvent::StateChanged`] on the event
/// bus and a new snapshot on the [`watch`](Self::watch) channel.
///
/// Commands are fire-and-forget: they publish to the command topic and
/// return. Local state only changes when the thermostat reports the new
/// value back on the subscribe topic.
///
/// The registry keeps the thermostat alive until [`detach`](Self::detach)
/// is called or the registry is shut down.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use nestor_lib::device::Thermostat;
/// use nestor_lib::manager::DeviceConfig;
/// use nestor_lib::protocol::{MessageRelay, MqttBroker};
/// use nestor_lib::subscription::SubscriptionRegistry;
/// use nestor_lib::types::HvacMode;
///
/// # async fn example() -> nestor_lib::Result<()> {
/// let broker = MqttBroker::builder().host("192.168.1.50").build().await?;
/// let relay = Arc::new(MessageRelay::new(broker, Arc::new(SubscriptionRegistry::new())));
///
/// let thermostat = Thermostat::builder(DeviceConfig::new("Hallway", "02AA01AB"), relay)
///     .attach()?;
///
/// thermostat.set_hvac_mode(HvacMode::Heat).await?;
/// thermostat.set_target_temperature(21.5).await?;
///
/// println!("{:?}", thermostat.state().hvac_action());
/// # Ok(())
/// # }
/// ```
pub struct Thermostat<T> {
    info: DeviceInfo,
    relay: Arc<MessageRelay<T>>,
    router: TopicRouter,
    state: Mutex<DeviceState>,
    state_tx: watch::Sender<DeviceState>,
    events: EventBus,
    registrations: Mutex<Vec<SubscriptionId>>,
    recompute_on_target: bool,
}

impl<T: Transport> Thermostat<T> {
    /// Creates a builder for a thermostat using `relay`.
    #[must_use]
    pub fn builder(config: DeviceConfig, relay: Arc<MessageRelay<T>>) -> ThermostatBuilder<T> {
        ThermostatBuilder {
            config,
            relay,
            router: TopicRouter::default(),
            events: EventBus::new(),
            recompute_on_target: false,
        }
    }

    /// Returns the thermostat serial.
    #[must_use]
    pub fn serial(&self) -> &DeviceSerial {
        &self.info.serial
    }

    /// Returns the thermostat's static description.
    #[must_use]
    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.state.lock().clone()
    }

    /// Returns a receiver that always holds the latest state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DeviceState> {
        self.state_tx.subscribe()
    }

    /// Returns the subscribe topics of every field.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.router.device_topics(self.serial())
    }

    /// Removes the thermostat's registrations from the registry.
    ///
    /// Messages dispatched afterwards are not applied; a dispatch already
    /// in progress may still finish. Returns the number of registrations
    /// removed.
    pub fn detach(&self) -> usize {
        let registrations = std::mem::take(&mut *self.registrations.lock());
        let registry = self.relay.registry();
        let removed = registrations
            .into_iter()
            .filter(|id| registry.unsubscribe(*id))
            .count();
        tracing::debug!(serial = %self.serial(), removed, "Thermostat detached");
        removed
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Requests a new single setpoint.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NonFiniteTemperature` for NaN or infinite values
    /// and `ProtocolError` if the publish fails.
    pub async fn set_target_temperature(&self, value: f64) -> crate::Result<()> {
        self.send(Field::TargetTemperature, finite(value)?).await
    }

    /// Requests a new lower setpoint for heat-cool mode.
    ///
    /// # Errors
    ///
    /// Same as [`set_target_temperature`](Self::set_target_temperature).
    pub async fn set_target_temperature_low(&self, value: f64) -> crate::Result<()> {
        self.send(Field::TargetTemperatureLow, finite(value)?).await
    }

    /// Requests a new upper setpoint for heat-cool mode.
    ///
    /// # Errors
    ///
    /// Same as [`set_target_temperature`](Self::set_target_temperature).
    pub async fn set_target_temperature_high(&self, value: f64) -> crate::Result<()> {
        self.send(Field::TargetTemperatureHigh, finite(value)?).await
    }

    /// Requests several setpoints at once.
    ///
    /// Absent values are skipped. Every present value is checked before
    /// anything is sent; publishing stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NonFiniteTemperature` if any value is NaN or
    /// infinite, and `ProtocolError` if a publish fails.
    pub async fn set_temperature(&self, request: TemperatureRequest) -> crate::Result<()> {
        let batch = [
            (Field::TargetTemperature, request.target),
            (Field::TargetTemperatureLow, request.low),
            (Field::TargetTemperatureHigh, request.high),
        ];

        let mut validated = Vec::with_capacity(batch.len());
        for (field, value) in batch {
            if let Some(value) = value {
                validated.push((field, finite(value)?));
            }
        }

        for (field, value) in validated {
            self.send(field, value).await?;
        }
        Ok(())
    }

    /// Requests a new operating mode.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the publish fails.
    pub async fn set_hvac_mode(&self, mode: HvacMode) -> crate::Result<()> {
        self.send(Field::HvacMode, mode).await
    }

    /// Starts or stops the fan timer.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the publish fails.
    pub async fn set_fan_active(&self, active: bool) -> crate::Result<()> {
        self.send(Field::FanTimerActive, active).await
    }

    /// Starts the fan timer.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the publish fails.
    pub async fn turn_fan_on(&self) -> crate::Result<()> {
        self.set_fan_active(true).await
    }

    /// Stops the fan timer.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the publish fails.
    pub async fn turn_fan_off(&self) -> crate::Result<()> {
        self.set_fan_active(false).await
    }

    async fn send(&self, field: Field, value: impl Into<Payload>) -> crate::Result<()> {
        let topic = self.router.command_topic(self.serial(), field);
        let payload = value.into();
        tracing::debug!(
            serial = %self.serial(),
            field = %field,
            value = %payload,
            "Sending command"
        );
        self.relay.publish(&topic, payload).await?;
        Ok(())
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Applies one update and notifies the host.
    fn apply(&self, change: StateChange) {
        let new_state = {
            let mut state = self.state.lock();
            let changed = state.apply(&change);
            let action_changed =
                change.affects_action(self.recompute_on_target) && state.refresh_action();
            let snapshot = state.clone();
            // Sent under the lock so the watch channel never goes backwards
            self.state_tx.send_replace(snapshot.clone());
            tracing::debug!(
                serial = %self.serial(),
                field = %change.field(),
                changed,
                action_changed,
                "Applied update"
            );
            snapshot
        };

        self.events.publish(DeviceEvent::state_changed(
            self.serial().clone(),
            change,
            new_state,
        ));
    }
}

impl<T: Transport> Observer for Thermostat<T> {
    fn on_message(&self, topic: &str, payload: &Payload) -> crate::Result<()> {
        let Some(address) = self.router.parse(topic) else {
            tracing::debug!(serial = %self.serial(), topic = %topic, "Ignoring unroutable topic");
            return Ok(());
        };
        if &address.serial != self.serial() {
            tracing::debug!(
                serial = %self.serial(),
                topic = %topic,
                "Ignoring topic for another thermostat"
            );
            return Ok(());
        }

        let change = StateChange::decode(address.field, payload)?;
        self.apply(change);
        Ok(())
    }
}

impl<T> std::fmt::Debug for Thermostat<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thermostat")
            .field("serial", &self.info.serial)
            .field("name", &self.info.name)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

fn finite(value: f64) -> Result<f64, ValueError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValueError::NonFiniteTemperature(value))
    }
}

/// Builder for attaching a [`Thermostat`] to a relay.
pub struct ThermostatBuilder<T> {
    config: DeviceConfig,
    relay: Arc<MessageRelay<T>>,
    router: TopicRouter,
    events: EventBus,
    recompute_on_target: bool,
}

impl<T: Transport> ThermostatBuilder<T> {
    /// Sets the topic router (default: prefix `nest`).
    #[must_use]
    pub fn router(mut self, router: TopicRouter) -> Self {
        self.router = router;
        self
    }

    /// Sets the event bus state changes are published on.
    #[must_use]
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Also derive the HVAC action after target temperature updates
    /// (default: `false`).
    #[must_use]
    pub fn recompute_action_on_target(mut self, enabled: bool) -> Self {
        self.recompute_on_target = enabled;
        self
    }

    /// Validates the configuration and registers the thermostat for each of
    /// its field topics.
    ///
    /// This does not subscribe on the transport; see
    /// [`DeviceManager::add_device`](crate::manager::DeviceManager::add_device).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid configuration and
    /// `Error::ShutDown` if the registry has been shut down.
    pub fn attach(self) -> crate::Result<Arc<Thermostat<T>>> {
        let serial = self.config.validate()?;
        let info = DeviceInfo::new(
            self.config.name.trim().to_string(),
            serial,
            self.config.temperature_unit,
        );
        let state = DeviceState::new();
        let (state_tx, _) = watch::channel(state.clone());

        let thermostat = Arc::new(Thermostat {
            info,
            relay: self.relay,
            router: self.router,
            state: Mutex::new(state),
            state_tx,
            events: self.events,
            registrations: Mutex::new(Vec::with_capacity(Field::ALL.len())),
            recompute_on_target: self.recompute_on_target,
        });

        let observer: Arc<dyn Observer> = thermostat.clone();
        let registry = thermostat.relay.registry();
        for topic in thermostat.topics() {
            match registry.register(topic, Arc::clone(&observer)) {
                Ok(id) => thermostat.registrations.lock().push(id),
                Err(e) => {
                    thermostat.detach();
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            serial = %thermostat.serial(),
            name = %thermostat.info.name,
            "Thermostat attached"
        );
        Ok(thermostat)
    }
}

impl<T> std::fmt::Debug for ThermostatBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermostatBuilder")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("recompute_on_target", &self.recompute_on_target)
            .finish_non_exhaustive()
    }
}
