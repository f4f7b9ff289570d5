//! Connection session state machine.
//!
//! A [`Session`] drives one device through discovery, connection, service
//! resolution, vendor activation and teardown, feeding measurement
//! notifications through the decoder into the [`MeasurementLog`]. Every
//! fallible transition goes through the configured [`RetryPolicy`]
//! (`crate::retry`); teardown deliberately does not, so shutdown cannot
//! hang on retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{MonitorConfig, SessionMode, Target};
use crate::error::{Error, Result};
use crate::event::{EventDispatcher, SessionEvent, Subscription};
use crate::protocol::{decode_measurement, parse_feature, uuids};
use crate::record::MeasurementLog;
use crate::transport::{BleTransport, CharacteristicRef, DeviceHandle, RawNotification, Transport};
use crate::types::{BloodPressureFeature, DeviceInformation, Measurement};

/// Buffered notifications between the transport and the decode pipeline.
const NOTIFY_CHANNEL_CAPACITY: usize = 64;

/// Event broadcast buffer.
const EVENT_CAPACITY: usize = 256;

/// How long `stop` lets the decode pipeline drain before aborting it.
const PIPELINE_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Session lifecycle states.
///
/// `Closed` and `Failed` are terminal; a session never re-enters an
/// earlier state, construct a new one to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not started.
    Idle,
    /// Scanning for the target by advertised name.
    Discovering,
    /// Connecting to the matched device.
    Connecting,
    /// Resolving the characteristic set from the service catalog.
    ServiceResolving,
    /// Subscribing to measurement notifications.
    Activating,
    /// Subscribed; activation write pending.
    Subscribed,
    /// Activated and receiving notifications.
    Active,
    /// Tearing down (unsubscribe, then disconnect).
    Disconnecting,
    /// Cleanly closed.
    Closed,
    /// Terminally failed; the reason was surfaced as an [`Error`].
    Failed,
}

impl SessionState {
    /// Returns true for `Closed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::ServiceResolving => "service-resolving",
            Self::Activating => "activating",
            Self::Subscribed => "subscribed",
            Self::Active => "active",
            Self::Disconnecting => "disconnecting",
            Self::Closed => "closed",
            Self::Failed => "failed",
        })
    }
}

/// State shared with the decode pipeline task.
struct Shared {
    state: watch::Sender<SessionState>,
    log: MeasurementLog,
    dispatcher: EventDispatcher,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn transition(&self, to: SessionState) {
        let from = self.state();
        if from == to {
            return;
        }
        self.state.send_replace(to);
        tracing::info!("session state: {from} -> {to}");
        self.dispatcher
            .dispatch(SessionEvent::StateChanged { from, to });
    }
}

/// A monitoring session against one blood pressure device.
///
/// Exclusively owned by one control flow; multiple independent sessions
/// against distinct devices are safe in the same process.
pub struct Session<T> {
    transport: Arc<Mutex<T>>,
    config: MonitorConfig,
    shared: Arc<Shared>,
    measurement_char: Option<CharacteristicRef>,
    subscribed: bool,
    feature: Option<BloodPressureFeature>,
    device_info: Option<DeviceInformation>,
    battery_level: Option<u8>,
    pipeline_task: Option<JoinHandle<()>>,
}

impl Session<BleTransport> {
    /// Creates a session on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if no Bluetooth adapter is available.
    pub async fn ble(config: MonitorConfig) -> Result<Self> {
        Ok(Self::new(BleTransport::new().await?, config))
    }
}

impl<T: Transport> Session<T> {
    /// Creates a session with a fresh measurement log.
    #[must_use]
    pub fn new(transport: T, config: MonitorConfig) -> Self {
        Self::with_log(transport, config, MeasurementLog::new())
    }

    /// Creates a session appending to an existing log, so readings
    /// survive reconnection.
    #[must_use]
    pub fn with_log(transport: T, config: MonitorConfig, log: MeasurementLog) -> Self {
        let (state_tx, _state_rx) = watch::channel(SessionState::Idle);
        Self {
            transport: Arc::new(Mutex::new(transport)),
            config,
            shared: Arc::new(Shared {
                state: state_tx,
                log,
                dispatcher: EventDispatcher::new(EVENT_CAPACITY),
            }),
            measurement_char: None,
            subscribed: false,
            feature: None,
            device_info: None,
            battery_level: None,
            pipeline_task: None,
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.shared.dispatcher.subscribe()
    }

    /// Read-only snapshot of the recorded measurements, in arrival order.
    pub async fn measurements(&self) -> Vec<Measurement> {
        self.shared.log.snapshot().await
    }

    /// Shared handle to the measurement log for reporting collaborators.
    #[must_use]
    pub fn measurement_log(&self) -> MeasurementLog {
        self.shared.log.clone()
    }

    /// Blood pressure feature bits, if read during startup.
    #[must_use]
    pub const fn feature(&self) -> Option<BloodPressureFeature> {
        self.feature
    }

    /// Device information strings, if read during startup.
    #[must_use]
    pub const fn device_information(&self) -> Option<&DeviceInformation> {
        self.device_info.as_ref()
    }

    /// Battery level percentage, if read during startup.
    #[must_use]
    pub const fn battery_level(&self) -> Option<u8> {
        self.battery_level
    }

    /// Drives the session from `Idle` to `Active`.
    ///
    /// In [`SessionMode::ActivateOnly`] the session tears down again right
    /// after the activation write and returns with the session `Closed`.
    ///
    /// On failure the session attempts best-effort cleanup, lands in
    /// `Failed` and returns the specific reason.
    ///
    /// # Errors
    ///
    /// See [`Error`] for the failure taxonomy; [`Error::AlreadyStarted`]
    /// if the session is not `Idle`.
    pub async fn start(&mut self) -> Result<()> {
        if self.shared.state() != SessionState::Idle {
            return Err(Error::AlreadyStarted);
        }

        match self.run_to_active().await {
            Ok(()) => {
                if self.config.mode == SessionMode::ActivateOnly {
                    self.stop().await?;
                }
                Ok(())
            }
            Err(error) => {
                tracing::error!("session failed: {error}");
                self.teardown_best_effort().await;
                self.shared.transition(SessionState::Failed);
                Err(error)
            }
        }
    }

    /// Stops the session: best-effort unsubscribe, then disconnect.
    ///
    /// Idempotent; safe to call from any state. Cleanup is a single
    /// attempt per operation with failures logged, never retried.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the contract open for
    /// transports with fallible shutdown.
    pub async fn stop(&mut self) -> Result<()> {
        let state = self.shared.state();
        if state.is_terminal() {
            return Ok(());
        }
        if state == SessionState::Idle {
            self.shared.transition(SessionState::Closed);
            return Ok(());
        }

        self.shared.transition(SessionState::Disconnecting);
        self.teardown_best_effort().await;

        // Let the pipeline decode anything that arrived before the
        // unsubscribe completed, then reap it.
        if let Some(mut task) = self.pipeline_task.take() {
            if tokio::time::timeout(PIPELINE_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }

        self.shared.transition(SessionState::Closed);
        Ok(())
    }

    /// Waits until the session reaches a terminal state.
    ///
    /// Returns `Ok(())` once the session is `Closed`. The only way an
    /// active session fails on its own is the transport dropping the
    /// connection, surfaced here as [`Error::ConnectionLost`]; construct a
    /// new session to resume monitoring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the session ends in `Failed`.
    pub async fn wait_closed(&self) -> Result<()> {
        let mut state_rx = self.shared.state.subscribe();
        loop {
            match *state_rx.borrow_and_update() {
                SessionState::Closed => return Ok(()),
                SessionState::Failed => return Err(Error::ConnectionLost),
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(Error::ConnectionLost);
            }
        }
    }

    async fn run_to_active(&mut self) -> Result<()> {
        let policy = self.config.retry;
        let device = self.locate_device().await?;

        self.shared.transition(SessionState::Connecting);
        {
            let transport = Arc::clone(&self.transport);
            let device = device.clone();
            policy
                .run(move |attempt| {
                    let transport = Arc::clone(&transport);
                    let device = device.clone();
                    async move {
                        tracing::debug!("connect attempt {attempt} to {}", device.address);
                        let mut transport = transport.lock().await;
                        transport.connect(device).await
                    }
                })
                .await
                .map_err(|exhausted| Error::ConnectionFailure {
                    attempts: exhausted.attempts,
                    source: Box::new(exhausted.error),
                })?;
        }

        self.shared.transition(SessionState::ServiceResolving);
        let catalog = {
            let transport = Arc::clone(&self.transport);
            policy
                .run(move |attempt| {
                    let transport = Arc::clone(&transport);
                    async move {
                        tracing::debug!("service resolution attempt {attempt}");
                        let mut transport = transport.lock().await;
                        transport.resolve_services().await
                    }
                })
                .await
                .map_err(|exhausted| exhausted.error)?
        };

        let activation_char = catalog
            .get(&self.config.uuids.activation)
            .cloned()
            .ok_or(Error::CharacteristicNotFound(self.config.uuids.activation))?;
        let measurement_char = catalog
            .get(&self.config.uuids.measurement)
            .cloned()
            .ok_or(Error::CharacteristicNotFound(self.config.uuids.measurement))?;
        self.measurement_char = Some(measurement_char.clone());

        if self.config.read_device_info {
            self.read_device_details(&catalog).await;
        }

        // Subscribe before the activation write so no measurement can be
        // missed.
        self.shared.transition(SessionState::Activating);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
        {
            let transport = Arc::clone(&self.transport);
            let characteristic = measurement_char.clone();
            policy
                .run(move |attempt| {
                    let transport = Arc::clone(&transport);
                    let characteristic = characteristic.clone();
                    let notify_tx = notify_tx.clone();
                    async move {
                        tracing::debug!("subscribe attempt {attempt}");
                        let mut transport = transport.lock().await;
                        transport.subscribe(characteristic, notify_tx).await
                    }
                })
                .await
                .map_err(|exhausted| Error::SubscriptionFailure {
                    attempts: exhausted.attempts,
                    source: Box::new(exhausted.error),
                })?;
        }
        self.subscribed = true;
        self.shared.transition(SessionState::Subscribed);
        self.spawn_pipeline(notify_rx, measurement_char.uuid);

        {
            let transport = Arc::clone(&self.transport);
            let characteristic = activation_char;
            let payload = self.config.activation_payload.clone();
            policy
                .run(move |attempt| {
                    let transport = Arc::clone(&transport);
                    let characteristic = characteristic.clone();
                    let payload = payload.clone();
                    async move {
                        tracing::debug!("activation write attempt {attempt}");
                        let mut transport = transport.lock().await;
                        transport.write(characteristic, payload, true).await
                    }
                })
                .await
                .map_err(|exhausted| Error::ActivationFailure {
                    attempts: exhausted.attempts,
                    source: Box::new(exhausted.error),
                })?;
        }

        self.shared.transition(SessionState::Active);
        Ok(())
    }

    /// Resolves the target to a device handle, scanning by name unless an
    /// address was configured (which skips discovery entirely).
    async fn locate_device(&mut self) -> Result<DeviceHandle> {
        match self.config.target.clone() {
            Target::Address(address) => {
                tracing::debug!("using configured address {address}");
                Ok(DeviceHandle::from_address(address))
            }
            Target::Name(name) => {
                self.shared.transition(SessionState::Discovering);
                let policy = self.config.retry;
                let timeout = self.config.discover_timeout;
                let transport = Arc::clone(&self.transport);
                policy
                    .run(move |attempt| {
                        let transport = Arc::clone(&transport);
                        let name = name.clone();
                        async move {
                            tracing::debug!("discovery attempt {attempt} for {name:?}");
                            let devices = {
                                let mut transport = transport.lock().await;
                                transport.discover(timeout).await?
                            };
                            tracing::debug!("discovered {} device(s)", devices.len());
                            devices
                                .into_iter()
                                .find(|device| device.name.as_deref() == Some(name.as_str()))
                                .ok_or(Error::DiscoveryTimeout { attempts: attempt })
                        }
                    })
                    .await
                    .map_err(|exhausted| match exhausted.error {
                        Error::DiscoveryTimeout { .. } => Error::DiscoveryTimeout {
                            attempts: exhausted.attempts,
                        },
                        other => other,
                    })
            }
        }
    }

    /// Best-effort reads of feature bits, device information and battery
    /// level. Absent characteristics are skipped; read failures are
    /// logged and never fatal.
    async fn read_device_details(&mut self, catalog: &HashMap<Uuid, CharacteristicRef>) {
        if let Some(characteristic) = catalog.get(&self.config.uuids.feature) {
            let read_result = {
                let mut transport = self.transport.lock().await;
                transport.read(characteristic.clone()).await
            };
            match read_result {
                Ok(bytes) => match parse_feature(&bytes) {
                    Ok(feature) => {
                        tracing::info!("blood pressure features: {:#06x}", feature.bits());
                        self.feature = Some(feature);
                    }
                    Err(error) => tracing::debug!("could not parse feature bits: {error}"),
                },
                Err(error) => tracing::debug!("could not read feature bits: {error}"),
            }
        }

        let info = DeviceInformation {
            manufacturer: self.read_string(catalog, uuids::MANUFACTURER_NAME).await,
            model_number: self.read_string(catalog, uuids::MODEL_NUMBER).await,
            serial_number: self.read_string(catalog, uuids::SERIAL_NUMBER).await,
            firmware_revision: self.read_string(catalog, uuids::FIRMWARE_REVISION).await,
            hardware_revision: self.read_string(catalog, uuids::HARDWARE_REVISION).await,
            software_revision: self.read_string(catalog, uuids::SOFTWARE_REVISION).await,
        };
        if info != DeviceInformation::default() {
            tracing::info!(
                "device: {} {}",
                info.manufacturer.as_deref().unwrap_or("?"),
                info.model_number.as_deref().unwrap_or("?")
            );
            self.device_info = Some(info);
        }

        if let Some(characteristic) = catalog.get(&self.config.uuids.battery_level) {
            let read_result = {
                let mut transport = self.transport.lock().await;
                transport.read(characteristic.clone()).await
            };
            match read_result {
                Ok(bytes) if !bytes.is_empty() => {
                    tracing::info!("battery level: {}%", bytes[0]);
                    self.battery_level = Some(bytes[0]);
                }
                Ok(_) => tracing::debug!("battery level read returned no data"),
                Err(error) => tracing::debug!("could not read battery level: {error}"),
            }
        }
    }

    async fn read_string(
        &self,
        catalog: &HashMap<Uuid, CharacteristicRef>,
        uuid: Uuid,
    ) -> Option<String> {
        let characteristic = catalog.get(&uuid)?.clone();
        let mut transport = self.transport.lock().await;
        match transport.read(characteristic).await {
            Ok(bytes) => Some(
                String::from_utf8_lossy(&bytes)
                    .trim_matches(char::from(0))
                    .trim()
                    .to_string(),
            ),
            Err(error) => {
                tracing::debug!("could not read {uuid}: {error}");
                None
            }
        }
    }

    /// Spawns the notification-to-decoder-to-log pipeline.
    ///
    /// Runs independently of the command flow. A closed channel while the
    /// session is `Active` means the transport dropped us.
    fn spawn_pipeline(&mut self, mut notify_rx: mpsc::Receiver<RawNotification>, source: Uuid) {
        let shared = Arc::clone(&self.shared);
        self.pipeline_task = Some(tokio::spawn(async move {
            while let Some(notification) = notify_rx.recv().await {
                if notification.uuid != source {
                    tracing::trace!("ignoring notification from {}", notification.uuid);
                    continue;
                }
                match decode_measurement(&notification.value) {
                    Ok(measurement) => {
                        tracing::info!(
                            "measurement: {}/{} {}",
                            measurement.systolic,
                            measurement.diastolic,
                            measurement.unit
                        );
                        shared.log.append(measurement).await;
                        shared.dispatcher.dispatch(SessionEvent::Measurement(measurement));
                    }
                    Err(error) => {
                        tracing::warn!("failed to decode measurement: {error}");
                        shared.dispatcher.dispatch(SessionEvent::DecodeFailed {
                            uuid: notification.uuid,
                            error,
                        });
                    }
                }
            }

            if shared.state() == SessionState::Active {
                tracing::warn!("transport disconnected while active");
                shared.transition(SessionState::Failed);
                shared.dispatcher.dispatch(SessionEvent::ConnectionLost);
            }
        }));
    }

    /// Unsubscribe-then-disconnect, one attempt each, failures logged.
    /// Not subject to the retry policy so shutdown cannot hang.
    async fn teardown_best_effort(&mut self) {
        let mut transport = self.transport.lock().await;

        if self.subscribed {
            if let Some(characteristic) = self.measurement_char.clone() {
                if let Err(error) = transport.unsubscribe(characteristic).await {
                    tracing::warn!("unsubscribe failed during teardown: {error}");
                }
            }
            self.subscribed = false;
        }

        if transport.is_connected() {
            if let Err(error) = transport.disconnect().await {
                tracing::warn!("disconnect failed during teardown: {error}");
            }
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(task) = self.pipeline_task.take() {
            task.abort();
        }
    }
}
