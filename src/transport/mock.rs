//! Scriptable in-memory transport for session tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{CharacteristicRef, DeviceHandle, RawNotification, Transport};

/// Shared, inspectable state behind a [`MockTransport`].
#[derive(Debug, Default)]
pub struct MockState {
    /// Device lists returned by successive discovery passes; the last
    /// entry repeats once the queue drains.
    pub discover_results: VecDeque<Vec<DeviceHandle>>,
    /// Characteristic catalog returned by `resolve_services`.
    pub catalog: HashMap<Uuid, CharacteristicRef>,
    /// Values returned by `read`, keyed by characteristic.
    pub read_values: HashMap<Uuid, Vec<u8>>,
    /// How many connect attempts fail before one succeeds.
    pub connect_failures: u32,
    /// How many subscribe attempts fail before one succeeds.
    pub subscribe_failures: u32,
    /// How many write attempts fail before one succeeds.
    pub write_failures: u32,

    /// Call counters and records.
    pub discover_calls: u32,
    pub connect_calls: u32,
    pub subscribe_calls: u32,
    pub unsubscribe_calls: u32,
    pub disconnect_calls: u32,
    pub writes: Vec<(Uuid, Vec<u8>, bool)>,

    pub connected: bool,
    /// Sender handed over on subscription; tests push notifications here,
    /// and dropping it simulates a transport-level disconnect.
    pub notify_tx: Option<mpsc::Sender<RawNotification>>,
}

/// Transport whose behavior is scripted through [`MockState`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

fn injected() -> Error {
    Error::Ble(btleplug::Error::NotConnected)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the mock before the session runs.
    pub fn configure(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().expect("mock state poisoned"));
    }

    /// Inspects recorded calls after the session ran.
    pub fn inspect<R>(&self, f: impl FnOnce(&MockState) -> R) -> R {
        f(&self.state.lock().expect("mock state poisoned"))
    }

    /// Takes the notification sender captured at subscription, so a test
    /// can inject notifications or drop it to simulate disconnect.
    pub fn take_notify_tx(&self) -> Option<mpsc::Sender<RawNotification>> {
        self.state.lock().expect("mock state poisoned").notify_tx.take()
    }

    /// A catalog holding notify/write/read characteristics for the given
    /// UUIDs, in the shape `resolve_services` returns.
    pub fn catalog_with(uuids: &[(Uuid, bool, bool, bool)]) -> HashMap<Uuid, CharacteristicRef> {
        uuids
            .iter()
            .map(|&(uuid, readable, writable, notifiable)| {
                (
                    uuid,
                    CharacteristicRef {
                        uuid,
                        readable,
                        writable,
                        notifiable,
                    },
                )
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn discover(
        &mut self,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeviceHandle>>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            state.discover_calls += 1;
            let result = if state.discover_results.len() > 1 {
                state.discover_results.pop_front().unwrap_or_default()
            } else {
                state.discover_results.front().cloned().unwrap_or_default()
            };
            Ok(result)
        })
    }

    fn connect(
        &mut self,
        _device: DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            state.connect_calls += 1;
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(injected());
            }
            state.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            state.disconnect_calls += 1;
            state.connected = false;
            state.notify_tx = None;
            Ok(())
        })
    }

    fn resolve_services(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<Uuid, CharacteristicRef>>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let state = state.lock().expect("mock state poisoned");
            if !state.connected {
                return Err(Error::NotConnected);
            }
            Ok(state.catalog.clone())
        })
    }

    fn read(
        &mut self,
        characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let state = state.lock().expect("mock state poisoned");
            state
                .read_values
                .get(&characteristic.uuid)
                .cloned()
                .ok_or_else(injected)
        })
    }

    fn write(
        &mut self,
        characteristic: CharacteristicRef,
        data: Bytes,
        with_response: bool,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            if state.write_failures > 0 {
                state.write_failures -= 1;
                return Err(injected());
            }
            state
                .writes
                .push((characteristic.uuid, data.to_vec(), with_response));
            Ok(())
        })
    }

    fn subscribe(
        &mut self,
        _characteristic: CharacteristicRef,
        notify_tx: mpsc::Sender<RawNotification>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            state.subscribe_calls += 1;
            if state.subscribe_failures > 0 {
                state.subscribe_failures -= 1;
                return Err(injected());
            }
            state.notify_tx = Some(notify_tx);
            Ok(())
        })
    }

    fn unsubscribe(
        &mut self,
        _characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().expect("mock state poisoned");
            state.unsubscribe_calls += 1;
            state.notify_tx = None;
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.state.lock().expect("mock state poisoned").connected
    }
}
