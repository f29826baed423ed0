use std::convert::Infallible;
use std::error::Error;
use std::pin::Pin;
use iced::subscription::{self, Subscription};
use futures::{future, Stream, StreamExt, SinkExt};
use futures::channel::mpsc::{channel, Receiver, Sender};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio::time::{sleep, Duration};

use crate::device::constants::{make_serial_characteristic_uuid, make_serial_service_uuid, CONNECT_DELAY, DISCONNECT_DEADLINE, IS_CONNECTED_DEADLINE, POLL_DELAY, UNKNOWN_PERIPHERAL_NAME, WRITE_DEADLINE};
use crate::device::types::{DeviceCommand, DeviceEvent};
use crate::error::DeviceError;
use crate::pipeline::types::{AdapterState, TransportEvent};

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

enum ConnectionState {
    // waiting for the user to ask for a connection
    Idle,
    Scanning {
        retry: bool,
        adapters: Option<Vec<Adapter>>,
    },
    Connecting {
        peripheral: Peripheral,
        name: String,
    },
    Connected {
        peripheral: Peripheral,
        data_char: Characteristic,
        notifications: NotificationStream,
    },
    Stopped,
}

async fn start_scanning(manager: &Manager) -> Result<Vec<Adapter>, DeviceError> {
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(DeviceError::NoAdapter);
    }

    let filter = ScanFilter {
        services: vec![make_serial_service_uuid()],
    };

    for adapter in &adapters {
        info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        adapter.start_scan(filter.clone()).await?;
    }

    Ok(adapters)
}

async fn stop_scanning(adapters: &Vec<Adapter>) {
    for adapter in adapters {
        if let Err(err) = adapter.stop_scan().await {
            debug!("Failed to stop scanning: {:?}", err);
        }
    }
}

async fn find_peripheral(adapters: &Vec<Adapter>) -> Result<Option<(Peripheral, String)>, DeviceError> {
    let serial_service_uuid = make_serial_service_uuid();

    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            let properties = peripheral.properties().await;

            match properties {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    warn!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    // Some environments ignore the filter, so make sure to check the service uuid again
                    if properties.services.contains(&serial_service_uuid) {
                        let name = properties.local_name.unwrap_or(UNKNOWN_PERIPHERAL_NAME.to_string());
                        info!(
                            "Using peripheral {} {:?} {} {:?}",
                            properties.address,
                            properties.address_type,
                            name,
                            properties.services,
                        );
                        return Ok(Some((peripheral, name)));
                    }
                }
            }
        }
    }

    Ok(None)
}

async fn connect_peripheral(peripheral: &Peripheral) -> Result<(Characteristic, NotificationStream), DeviceError> {
    info!("Connecting to peripheral...");
    peripheral.connect().await?;

    // the link is up at this point, do not leave it half open when the serial setup fails
    match open_serial_link(peripheral).await {
        Ok(link) => Ok(link),
        Err(err) => {
            disconnect_peripheral(peripheral).await;
            Err(err)
        },
    }
}

async fn open_serial_link(peripheral: &Peripheral) -> Result<(Characteristic, NotificationStream), DeviceError> {
    let serial_service_uuid = make_serial_service_uuid();
    let serial_characteristic_uuid = make_serial_characteristic_uuid();

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;

    for service in peripheral.services() {
        if !service.uuid.eq(&serial_service_uuid) {
            continue;
        }

        for characteristic in &service.characteristics {
            if !characteristic.uuid.eq(&serial_characteristic_uuid) {
                continue;
            }

            info!("Subscribing to characteristic {:?} {:?}", service.uuid, characteristic.uuid);
            let notifications = peripheral.notifications().await?;
            peripheral.subscribe(characteristic).await?;
            return Ok((characteristic.clone(), notifications));
        }
    }

    Err(DeviceError::MissingCharacteristic)
}

async fn write_command(peripheral: &Peripheral, data_char: &Characteristic, text: &str) {
    let fut = peripheral.write(data_char, text.as_bytes(), WriteType::WithoutResponse);

    tokio::select! {
        _ = sleep(Duration::from_millis(WRITE_DEADLINE)) => {
            warn!("Sending to data characteristic took too long");
        }
        result = fut => {
            if let Err(err) = result {
                warn!("Failed to send to data characteristic: {:?}", err);
            }
        }
    };
}

async fn disconnect_peripheral(peripheral: &Peripheral) {
    tokio::select! {
        _ = sleep(Duration::from_millis(DISCONNECT_DEADLINE)) => {
            warn!("Disconnecting peripheral took too long");
        }
        result = peripheral.disconnect() => {
            if let Err(err) = result {
                warn!("Failed to disconnect peripheral: {:?}", err);
            }
        }
    };
}

/// Reason the link has to be torn down, given the outcome of `is_connected()`.
/// `None` as input means the check did not finish in time.
fn link_lost_reason(check: Option<Result<bool, btleplug::Error>>) -> Option<String> {
    match check {
        None => {
            // macOS
            warn!("Checking for connection status took too long");
            Some("Checking for connection status took too long".to_string())
        },
        Some(Err(err)) => {
            warn!("Error checking for connection state: {:?}", err);
            Some(err.to_string())
        },
        Some(Ok(false)) => {
            warn!("Connection lost");
            Some("Connection lost".to_string())
        },
        Some(Ok(true)) => None,
    }
}

fn is_permission_error(err: &DeviceError) -> bool {
    if let Some(source) = err.source() {
        if let Some(btleplug::Error::PermissionDenied) = source.downcast_ref::<btleplug::Error>() {
            return true;
        }
    }
    false
}

struct Link {
    cancel: CancellationToken,
    output: Sender<DeviceEvent>,
    commands: Receiver<DeviceCommand>,
    adapter_state: Option<AdapterState>,
}

impl Link {
    async fn emit(&mut self, event: TransportEvent) {
        if let Err(err) = self.output.send(DeviceEvent::Transport(event)).await {
            warn!("Failed to send DeviceEvent: {:?}", err);
        }
    }

    async fn set_adapter_state(&mut self, state: AdapterState) {
        if self.adapter_state != Some(state) {
            info!("Adapter state {:?}", state);
            self.adapter_state = Some(state);
            self.emit(TransportEvent::AdapterStateChanged(state)).await;
        }
    }

    async fn poll_adapters(&mut self, manager: &Manager) {
        let state = match manager.adapters().await {
            Ok(adapters) if !adapters.is_empty() => AdapterState::PoweredOn,
            Ok(_) => AdapterState::PoweredOff,
            Err(err) => {
                debug!("Failed to list adapters: {:?}", err);
                AdapterState::PoweredOff
            },
        };
        self.set_adapter_state(state).await;
    }

    // only a Disconnect is of interest while scanning or connecting
    fn take_disconnect_request(&mut self) -> bool {
        let mut requested = false;
        while let Ok(Some(command)) = self.commands.try_next() {
            match command {
                DeviceCommand::Disconnect => requested = true,
                DeviceCommand::Send(_) => warn!("Dropping command, not connected yet"),
                DeviceCommand::Connect => {},
            }
        }
        requested
    }

    async fn advance_state(&mut self, state: ConnectionState, manager: &Manager) -> ConnectionState {
        match state {
            ConnectionState::Idle => {
                tokio::select! {
                    _ = self.cancel.cancelled() => ConnectionState::Stopped,
                    command = self.commands.next() => match command {
                        Some(DeviceCommand::Connect) => ConnectionState::Scanning { retry: false, adapters: None },
                        Some(DeviceCommand::Send(_)) => {
                            warn!("Dropping command, not connected");
                            ConnectionState::Idle
                        },
                        Some(DeviceCommand::Disconnect) => ConnectionState::Idle,
                        None => ConnectionState::Stopped,
                    },
                    _ = sleep(Duration::from_millis(POLL_DELAY)) => {
                        self.poll_adapters(manager).await;
                        ConnectionState::Idle
                    },
                }
            },
            ConnectionState::Scanning { adapters, retry } => {
                if retry {
                    sleep(Duration::from_millis(CONNECT_DELAY)).await;
                }

                if self.take_disconnect_request() {
                    if let Some(adapters) = &adapters {
                        stop_scanning(adapters).await;
                    }
                    self.emit(TransportEvent::Disconnected(None)).await;
                    return ConnectionState::Idle;
                }

                let adapters = match adapters {
                    None => {
                        match start_scanning(manager).await {
                            Ok(adapters) => adapters,
                            Err(err) => {
                                warn!("Scanning failed {:?}", err);
                                if is_permission_error(&err) {
                                    warn!("Not allowed to access Bluetooth");
                                }
                                self.set_adapter_state(AdapterState::PoweredOff).await;
                                return ConnectionState::Idle;
                            },
                        }
                    },
                    Some(adapters) => adapters,
                };
                self.set_adapter_state(AdapterState::PoweredOn).await;

                match find_peripheral(&adapters).await {
                    Ok(Some((peripheral, name))) => {
                        stop_scanning(&adapters).await;
                        self.emit(TransportEvent::Connecting(name.clone())).await;
                        ConnectionState::Connecting { peripheral, name }
                    },
                    Ok(None) => {
                        debug!("No peripherals matched");
                        ConnectionState::Scanning { adapters: Some(adapters), retry: true }
                    },
                    Err(err) => {
                        warn!("Finding peripheral failed: {:?}", err);
                        ConnectionState::Scanning { adapters: Some(adapters), retry: true }
                    },
                }
            },
            ConnectionState::Connecting { peripheral, name } => {
                let (data_char, notifications) = match connect_peripheral(&peripheral).await {
                    Ok(v) => v,
                    Err(err) => {
                        warn!("Connecting to peripheral failed: {:?}", err);
                        // A peripheral that failed to connect might be unusable, so obtain a new
                        // one by going back to the scanning state
                        return ConnectionState::Scanning { adapters: None, retry: true };
                    },
                };

                if self.take_disconnect_request() {
                    disconnect_peripheral(&peripheral).await;
                    self.emit(TransportEvent::Disconnected(None)).await;
                    return ConnectionState::Idle;
                }

                info!("Peripheral ready");
                self.emit(TransportEvent::Connected(name)).await;
                ConnectionState::Connected { peripheral, data_char, notifications }
            },
            ConnectionState::Connected { peripheral, data_char, mut notifications } => {
                let serial_characteristic_uuid = make_serial_characteristic_uuid();

                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        disconnect_peripheral(&peripheral).await;
                        ConnectionState::Stopped
                    },
                    notification = notifications.next() => match notification {
                        Some(data) => {
                            if data.uuid.eq(&serial_characteristic_uuid) {
                                let fragment = String::from_utf8_lossy(data.value.as_slice()).into_owned();
                                self.emit(TransportEvent::Fragment(fragment)).await;
                            }
                            ConnectionState::Connected { peripheral, data_char, notifications }
                        },
                        None => {
                            warn!("Notification stream ended");
                            disconnect_peripheral(&peripheral).await;
                            self.emit(TransportEvent::Disconnected(Some("Notification stream ended".to_string()))).await;
                            ConnectionState::Idle
                        },
                    },
                    command = self.commands.next() => match command {
                        Some(DeviceCommand::Send(text)) => {
                            debug!("Sending {:?}", text);
                            write_command(&peripheral, &data_char, &text).await;
                            ConnectionState::Connected { peripheral, data_char, notifications }
                        },
                        Some(DeviceCommand::Disconnect) | None => {
                            info!("Disconnecting");
                            disconnect_peripheral(&peripheral).await;
                            self.emit(TransportEvent::Disconnected(None)).await;
                            ConnectionState::Idle
                        },
                        Some(DeviceCommand::Connect) => ConnectionState::Connected { peripheral, data_char, notifications },
                    },
                    _ = sleep(Duration::from_millis(POLL_DELAY)) => {
                        self.check_connected(peripheral, data_char, notifications).await
                    },
                }
            },
            ConnectionState::Stopped => {
                // subscription::channel expects the future to never resolve
                future::pending::<()>().await;
                ConnectionState::Stopped
            },
        }
    }

    async fn check_connected(&mut self, peripheral: Peripheral, data_char: Characteristic, notifications: NotificationStream) -> ConnectionState {
        let check = tokio::select! {
            _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => None,
            result = peripheral.is_connected() => Some(result),
        };

        match link_lost_reason(check) {
            None => ConnectionState::Connected { peripheral, data_char, notifications },
            Some(reason) => {
                disconnect_peripheral(&peripheral).await;
                self.emit(TransportEvent::Disconnected(Some(reason))).await;
                ConnectionState::Idle
            },
        }
    }
}

async fn connect_device(cancel: CancellationToken, mut output: Sender<DeviceEvent>) -> Infallible {
    let (command_sender, commands) = channel::<DeviceCommand>(32);
    if let Err(err) = output.send(DeviceEvent::Ready(command_sender)).await {
        warn!("Failed to send DeviceEvent: {:?}", err);
    }

    let mut link = Link {
        cancel,
        output,
        commands,
        adapter_state: None,
    };

    let manager = loop {
        match Manager::new().await {
            Ok(manager) => break manager,
            Err(err) => {
                warn!("Failed to create bluetooth manager: {:?}", err);
                link.set_adapter_state(AdapterState::PoweredOff).await;
                sleep(Duration::from_millis(CONNECT_DELAY)).await;
            },
        }
    };

    link.poll_adapters(&manager).await;

    let mut connection_state = ConnectionState::Idle;
    loop {
        connection_state = link.advance_state(connection_state, &manager).await;
    }
}

pub fn connect_device_subscription(cancel: CancellationToken) -> Subscription<DeviceEvent> {
    struct Connect;

    subscription::channel(
        std::any::TypeId::of::<Connect>(),
        64,
        move |subscription_sender| {
            async move {
                connect_device(cancel, subscription_sender).await
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_link_is_kept() {
        assert_eq!(link_lost_reason(Some(Ok(true))), None);
    }

    #[test]
    fn test_dead_link_is_torn_down() {
        assert_eq!(link_lost_reason(Some(Ok(false))), Some("Connection lost".to_string()));
        assert_eq!(
            link_lost_reason(None),
            Some("Checking for connection status took too long".to_string()),
        );

        let err = btleplug::Error::NotConnected;
        let expected = err.to_string();
        assert_eq!(link_lost_reason(Some(Err(err))), Some(expected));
    }
}
