use futures::channel::mpsc::Sender;

use crate::pipeline::types::TransportEvent;

/// Requests from the application to the connection task.
#[derive(Debug, Clone)]
pub enum DeviceCommand {
    /// Scan for an HM-10 peripheral and connect to the first one found.
    Connect,
    Disconnect,
    /// Write already framed text to the serial characteristic. Fire-and-forget.
    Send(String),
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The connection task is running and accepts commands on this sender.
    Ready(Sender<DeviceCommand>),
    Transport(TransportEvent),
}
