use log::{debug, info};

use crate::error::CommandError;
use crate::pipeline::types::{AdapterState, Banner, BannerAction, BannerTint, TransportEvent};

pub const DEFAULT_TITLE: &str = "Bluetooth Serial";
pub const NOTICE_DISCONNECTED: &str = "Disconnected";
pub const NOTICE_ADAPTER_OFF: &str = "Bluetooth turned off";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    AdapterOff,
    AdapterOnDisconnected,
    Connecting,
    Connected { peer_name: String },
    Disconnected { reason: Option<String> },
}

/// Side effects the owner of the pipeline has to carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEffect {
    /// Reset assembler and gauges and start accepting fragments.
    Arm { peer_name: String },
    /// Reset assembler and gauges and stop accepting fragments.
    Disarm,
    Notice(&'static str),
}

#[derive(Debug, Clone)]
pub struct ConnectionController {
    status: ConnectionStatus,
}

impl ConnectionController {
    pub fn new() -> Self {
        ConnectionController {
            status: ConnectionStatus::AdapterOff,
        }
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, ConnectionStatus::Connected { .. })
    }

    /// Commands may only be sent while connected.
    pub fn check_send(&self) -> Result<(), CommandError> {
        match self.status {
            ConnectionStatus::Connected { .. } => Ok(()),
            ConnectionStatus::AdapterOff => Err(CommandError::AdapterUnavailable),
            _ => Err(CommandError::NotConnected),
        }
    }

    /// Sending is disabled outright while the radio is off. In the other states an attempt
    /// is allowed and answered with a "not connected" notice.
    pub fn send_enabled(&self) -> bool {
        !matches!(self.status, ConnectionStatus::AdapterOff)
    }

    pub fn handle(&mut self, event: &TransportEvent) -> Vec<ControllerEffect> {
        let next = match (event, &self.status) {
            (TransportEvent::AdapterStateChanged(AdapterState::PoweredOff), _) => {
                Some(ConnectionStatus::AdapterOff)
            },
            (TransportEvent::AdapterStateChanged(AdapterState::PoweredOn), ConnectionStatus::AdapterOff)
            | (TransportEvent::AdapterStateChanged(AdapterState::PoweredOn), ConnectionStatus::Disconnected { .. }) => {
                Some(ConnectionStatus::AdapterOnDisconnected)
            },
            (TransportEvent::AdapterStateChanged(AdapterState::PoweredOn), _) => None,
            (TransportEvent::Connecting(_), ConnectionStatus::Connected { .. }) => None,
            (TransportEvent::Connecting(_), _) => Some(ConnectionStatus::Connecting),
            (TransportEvent::Connected(peer_name), _) => {
                Some(ConnectionStatus::Connected { peer_name: peer_name.clone() })
            },
            // a late disconnect does not bring the radio back
            (TransportEvent::Disconnected(_), ConnectionStatus::AdapterOff) => None,
            (TransportEvent::Disconnected(reason), _) => {
                Some(ConnectionStatus::Disconnected { reason: reason.clone() })
            },
            (TransportEvent::Fragment(_), _) => None,
        };

        let next = match next {
            Some(next) if next != self.status => next,
            _ => return Vec::new(),
        };

        info!("Connection status {:?} -> {:?}", self.status, next);
        self.status = next;

        let mut effects = Vec::new();
        match &self.status {
            ConnectionStatus::Connected { peer_name } => {
                effects.push(ControllerEffect::Arm { peer_name: peer_name.clone() });
            },
            ConnectionStatus::Disconnected { reason } => {
                if let Some(reason) = reason {
                    debug!("Disconnect reason: {}", reason);
                }
                effects.push(ControllerEffect::Disarm);
                effects.push(ControllerEffect::Notice(NOTICE_DISCONNECTED));
            },
            ConnectionStatus::AdapterOff => {
                effects.push(ControllerEffect::Disarm);
                effects.push(ControllerEffect::Notice(NOTICE_ADAPTER_OFF));
            },
            _ => {},
        }

        effects
    }

    /// Called once the "Disconnected" notice has been shown; the link is then simply idle.
    pub fn acknowledge_disconnect(&mut self) {
        if let ConnectionStatus::Disconnected { .. } = self.status {
            self.status = ConnectionStatus::AdapterOnDisconnected;
        }
    }

    pub fn banner(&self) -> Banner {
        match &self.status {
            ConnectionStatus::Connected { peer_name } => Banner {
                title: peer_name.clone(),
                action: BannerAction::Disconnect,
                action_enabled: true,
                tint: BannerTint::Alert,
            },
            ConnectionStatus::AdapterOff => Banner {
                title: DEFAULT_TITLE.to_string(),
                action: BannerAction::Connect,
                action_enabled: false,
                tint: BannerTint::Normal,
            },
            ConnectionStatus::Connecting => Banner {
                title: DEFAULT_TITLE.to_string(),
                action: BannerAction::Disconnect,
                action_enabled: true,
                tint: BannerTint::Normal,
            },
            _ => Banner {
                title: DEFAULT_TITLE.to_string(),
                action: BannerAction::Connect,
                action_enabled: true,
                tint: BannerTint::Normal,
            },
        }
    }
}

impl Default for ConnectionController {
    fn default() -> Self {
        ConnectionController::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powered_on() -> ConnectionController {
        let mut controller = ConnectionController::new();
        controller.handle(&TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
        controller
    }

    #[test]
    fn test_starts_with_adapter_off() {
        let controller = ConnectionController::new();
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOff);
        assert_eq!(controller.check_send(), Err(CommandError::AdapterUnavailable));
        assert!(!controller.send_enabled());
        assert!(!controller.banner().action_enabled);
    }

    #[test]
    fn test_full_cycle() {
        let mut controller = powered_on();
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOnDisconnected);
        assert!(controller.banner().action_enabled);

        assert!(controller.handle(&TransportEvent::Connecting("HMSoft".to_string())).is_empty());
        assert_eq!(controller.status(), &ConnectionStatus::Connecting);

        let effects = controller.handle(&TransportEvent::Connected("HMSoft".to_string()));
        assert_eq!(effects, vec![ControllerEffect::Arm { peer_name: "HMSoft".to_string() }]);
        assert_eq!(controller.status(), &ConnectionStatus::Connected { peer_name: "HMSoft".to_string() });
        assert_eq!(controller.check_send(), Ok(()));

        let banner = controller.banner();
        assert_eq!(banner.title, "HMSoft");
        assert_eq!(banner.action, BannerAction::Disconnect);
        assert_eq!(banner.tint, BannerTint::Alert);

        let effects = controller.handle(&TransportEvent::Disconnected(Some("link lost".to_string())));
        assert_eq!(effects, vec![ControllerEffect::Disarm, ControllerEffect::Notice(NOTICE_DISCONNECTED)]);
        assert_eq!(controller.check_send(), Err(CommandError::NotConnected));

        controller.acknowledge_disconnect();
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOnDisconnected);
    }

    #[test]
    fn test_adapter_off_from_connected() {
        let mut controller = powered_on();
        controller.handle(&TransportEvent::Connected("HMSoft".to_string()));

        let effects = controller.handle(&TransportEvent::AdapterStateChanged(AdapterState::PoweredOff));
        assert_eq!(effects, vec![ControllerEffect::Disarm, ControllerEffect::Notice(NOTICE_ADAPTER_OFF)]);
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOff);
        assert!(!controller.send_enabled());

        // the disconnect that follows a radio shutdown changes nothing
        assert!(controller.handle(&TransportEvent::Disconnected(None)).is_empty());
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOff);
    }

    #[test]
    fn test_repeated_signals_are_ignored() {
        let mut controller = powered_on();
        assert!(controller.handle(&TransportEvent::AdapterStateChanged(AdapterState::PoweredOn)).is_empty());
        assert!(controller.handle(&TransportEvent::Fragment("<fl=1>".to_string())).is_empty());
        assert_eq!(controller.status(), &ConnectionStatus::AdapterOnDisconnected);
    }

    #[test]
    fn test_message_content_never_changes_status() {
        let mut controller = powered_on();
        controller.handle(&TransportEvent::Connected("HMSoft".to_string()));
        controller.handle(&TransportEvent::Fragment("<disconnected>".to_string()));
        assert!(controller.is_live());
    }
}
