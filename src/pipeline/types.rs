use crate::pipeline::gauge::Channel;
use crate::pipeline::render::Quad;

pub const MESSAGE_START: char = '<';
pub const MESSAGE_END: char = '>';

/// A complete message as cut from the serial stream, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialMessage {
    raw: String,
}

impl SerialMessage {
    pub fn new(raw: String) -> Self {
        SerialMessage { raw }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The payload between the framing delimiters, trimmed. Anything before the last `<` is
    /// noise left over from before the message started.
    pub fn body(&self) -> &str {
        let body = self.raw.trim();
        let body = body.strip_suffix(MESSAGE_END).unwrap_or(body);
        let body = match body.rfind(MESSAGE_START) {
            Some(start) => &body[start + MESSAGE_START.len_utf8()..],
            None => body,
        };

        body.trim()
    }

    pub fn into_raw(self) -> String {
        self.raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
}

/// Signals from the transport collaborator. These are the only inputs that drive the
/// connection state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    AdapterStateChanged(AdapterState),
    Connecting(String),
    Connected(String),
    Disconnected(Option<String>),
    Fragment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerAction {
    Connect,
    Disconnect,
}

impl std::fmt::Display for BannerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            BannerAction::Connect => "Connect",
            BannerAction::Disconnect => "Disconnect",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerTint {
    Normal,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub title: String,
    pub action: BannerAction,
    pub action_enabled: bool,
    pub tint: BannerTint,
}

/// What the UI has to change. The pipeline never touches UI objects itself.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    AppendLog(String),
    ReplaceLog(String),
    UpdateGauge(Channel, Quad),
    Banner(Banner),
    StatusNotice(String),
    FramingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_strips_delimiters_and_whitespace() {
        let message = SerialMessage::new(" <fl=2.3,fr=1.1>".to_string());
        assert_eq!(message.body(), "fl=2.3,fr=1.1");
        assert_eq!(message.raw(), " <fl=2.3,fr=1.1>");
    }

    #[test]
    fn test_body_drops_noise_before_start() {
        let message = SerialMessage::new("garbage\r\n<fr=1.0>".to_string());
        assert_eq!(message.body(), "fr=1.0");
    }

    #[test]
    fn test_body_without_start_delimiter() {
        let message = SerialMessage::new("fl=2.0>".to_string());
        assert_eq!(message.body(), "fl=2.0");
    }
}
