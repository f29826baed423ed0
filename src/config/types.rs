use serde::{Deserialize, Serialize};
use enum_iterator::{all, Sequence};

use crate::pipeline::assembler::DEFAULT_MAX_PENDING_LEN;
use crate::pipeline::render::DEFAULT_FILL_MARGIN;

/**
 * Pixels of gauge fill per unit of force.
 */
pub const DEFAULT_FORCE_SCALE: f32 = 30.0;

/// Line ending appended to a command before it is sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineEnding {
    #[default]
    None,
    Newline,
    CarriageReturn,
    CarriageReturnAndNewline,
}

impl LineEnding {
    pub fn all() -> Vec<LineEnding> {
        all::<LineEnding>().collect::<Vec<_>>()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Newline => "\n",
            LineEnding::CarriageReturn => "\r",
            LineEnding::CarriageReturnAndNewline => "\r\n",
        }
    }

    pub fn apply(&self, command: &str) -> String {
        let mut framed = String::with_capacity(command.len() + 2);
        framed.push_str(command);
        framed.push_str(self.as_str());
        framed
    }
}

impl std::fmt::Display for LineEnding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            LineEnding::None => "No line ending",
            LineEnding::Newline => "Newline (\\n)",
            LineEnding::CarriageReturn => "Carriage return (\\r)",
            LineEnding::CarriageReturnAndNewline => "Both (\\r\\n)",
        };

        write!(f, "{}", result)
    }
}

/// Whether a newline is added after each received message in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceivedMessageOption {
    #[default]
    None,
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelKeys {
    pub left: String,
    pub right: String,
}

impl Default for ChannelKeys {
    fn default() -> Self {
        ChannelKeys {
            left: "fl".to_string(),
            right: "fr".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub line_ending: LineEnding,
    pub received_message_option: ReceivedMessageOption,
    // blank line after every logged message that contains a terminator
    pub separate_terminated_messages: bool,
    pub channel_keys: ChannelKeys,
    pub force_scale: f32,
    pub fill_margin: f32,
    pub max_pending_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            line_ending: LineEnding::None,
            received_message_option: ReceivedMessageOption::None,
            separate_terminated_messages: true,
            channel_keys: ChannelKeys::default(),
            force_scale: DEFAULT_FORCE_SCALE,
            fill_margin: DEFAULT_FILL_MARGIN,
            max_pending_len: DEFAULT_MAX_PENDING_LEN,
        }
    }
}
