use iced::Event;

use crate::config::types::{Config, LineEnding};
use crate::device::types::DeviceEvent;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    Tick,
    ConfigLoadComplete((Config, Option<String>)), // error message if the config could not be read
    NoticeConfirmed,
    DeviceEvent(DeviceEvent),
    BannerActionPressed,
    CommandInputChanged(String),
    SendCommand,
    LineEndingSelected(LineEnding),
}
