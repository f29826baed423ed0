//! Serial text stream to gauge geometry.
//!
//! [`Pipeline`] is the single owner of the mutable state: transport events go in, a list of
//! [`UiUpdate`]s comes out. Nothing in here blocks or performs I/O.

use log::{debug, info};

use crate::config::types::{ChannelKeys, Config, LineEnding, ReceivedMessageOption};
use crate::error::CommandError;
use crate::pipeline::assembler::FragmentAssembler;
use crate::pipeline::controller::{ConnectionController, ConnectionStatus, ControllerEffect};
use crate::pipeline::gauge::{Channel, GaugeState, PerChannel};
use crate::pipeline::parser::TelemetryParser;
use crate::pipeline::render::{GaugeLayout, Quad, RenderPlanner};
use crate::pipeline::types::{Banner, SerialMessage, TransportEvent, UiUpdate, MESSAGE_END};

pub mod assembler;
pub mod controller;
pub mod gauge;
pub mod parser;
pub mod render;
pub mod types;

pub const LOG_NOT_CONNECTED: &str = "Force sensor is not connected. Please Connect!\n";
pub const LOG_HEADER: &str = "Sensor Reading\n";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub channel_keys: ChannelKeys,
    pub force_scale: f32,
    pub fill_margin: f32,
    pub max_pending_len: usize,
    pub log_format: LogFormat,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        PipelineConfig {
            channel_keys: config.channel_keys.clone(),
            force_scale: config.force_scale,
            fill_margin: config.fill_margin,
            max_pending_len: config.max_pending_len,
            log_format: LogFormat {
                received_message_option: config.received_message_option,
                separate_terminated_messages: config.separate_terminated_messages,
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig::from(&Config::default())
    }
}

/// How a received message is written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFormat {
    pub received_message_option: ReceivedMessageOption,
    pub separate_terminated_messages: bool,
}

impl LogFormat {
    pub fn format(&self, raw: &str) -> String {
        if self.separate_terminated_messages && raw.contains(MESSAGE_END) {
            return format!("{}\n\n", raw);
        }

        match self.received_message_option {
            ReceivedMessageOption::None => raw.to_string(),
            ReceivedMessageOption::Newline => format!("{}\n", raw),
        }
    }
}

pub struct Pipeline {
    assembler: FragmentAssembler,
    parser: TelemetryParser,
    gauges: GaugeState,
    planner: RenderPlanner,
    controller: ConnectionController,
    log_format: LogFormat,
    layout: Option<GaugeLayout>,
    // last fill sent to the UI, so unchanged gauges are not redrawn
    drawn: PerChannel<Option<Quad>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            assembler: FragmentAssembler::new(config.max_pending_len),
            parser: TelemetryParser::new(&config.channel_keys),
            gauges: GaugeState::new(config.force_scale),
            planner: RenderPlanner::new(config.fill_margin),
            controller: ConnectionController::new(),
            log_format: config.log_format,
            layout: None,
            drawn: PerChannel::default(),
        }
    }

    pub fn status(&self) -> &ConnectionStatus {
        self.controller.status()
    }

    pub fn banner(&self) -> Banner {
        self.controller.banner()
    }

    pub fn send_enabled(&self) -> bool {
        self.controller.send_enabled()
    }

    pub fn gauges(&self) -> &GaugeState {
        &self.gauges
    }

    pub fn pending(&self) -> &str {
        self.assembler.pending()
    }

    pub fn layout(&self) -> Option<&GaugeLayout> {
        self.layout.as_ref()
    }

    pub fn fill_height(&self, channel: Channel) -> f32 {
        let gauge_height = self.layout
            .map(|layout| layout.outline(channel).height())
            .unwrap_or(0.0);

        self.gauges.fill_height(channel, gauge_height)
    }

    /// Fixes the gauge outlines from the container size and returns the fills to draw.
    pub fn set_layout(&mut self, width: f32, height: f32) -> Vec<UiUpdate> {
        self.layout = Some(GaugeLayout::from_container(width, height));
        self.drawn = PerChannel::default();

        let mut updates = Vec::new();
        self.plan_gauges(&mut updates);
        updates
    }

    pub fn handle(&mut self, event: TransportEvent) -> Vec<UiUpdate> {
        let mut updates = Vec::new();

        if let TransportEvent::Fragment(fragment) = &event {
            self.feed(fragment, &mut updates);
            return updates;
        }

        let effects = self.controller.handle(&event);
        if effects.is_empty() {
            return updates;
        }

        for effect in effects {
            match effect {
                ControllerEffect::Arm { peer_name } => {
                    info!("Receiving telemetry from {}", peer_name);
                    self.reset();
                    updates.push(UiUpdate::ReplaceLog(LOG_HEADER.to_string()));
                },
                ControllerEffect::Disarm => self.reset(),
                ControllerEffect::Notice(notice) => updates.push(UiUpdate::StatusNotice(notice.to_string())),
            }
        }

        updates.push(UiUpdate::Banner(self.controller.banner()));
        self.plan_gauges(&mut updates);
        updates
    }

    /// Moves on from the "Disconnected" state once its notice has been shown.
    pub fn acknowledge_disconnect(&mut self) -> Option<UiUpdate> {
        if let ConnectionStatus::Disconnected { .. } = self.controller.status() {
            self.controller.acknowledge_disconnect();
            return Some(UiUpdate::Banner(self.controller.banner()));
        }
        None
    }

    /// Frames a user command for sending. Only allowed while connected.
    pub fn frame_command(&self, command: &str, line_ending: LineEnding) -> Result<String, CommandError> {
        self.controller.check_send()?;
        Ok(line_ending.apply(command))
    }

    fn feed(&mut self, fragment: &str, updates: &mut Vec<UiUpdate>) {
        if !self.controller.is_live() {
            debug!("Ignoring {} bytes received while not connected", fragment.len());
            return;
        }

        let mut messages = Vec::new();
        for result in self.assembler.feed(fragment) {
            match result {
                Ok(message) => messages.push(message),
                Err(err) => updates.push(UiUpdate::FramingError(err.to_string())),
            }
        }

        for message in messages {
            self.apply_message(message, updates);
        }
    }

    fn apply_message(&mut self, message: SerialMessage, updates: &mut Vec<UiUpdate>) {
        for reading in self.parser.parse(&message) {
            self.gauges.update(reading);
        }

        updates.push(UiUpdate::AppendLog(self.log_format.format(message.raw())));
        self.plan_gauges(updates);
    }

    fn plan_gauges(&mut self, updates: &mut Vec<UiUpdate>) {
        let layout = match self.layout {
            Some(layout) => layout,
            None => return,
        };

        for channel in Channel::all() {
            let outline = layout.outline(channel);
            let fill_height = self.gauges.fill_height(channel, outline.height());
            let quad = self.planner.plan(outline, fill_height);

            if self.drawn[channel] != Some(quad) {
                self.drawn[channel] = Some(quad);
                updates.push(UiUpdate::UpdateGauge(channel, quad));
            }
        }
    }

    fn reset(&mut self) {
        self.assembler.reset();
        self.gauges.reset();
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::AdapterState;

    fn connected() -> Pipeline {
        let mut pipeline = Pipeline::default();
        pipeline.set_layout(1000.0, 500.0);
        pipeline.handle(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
        pipeline.handle(TransportEvent::Connected("HMSoft".to_string()));
        pipeline
    }

    fn gauge_updates(updates: &[UiUpdate]) -> Vec<Channel> {
        updates
            .iter()
            .filter_map(|update| match update {
                UiUpdate::UpdateGauge(channel, _) => Some(*channel),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_log_format() {
        let format = LogFormat {
            received_message_option: ReceivedMessageOption::Newline,
            separate_terminated_messages: true,
        };
        assert_eq!(format.format("<fl=1>"), "<fl=1>\n\n");
        assert_eq!(format.format("<fl=1"), "<fl=1\n");

        let format = LogFormat {
            received_message_option: ReceivedMessageOption::None,
            separate_terminated_messages: false,
        };
        assert_eq!(format.format("<fl=1>"), "<fl=1>");
    }

    #[test]
    fn test_connect_replaces_log_and_updates_banner() {
        let mut pipeline = Pipeline::default();
        pipeline.handle(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
        let updates = pipeline.handle(TransportEvent::Connected("HMSoft".to_string()));

        assert!(updates.contains(&UiUpdate::ReplaceLog(LOG_HEADER.to_string())));
        assert!(updates.iter().any(|update| matches!(update, UiUpdate::Banner(banner) if banner.title == "HMSoft")));
    }

    #[test]
    fn test_message_updates_log_and_gauges() {
        let mut pipeline = connected();
        let updates = pipeline.handle(TransportEvent::Fragment("<fl=2.0>".to_string()));

        assert_eq!(updates[0], UiUpdate::AppendLog("<fl=2.0>\n\n".to_string()));
        assert_eq!(gauge_updates(&updates), vec![Channel::Left]);
        assert_eq!(pipeline.fill_height(Channel::Left), 60.0);
    }

    #[test]
    fn test_unchanged_gauges_are_not_redrawn() {
        let mut pipeline = connected();
        pipeline.handle(TransportEvent::Fragment("<fl=2.0,fr=1.0>".to_string()));
        let updates = pipeline.handle(TransportEvent::Fragment("<fl=2.0,fr=1.5>".to_string()));
        assert_eq!(gauge_updates(&updates), vec![Channel::Right]);

        let updates = pipeline.handle(TransportEvent::Fragment("<garbage>".to_string()));
        assert!(gauge_updates(&updates).is_empty());
        assert_eq!(updates, vec![UiUpdate::AppendLog("<garbage>\n\n".to_string())]);
    }

    #[test]
    fn test_fragments_ignored_while_not_connected() {
        let mut pipeline = Pipeline::default();
        pipeline.handle(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));

        assert!(pipeline.handle(TransportEvent::Fragment("<fl=2.0>".to_string())).is_empty());
        assert_eq!(pipeline.pending(), "");
        assert_eq!(pipeline.gauges().force(Channel::Left), 0.0);
    }

    #[test]
    fn test_framing_overflow_is_surfaced() {
        let config = PipelineConfig {
            max_pending_len: 4,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(config);
        pipeline.handle(TransportEvent::Connected("HMSoft".to_string()));

        let updates = pipeline.handle(TransportEvent::Fragment("<fl=1.0".to_string()));
        assert!(matches!(updates.as_slice(), [UiUpdate::FramingError(_)]));
        assert_eq!(pipeline.pending(), "");

        pipeline.handle(TransportEvent::Fragment("<fr=1>".to_string()));
        assert_eq!(pipeline.gauges().force(Channel::Right), 1.0);
    }

    #[test]
    fn test_send_requires_connection() {
        let mut pipeline = Pipeline::default();
        assert!(!pipeline.send_enabled());
        assert_eq!(pipeline.frame_command("l1", LineEnding::Newline), Err(CommandError::AdapterUnavailable));

        pipeline.handle(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
        assert!(pipeline.send_enabled());
        assert_eq!(pipeline.frame_command("l1", LineEnding::Newline), Err(CommandError::NotConnected));

        pipeline.handle(TransportEvent::Connected("HMSoft".to_string()));
        assert_eq!(pipeline.frame_command("l1", LineEnding::CarriageReturnAndNewline), Ok("l1\r\n".to_string()));
    }

    #[test]
    fn test_disconnect_notice_and_acknowledge() {
        let mut pipeline = connected();
        let updates = pipeline.handle(TransportEvent::Disconnected(None));
        assert!(updates.contains(&UiUpdate::StatusNotice("Disconnected".to_string())));

        assert!(pipeline.acknowledge_disconnect().is_some());
        assert_eq!(pipeline.status(), &ConnectionStatus::AdapterOnDisconnected);
        assert!(pipeline.acknowledge_disconnect().is_none());
    }
}
