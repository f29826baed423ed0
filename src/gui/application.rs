use futures::channel::mpsc::Sender;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::time::{every as iced_time_every};
use iced::theme::{self, Theme};
use iced::widget::{
    Canvas, PickList, button, column, container, horizontal_rule, row, scrollable, text, text_input,
};
use iced::widget::scrollable::RelativeOffset;
use std::time::{Duration, Instant};
use log::{error, info, warn};
use tokio_util::sync::{CancellationToken};

use crate::config::io::{ConfigIO};
use crate::config::types::{Config, LineEnding};
use crate::device::connection::connect_device_subscription;
use crate::device::types::{DeviceCommand, DeviceEvent};
use crate::error::AppRunError;
use crate::gui::gauges::{GaugeCanvas, GAUGE_CANVAS_HEIGHT, GAUGE_CANVAS_WIDTH};
use crate::gui::style::LogContainerStyleSheet;
use crate::gui::types::Message;
use crate::pipeline::render::GaugeLayout;
use crate::pipeline::types::{Banner, BannerAction, BannerTint, UiUpdate};
use crate::pipeline::{Pipeline, PipelineConfig, LOG_NOT_CONNECTED};

/**
 * How long a status notice such as "Disconnected" stays visible.
 */
const STATUS_NOTICE_DURATION: Duration = Duration::from_secs(1);

/**
 * The received text log is trimmed from the front once it grows beyond this many bytes.
 */
const MAX_LOG_LEN: usize = 64 * 1024;

fn log_scrollable_id() -> scrollable::Id {
    scrollable::Id::new("log")
}

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct MyApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,
    // message that disappears by itself
    status_notice: Option<(String, Instant)>,

    config_io: ConfigIO,
    config: Config,
    config_loaded: bool,

    pipeline: Pipeline,
    // commands for the connection task, available once it has started
    device_commands: Option<Sender<DeviceCommand>>,

    banner: Banner,
    log: String,
    command_input: String,
    gauges: GaugeCanvas,
}

impl MyApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    let mut error_message: Option<String> = None;

                    if err.is_file_not_found_error() {
                        info!("Config file not found, using defaults");
                    } else {
                        error!("Failed to load config: {:?}", &err);
                        error_message = Some(format!("Failed to load config: {}", &err));
                    }
                    (Config::default(), error_message)
                }
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    // fire-and-forget, the connection task reports the outcome as transport events
    fn send_device_command(&mut self, command: DeviceCommand) {
        match &mut self.device_commands {
            Some(sender) => {
                if let Err(err) = sender.try_send(command) {
                    warn!("Failed to send command to the connection task: {:?}", err);
                }
            },
            None => warn!("Connection task is not running, dropping {:?}", command),
        }
    }

    fn append_log(&mut self, line: &str) {
        self.log.push_str(line);

        if self.log.len() > MAX_LOG_LEN {
            let mut cut = self.log.len() - MAX_LOG_LEN;
            while !self.log.is_char_boundary(cut) {
                cut += 1;
            }
            self.log.replace_range(..cut, "");
        }
    }

    fn apply_updates(&mut self, updates: Vec<UiUpdate>) -> Command<Message> {
        let mut log_changed = false;

        for update in updates {
            match update {
                UiUpdate::AppendLog(line) => {
                    self.append_log(&line);
                    log_changed = true;
                },
                UiUpdate::ReplaceLog(content) => {
                    self.log = content;
                    log_changed = true;
                },
                UiUpdate::FramingError(message) => {
                    self.append_log(&format!("{}\n", message));
                    log_changed = true;
                },
                UiUpdate::UpdateGauge(channel, fill) => self.gauges.set_fill(channel, fill),
                UiUpdate::Banner(banner) => self.banner = banner,
                UiUpdate::StatusNotice(notice) => self.status_notice = Some((notice, Instant::now())),
            }
        }

        if log_changed {
            return scrollable::snap_to(log_scrollable_id(), RelativeOffset::END);
        }
        Command::none()
    }

    fn send_command(&mut self) {
        match self.pipeline.frame_command(&self.command_input, self.config.line_ending) {
            Ok(framed) => {
                self.send_device_command(DeviceCommand::Send(framed));
                self.command_input.clear();
            },
            Err(err) => {
                info!("Not sending command: {}", err);
                self.notices.push(err.to_string());
            },
        }
    }
}

impl Application for MyApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (MyApplication, Command<Self::Message>) {
        let pipeline = Pipeline::new(PipelineConfig::default());
        let banner = pipeline.banner();

        let app = MyApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            status_notice: None,
            config_io: flags.config_io,
            config: Config::default(),
            config_loaded: false,
            pipeline,
            device_commands: None,
            banner,
            log: LOG_NOT_CONNECTED.to_string(),
            command_input: String::new(),
            gauges: GaugeCanvas::new(GaugeLayout::from_container(GAUGE_CANVAS_WIDTH, GAUGE_CANVAS_HEIGHT)),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("HM10 Force Gauge ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.pipeline = Pipeline::new(PipelineConfig::from(&config));
                self.config = config;
                self.config_loaded = true;

                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }

                let updates = self.pipeline.set_layout(GAUGE_CANVAS_WIDTH, GAUGE_CANVAS_HEIGHT);
                return self.apply_updates(updates);
            },
            Message::Tick => {
                if let Some((_, shown_at)) = &self.status_notice {
                    if shown_at.elapsed() >= STATUS_NOTICE_DURATION {
                        self.status_notice = None;
                        if let Some(update) = self.pipeline.acknowledge_disconnect() {
                            return self.apply_updates(vec![update]);
                        }
                    }
                }
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::DeviceEvent(DeviceEvent::Ready(sender)) => {
                info!("Connection task ready");
                self.device_commands = Some(sender);
            },
            Message::DeviceEvent(DeviceEvent::Transport(event)) => {
                let updates = self.pipeline.handle(event);
                return self.apply_updates(updates);
            },
            Message::BannerActionPressed => {
                if self.banner.action_enabled {
                    let command = match self.banner.action {
                        BannerAction::Connect => DeviceCommand::Connect,
                        BannerAction::Disconnect => DeviceCommand::Disconnect,
                    };
                    self.send_device_command(command);
                }
            },
            Message::CommandInputChanged(value) => {
                self.command_input = value;
            },
            Message::SendCommand => {
                self.send_command();
            },
            Message::LineEndingSelected(line_ending) => {
                self.config.line_ending = line_ending;
            },

            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            event::listen().map(Message::EventOccurred),
            iced_time_every(Duration::from_millis(250)).map(|_| Message::Tick),
        ];

        // transport events are only consumed once the pipeline has its configuration
        if self.config_loaded {
            subscriptions.push(
                connect_device_subscription(self.app_cancel.clone()).map(Message::DeviceEvent)
            );
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Dismiss"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let mut banner_button = button(text(self.banner.action.to_string()))
            .style(match self.banner.tint {
                BannerTint::Normal => theme::Button::Primary,
                BannerTint::Alert => theme::Button::Destructive,
            });

        if self.banner.action_enabled {
            banner_button = banner_button.on_press(Message::BannerActionPressed);
        }

        // without on_input the field is rendered disabled
        let mut command_input = text_input("Send a command", &self.command_input);
        if self.pipeline.send_enabled() {
            command_input = command_input
                .on_input(Message::CommandInputChanged)
                .on_submit(Message::SendCommand);
        }

        let status_notice = match &self.status_notice {
            Some((notice, _)) => notice.as_str(),
            None => "",
        };

        container(
            column![
                row![
                    text(&self.banner.title).size(20).width(Length::Fill),
                    banner_button,
                ].align_items(Alignment::Center),

                horizontal_rule(10),

                text(status_notice),

                Canvas::new(&self.gauges)
                    .width(Length::Fixed(GAUGE_CANVAS_WIDTH))
                    .height(Length::Fixed(GAUGE_CANVAS_HEIGHT)),

                container(
                    scrollable(text(&self.log).size(14).width(Length::Fill))
                        .id(log_scrollable_id())
                        .height(Length::Fill),
                )
                    .style(theme::Container::Custom(Box::new(LogContainerStyleSheet)))
                    .padding(5)
                    .height(Length::Fill),

                row![
                    command_input,

                    PickList::new(
                        LineEnding::all(),
                        Some(self.config.line_ending),
                        Message::LineEndingSelected,
                    ).width(200),
                ].align_items(Alignment::Center).spacing(10),
            ]
                .spacing(10)
                .align_items(Alignment::Center),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

pub fn run_application() -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("hm10-force-gauge".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(600.0, 800.0);
    settings.window.resizable = false;

    // this function will call process::exit() unless there was a startup error
    MyApplication::run(settings)?;
    Ok(())
}
