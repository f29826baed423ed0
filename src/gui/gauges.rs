use iced::{mouse, Pixels, Rectangle, Renderer, Theme};
use iced::widget::canvas::{self, Cache, Frame, Geometry, Path, Stroke};

use crate::gui::style::{fill_color, LABEL_COLOR, OUTLINE_COLOR};
use crate::gui::types::Message;
use crate::pipeline::gauge::{Channel, PerChannel};
use crate::pipeline::render::{GaugeLayout, Point, Quad, OUTLINE_STROKE_WIDTH};

pub const GAUGE_CANVAS_WIDTH: f32 = 560.0;
pub const GAUGE_CANVAS_HEIGHT: f32 = 360.0;

fn to_iced(point: Point) -> iced::Point {
    iced::Point::new(point.x, point.y)
}

/// Draws the gauge outlines and the latest fill per channel. The geometry is cached and only
/// rebuilt when a fill changes.
pub struct GaugeCanvas {
    layout: GaugeLayout,
    fills: PerChannel<Option<Quad>>,
    cache: Cache,
}

impl GaugeCanvas {
    pub fn new(layout: GaugeLayout) -> Self {
        GaugeCanvas {
            layout,
            fills: PerChannel::default(),
            cache: Cache::new(),
        }
    }

    /// Replaces the previous fill of `channel`.
    pub fn set_fill(&mut self, channel: Channel, fill: Quad) {
        self.fills[channel] = Some(fill);
        self.cache.clear();
    }

    fn draw_outline(&self, frame: &mut Frame, channel: Channel) {
        let [bottom_left, bottom_right, top_right, top_left] = self.layout.outline(channel).corners();

        // open at the top
        let path = Path::new(|builder| {
            builder.move_to(to_iced(bottom_left));
            builder.line_to(to_iced(bottom_right));
            builder.line_to(to_iced(top_right));
            builder.move_to(to_iced(top_left));
            builder.line_to(to_iced(bottom_left));
        });

        frame.stroke(&path, Stroke::default().with_color(OUTLINE_COLOR).with_width(OUTLINE_STROKE_WIDTH));

        frame.fill_text(canvas::Text {
            content: channel.to_string(),
            position: to_iced(self.layout.label_position(channel)),
            color: LABEL_COLOR,
            size: Pixels(24.0),
            ..canvas::Text::default()
        });
    }

    fn draw_fill(&self, frame: &mut Frame, channel: Channel) {
        let fill = match &self.fills[channel] {
            Some(fill) if fill.height() > 0.0 => fill,
            _ => return,
        };

        let [first, rest @ ..] = fill.corners();
        let path = Path::new(|builder| {
            builder.move_to(to_iced(first));
            for corner in rest {
                builder.line_to(to_iced(corner));
            }
            builder.close();
        });

        frame.fill(&path, fill_color(channel));
    }
}

impl canvas::Program<Message> for GaugeCanvas {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let geometry = self.cache.draw(renderer, bounds.size(), |frame| {
            for channel in Channel::all() {
                self.draw_fill(frame, channel);
                self.draw_outline(frame, channel);
            }
        });

        vec![geometry]
    }
}
