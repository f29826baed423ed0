use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::container::{StyleSheet, Appearance};

use crate::pipeline::gauge::Channel;

pub const OUTLINE_COLOR: Color = Color::from_rgb(1.0, 0.0, 0.0);
pub const LABEL_COLOR: Color = Color::from_rgb(1.0, 0.0, 0.0);

pub fn fill_color(channel: Channel) -> Color {
    match channel {
        Channel::Left => Color::from_rgb(0.0, 0.0, 1.0),
        Channel::Right => Color::from_rgb(0.0, 0.8, 0.0),
    }
}

pub struct LogContainerStyleSheet;

impl StyleSheet for LogContainerStyleSheet {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            text_color: Some(Color::BLACK),
            background: Some(Background::Color(Color::from_rgb(0.97, 0.97, 0.97))),
            border: Border {
                color: Color::from_rgb(0.8, 0.8, 0.8),
                width: 1.0,
                radius: 4.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
