use std::ops::{Index, IndexMut};
use enum_iterator::{all, Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn all() -> Vec<Channel> {
        all::<Channel>().collect::<Vec<_>>()
    }

    fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Channel::Left => "Left Hand",
            Channel::Right => "Right Hand",
        };

        write!(f, "{}", result)
    }
}

/// One value per channel, indexed by [`Channel`] instead of by name.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerChannel<T>([T; 2]);

impl<T> PerChannel<T> {
    pub fn new(left: T, right: T) -> Self {
        PerChannel([left, right])
    }
}

impl<T> Index<Channel> for PerChannel<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        &self.0[channel.index()]
    }
}

impl<T> IndexMut<Channel> for PerChannel<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        &mut self.0[channel.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: Channel,
    pub value: f32,
}

impl Reading {
    pub fn new(channel: Channel, value: f32) -> Self {
        Reading { channel, value }
    }
}

#[derive(Debug, Clone)]
pub struct GaugeState {
    force: PerChannel<f32>,
    // pixels per force unit
    scale: f32,
}

impl GaugeState {
    pub fn new(scale: f32) -> Self {
        GaugeState {
            force: PerChannel::default(),
            scale,
        }
    }

    /// Only the addressed channel changes, the other one keeps its last value.
    pub fn update(&mut self, reading: Reading) {
        self.force[reading.channel] = reading.value;
    }

    pub fn force(&self, channel: Channel) -> f32 {
        self.force[channel]
    }

    /// Fill height in `[0, gauge_height]`. Parsed input is untrusted, so negative forces
    /// and anything that would overflow the gauge are clamped.
    pub fn fill_height(&self, channel: Channel, gauge_height: f32) -> f32 {
        let gauge_height = gauge_height.max(0.0);
        let height = self.force[channel] * self.scale;

        if height.is_nan() {
            return 0.0;
        }

        height.clamp(0.0, gauge_height)
    }

    pub fn reset(&mut self) {
        self.force = PerChannel::default();
    }
}
