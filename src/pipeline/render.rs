use crate::pipeline::gauge::{Channel, PerChannel};

/**
 * Default inset (pixels) between a gauge outline and its fill, so the fill never covers the
 * outline stroke.
 */
pub const DEFAULT_FILL_MARGIN: f32 = 5.0;

/**
 * Width of the stroke used for gauge outlines.
 */
pub const OUTLINE_STROKE_WIDTH: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// An axis aligned rectangle described by its four corners, in screen coordinates (y grows
/// downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    pub bottom_left: Point,
    pub bottom_right: Point,
    pub top_right: Point,
    pub top_left: Point,
}

impl Quad {
    pub fn from_edges(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Quad {
            bottom_left: Point::new(left, bottom),
            bottom_right: Point::new(right, bottom),
            top_right: Point::new(right, top),
            top_left: Point::new(left, top),
        }
    }

    pub fn left(&self) -> f32 {
        self.bottom_left.x
    }

    pub fn right(&self) -> f32 {
        self.bottom_right.x
    }

    pub fn top(&self) -> f32 {
        self.top_left.y
    }

    pub fn bottom(&self) -> f32 {
        self.bottom_left.y
    }

    pub fn width(&self) -> f32 {
        self.right() - self.left()
    }

    pub fn height(&self) -> f32 {
        self.bottom() - self.top()
    }

    /// Corners in drawing order, starting at the bottom left.
    pub fn corners(&self) -> [Point; 4] {
        [self.bottom_left, self.bottom_right, self.top_right, self.top_left]
    }
}

// gauge position relative to the container: (left, right, top, bottom)
const LEFT_GAUGE: (f32, f32, f32, f32) = (0.25, 0.40, 0.20, 0.80);
const RIGHT_GAUGE: (f32, f32, f32, f32) = (0.65, 0.80, 0.20, 0.80);

/// Outlines of both gauges, fixed once from the container size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeLayout {
    outlines: PerChannel<Quad>,
}

impl GaugeLayout {
    pub fn from_container(width: f32, height: f32) -> Self {
        let outline = |(left, right, top, bottom): (f32, f32, f32, f32)| {
            Quad::from_edges(width * left, width * right, height * top, height * bottom)
        };

        GaugeLayout {
            outlines: PerChannel::new(outline(LEFT_GAUGE), outline(RIGHT_GAUGE)),
        }
    }

    pub fn outline(&self, channel: Channel) -> &Quad {
        &self.outlines[channel]
    }

    /// Where the channel name is written: just below the outline.
    pub fn label_position(&self, channel: Channel) -> Point {
        let outline = self.outline(channel);
        Point::new(outline.left(), outline.bottom() + OUTLINE_STROKE_WIDTH)
    }
}

/// Computes fill geometry for a gauge. Keeps no drawable handles; replacing the previous fill
/// is up to the caller.
#[derive(Debug, Clone, Copy)]
pub struct RenderPlanner {
    margin: f32,
}

impl RenderPlanner {
    pub fn new(margin: f32) -> Self {
        RenderPlanner {
            margin: margin.max(0.0),
        }
    }

    /// The filled part of `outline` for the given fill height. The bottom edge sits on the
    /// outline bottom and the sides are inset by the margin.
    pub fn plan(&self, outline: &Quad, fill_height: f32) -> Quad {
        let max_height = outline.height().max(0.0);
        let fill_height = if fill_height.is_nan() { 0.0 } else { fill_height.clamp(0.0, max_height) };

        let left = outline.left() + self.margin;
        let right = (outline.right() - self.margin).max(left);
        let bottom = outline.bottom() - self.margin;
        let top = (outline.bottom() - fill_height).min(bottom);

        Quad::from_edges(left, right, top, bottom)
    }
}

impl Default for RenderPlanner {
    fn default() -> Self {
        RenderPlanner::new(DEFAULT_FILL_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 0.001, "{} != {}", actual, expected);
    }

    #[test]
    fn test_layout_positions() {
        let layout = GaugeLayout::from_container(1000.0, 500.0);

        let left = layout.outline(Channel::Left);
        assert_close(left.left(), 250.0);
        assert_close(left.right(), 400.0);
        assert_close(left.top(), 100.0);
        assert_close(left.bottom(), 400.0);

        let right = layout.outline(Channel::Right);
        assert_close(right.left(), 650.0);
        assert_close(right.right(), 800.0);
        assert_close(right.height(), 300.0);
    }

    #[test]
    fn test_fill_is_inset_and_raised() {
        let layout = GaugeLayout::from_container(1000.0, 500.0);
        let fill = RenderPlanner::default().plan(layout.outline(Channel::Left), 90.0);

        assert_close(fill.left(), 255.0);
        assert_close(fill.right(), 395.0);
        assert_close(fill.bottom(), 395.0);
        assert_close(fill.top(), 310.0);
        assert_eq!(fill.bottom_left.x, fill.top_left.x);
        assert_eq!(fill.bottom_right.x, fill.top_right.x);
    }

    #[test]
    fn test_empty_fill_has_no_height() {
        let outline = Quad::from_edges(0.0, 100.0, 0.0, 200.0);
        let fill = RenderPlanner::default().plan(&outline, 0.0);
        assert_close(fill.height(), 0.0);
        assert_close(fill.bottom(), 195.0);

        let fill = RenderPlanner::default().plan(&outline, 2.0);
        assert_close(fill.height(), 0.0);
    }

    #[test]
    fn test_fill_never_leaves_outline() {
        let outline = Quad::from_edges(0.0, 100.0, 0.0, 200.0);
        let planner = RenderPlanner::default();

        for fill_height in [-10.0, 1e9, f32::NAN, f32::INFINITY] {
            let fill = planner.plan(&outline, fill_height);
            assert!(fill.top() >= outline.top());
            assert!(fill.bottom() <= outline.bottom());
            assert!(fill.height() >= 0.0);
        }
    }

    #[test]
    fn test_narrow_outline_does_not_invert() {
        let outline = Quad::from_edges(10.0, 16.0, 0.0, 100.0);
        let fill = RenderPlanner::default().plan(&outline, 50.0);
        assert!(fill.width() >= 0.0);
    }
}
