// Chart renderer for the live data-point window
//
// The renderer subscribes to the data-point buffer. Every snapshot it receives
// recomputes both scales and rebuilds the scene synchronously; the work is
// bounded by the window capacity.

pub mod curve;
pub mod scale;
pub mod scene;

pub use scale::{format_tick, LinearScale};
pub use scene::{
    Layer, Marker, PathCommand, Primitive, RenderBackend, Scene, Stroke, SvgBackend, TextAnchor,
    TooltipBox,
};

use crate::buffer::{BufferSnapshot, BufferSubscriber, DEFAULT_POINT_CAPACITY};
use crate::types::ChartPoint;
use chrono::Local;
use scene::{ANOMALY_COLOR, AXIS_COLOR, HOVER_OUTLINE, LINE_COLOR, NORMAL_COLOR};
use serde::{Deserialize, Serialize};

pub const NORMAL_RADIUS: f64 = 3.0;
pub const ANOMALY_RADIUS: f64 = 5.0;
pub const HOVER_GROWTH: f64 = 2.0;

/// Padding applied on each side of the y-domain when all values are equal
pub const ZERO_RANGE_PADDING: f64 = 0.5;

/// Fraction of the value range added above and below the data
const Y_PADDING_RATIO: f64 = 0.1;

const TICK_COUNT: usize = 10;
const TICK_SIZE: f64 = 6.0;
const TOOLTIP_OFFSET: (f64, f64) = (10.0, -20.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 30.0,
            bottom: 30.0,
            left: 40.0,
        }
    }
}

/// Chart dimensions and the fixed x-axis length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub width: f64,
    pub height: f64,
    pub margin: Margin,
    /// Points the x-axis is sized for, whether or not the buffer is full yet
    pub max_points: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            margin: Margin::default(),
            max_points: DEFAULT_POINT_CAPACITY,
        }
    }
}

impl ChartConfig {
    pub fn inner_width(&self, width: f64) -> f64 {
        (width - self.margin.left - self.margin.right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartScales {
    /// Buffer index to horizontal pixel
    pub x: LinearScale,
    /// Value to vertical pixel, inverted so larger values sit higher
    pub y: LinearScale,
}

/// Scales for the buffered points, or `None` when there is nothing to draw
pub fn compute_scales(
    points: &[ChartPoint],
    inner_width: f64,
    inner_height: f64,
    max_points: usize,
) -> Option<ChartScales> {
    if points.is_empty() {
        return None;
    }

    let x_max = max_points.max(points.len()) as f64;
    let x = LinearScale::new((0.0, x_max), (0.0, inner_width.max(0.0)));

    let (min, max) = points
        .iter()
        .map(ChartPoint::value)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let pad = if range == 0.0 {
        ZERO_RANGE_PADDING
    } else {
        range * Y_PADDING_RATIO
    };
    let y = LinearScale::new((min - pad, max + pad), (inner_height.max(0.0), 0.0));

    Some(ChartScales { x, y })
}

/// Tooltip shown while a marker is hovered
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub sequence_id: u64,
    pub left: f64,
    pub top: f64,
    pub value: String,
    pub time: String,
    pub kind: &'static str,
}

impl Tooltip {
    fn for_point(point: &ChartPoint, pointer: (f64, f64)) -> Self {
        Self {
            sequence_id: point.sequence_id,
            left: pointer.0 + TOOLTIP_OFFSET.0,
            top: pointer.1 + TOOLTIP_OFFSET.1,
            value: format!("{:.3}", point.value()),
            time: point
                .timestamp()
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            kind: if point.is_anomaly() { "Anomaly" } else { "Normal" },
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Value: {}", self.value),
            format!("Time: {}", self.time),
            format!("Type: {}", self.kind),
        ]
    }

    fn to_box(&self) -> TooltipBox {
        TooltipBox {
            left: self.left,
            top: self.top,
            lines: self.lines(),
        }
    }
}

/// Where the chart's container width comes from on resize
pub trait LayoutSource: Send {
    fn container_width(&self) -> Option<f64>;
}

impl<F> LayoutSource for F
where
    F: Fn() -> Option<f64> + Send,
{
    fn container_width(&self) -> Option<f64> {
        self()
    }
}

pub struct ChartRenderer {
    config: ChartConfig,
    width: f64,
    layout: Option<Box<dyn LayoutSource>>,
    points: Vec<ChartPoint>,
    scales: Option<ChartScales>,
    scene: Scene,
    hovered: Option<usize>,
    pointer: Option<(f64, f64)>,
    tooltip: Option<Tooltip>,
    redraws: u64,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            width: config.width,
            layout: None,
            points: Vec::new(),
            scales: None,
            scene: Scene::empty(config.width, config.height),
            hovered: None,
            pointer: None,
            tooltip: None,
            redraws: 0,
        }
    }

    pub fn with_layout<L: LayoutSource + 'static>(mut self, layout: L) -> Self {
        self.layout = Some(Box::new(layout));
        self
    }

    /// Replace the drawn points and redraw
    pub fn update(&mut self, points: &[ChartPoint]) {
        self.points.clear();
        self.points.extend_from_slice(points);
        self.redraw();
    }

    /// Re-read the container width, then rescale and redraw
    ///
    /// Height stays at the configured value. Returns the width in use.
    pub fn handle_resize(&mut self) -> f64 {
        let measured = self
            .layout
            .as_ref()
            .and_then(|layout| layout.container_width())
            .filter(|w| w.is_finite() && *w > 0.0);
        self.width = measured.unwrap_or(self.config.width);
        log::debug!("Chart resized to {}x{}", self.width, self.config.height);
        self.redraw();
        self.width
    }

    fn redraw(&mut self) {
        let inner_width = self.config.inner_width(self.width);
        let inner_height = self.config.inner_height();
        self.scales = compute_scales(&self.points, inner_width, inner_height, self.config.max_points);
        self.hovered = None;
        self.tooltip = None;
        self.scene = match self.scales {
            Some(scales) => self.build_scene(&scales, inner_width, inner_height),
            None => Scene::empty(self.width, self.config.height),
        };
        self.redraws += 1;

        // The markers were rebuilt, so resolve the hover again
        if let Some(pointer) = self.pointer {
            self.apply_hover(pointer);
        }
    }

    fn build_scene(&self, scales: &ChartScales, inner_width: f64, inner_height: f64) -> Scene {
        let axis_stroke = Stroke::new(AXIS_COLOR, 1.0);

        let mut x_axis = Layer::new("x-axis");
        x_axis.primitives.push(Primitive::Line {
            x1: 0.0,
            y1: inner_height,
            x2: inner_width,
            y2: inner_height,
            stroke: axis_stroke.clone(),
        });
        let x_step = scales.x.tick_step(TICK_COUNT);
        for tick in scales.x.ticks(TICK_COUNT) {
            let x = scales.x.apply(tick);
            x_axis.primitives.push(Primitive::Line {
                x1: x,
                y1: inner_height,
                x2: x,
                y2: inner_height + TICK_SIZE,
                stroke: axis_stroke.clone(),
            });
            x_axis.primitives.push(Primitive::Text {
                x,
                y: inner_height + TICK_SIZE + 12.0,
                content: format_tick(tick, x_step),
                anchor: TextAnchor::Middle,
            });
        }

        let mut y_axis = Layer::new("y-axis");
        let mut grid = Layer::new("grid").with_opacity(0.1);
        y_axis.primitives.push(Primitive::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: inner_height,
            stroke: axis_stroke.clone(),
        });
        let y_step = scales.y.tick_step(TICK_COUNT);
        for tick in scales.y.ticks(TICK_COUNT) {
            let y = scales.y.apply(tick);
            y_axis.primitives.push(Primitive::Line {
                x1: -TICK_SIZE,
                y1: y,
                x2: 0.0,
                y2: y,
                stroke: axis_stroke.clone(),
            });
            y_axis.primitives.push(Primitive::Text {
                x: -TICK_SIZE - 3.0,
                y: y + 3.0,
                content: format_tick(tick, y_step),
                anchor: TextAnchor::End,
            });
            grid.primitives.push(Primitive::Line {
                x1: 0.0,
                y1: y,
                x2: inner_width,
                y2: y,
                stroke: axis_stroke.clone(),
            });
        }

        let coords: Vec<(f64, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (scales.x.apply(i as f64), scales.y.apply(p.value())))
            .collect();

        let markers = self
            .points
            .iter()
            .zip(&coords)
            .map(|(p, &(cx, cy))| Marker {
                sequence_id: p.sequence_id,
                cx,
                cy,
                radius: base_radius(p.is_anomaly()),
                fill: fill_color(p.is_anomaly()),
                stroke: None,
                anomaly: p.is_anomaly(),
            })
            .collect();

        Scene {
            width: self.width,
            height: self.config.height,
            origin: (self.config.margin.left, self.config.margin.top),
            layers: vec![x_axis, y_axis],
            line: Some((curve::monotone_x(&coords), Stroke::new(LINE_COLOR, 1.5))),
            markers,
            grid: Some(grid),
            tooltip: None,
        }
    }

    /// Pointer moved to `(x, y)` in chart coordinates
    ///
    /// Returns the tooltip when the pointer is over a marker.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<&Tooltip> {
        self.pointer = Some((x, y));
        self.apply_hover((x, y));
        self.tooltip.as_ref()
    }

    /// Pointer left the chart: restore the hovered marker and hide the tooltip
    pub fn pointer_leave(&mut self) {
        self.pointer = None;
        self.clear_hover();
    }

    fn apply_hover(&mut self, pointer: (f64, f64)) {
        let local = (
            pointer.0 - self.config.margin.left,
            pointer.1 - self.config.margin.top,
        );
        // Last drawn marker is on top
        let hit = self
            .scene
            .markers
            .iter()
            .rposition(|m| m.contains(local.0, local.1));

        if hit != self.hovered {
            self.clear_hover();
            if let Some(index) = hit {
                let marker = &mut self.scene.markers[index];
                marker.radius = base_radius(marker.anomaly) + HOVER_GROWTH;
                marker.stroke = Some(Stroke::new(HOVER_OUTLINE, 2.0));
                self.hovered = Some(index);
            }
        }

        self.tooltip = self
            .hovered
            .and_then(|index| self.points.get(index))
            .map(|point| Tooltip::for_point(point, pointer));
        self.scene.tooltip = self.tooltip.as_ref().map(Tooltip::to_box);
    }

    fn clear_hover(&mut self) {
        if let Some(marker) = self.hovered.take().and_then(|i| self.scene.markers.get_mut(i)) {
            marker.radius = base_radius(marker.anomaly);
            marker.stroke = Some(Stroke::new(marker.fill, 1.0));
        }
        self.tooltip = None;
        self.scene.tooltip = None;
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.config.height
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn scales(&self) -> Option<&ChartScales> {
        self.scales.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn hovered_marker(&self) -> Option<&Marker> {
        self.hovered.and_then(|i| self.scene.markers.get(i))
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    pub fn to_svg(&self) -> String {
        self.scene.to_svg()
    }
}

impl BufferSubscriber<ChartPoint> for ChartRenderer {
    fn receive(&mut self, snapshot: &BufferSnapshot<'_, ChartPoint>) {
        self.update(snapshot.items);
    }
}

fn base_radius(anomaly: bool) -> f64 {
    if anomaly {
        ANOMALY_RADIUS
    } else {
        NORMAL_RADIUS
    }
}

fn fill_color(anomaly: bool) -> &'static str {
    if anomaly {
        ANOMALY_COLOR
    } else {
        NORMAL_COLOR
    }
}
