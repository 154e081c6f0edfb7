// Backend-neutral drawing primitives for the chart
//
// The renderer builds a `Scene` and any `RenderBackend` can replay it. The
// bundled `SvgBackend` writes a standalone SVG document.

use std::fmt::Write;

pub const LINE_COLOR: &str = "#3b82f6";
pub const NORMAL_COLOR: &str = "#3b82f6";
pub const ANOMALY_COLOR: &str = "#ef4444";
pub const HOVER_OUTLINE: &str = "#000";
pub const AXIS_COLOR: &str = "currentColor";

/// One segment of a path, in pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Two control points followed by the end point
    CubicTo(f64, f64, f64, f64, f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: &'static str,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: &'static str, width: f64) -> Self {
        Self { color, width }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    fn as_str(&self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// A circle drawn for one buffered point
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub sequence_id: u64,
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
    pub fill: &'static str,
    pub stroke: Option<Stroke>,
    pub anomaly: bool,
}

impl Marker {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: Stroke,
    },
    Text {
        x: f64,
        y: f64,
        content: String,
        anchor: TextAnchor,
    },
}

/// A tooltip box in page coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipBox {
    pub left: f64,
    pub top: f64,
    pub lines: Vec<String>,
}

/// A styled group of primitives inside the plot area
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub class: &'static str,
    pub opacity: f64,
    pub primitives: Vec<Primitive>,
}

impl Layer {
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            opacity: 1.0,
            primitives: Vec::new(),
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    /// Offset of the plot area inside the frame (left and top margins)
    pub origin: (f64, f64),
    pub layers: Vec<Layer>,
    pub line: Option<(Vec<PathCommand>, Stroke)>,
    pub markers: Vec<Marker>,
    pub grid: Option<Layer>,
    pub tooltip: Option<TooltipBox>,
}

impl Scene {
    pub fn empty(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.line.is_none() && self.markers.is_empty()
    }

    /// Replay the scene: axes, line, markers, grid, then the tooltip
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        backend.begin_frame(self.width, self.height);
        backend.begin_group("plot", self.origin, 1.0);

        for layer in &self.layers {
            draw_layer(backend, layer);
        }
        if let Some((commands, stroke)) = &self.line {
            backend.draw_path(commands, stroke);
        }
        for marker in &self.markers {
            backend.draw_circle(marker);
        }
        if let Some(grid) = &self.grid {
            draw_layer(backend, grid);
        }

        backend.end_group();
        if let Some(tooltip) = &self.tooltip {
            backend.draw_tooltip(tooltip);
        }
        backend.end_frame();
    }

    pub fn to_svg(&self) -> String {
        let mut backend = SvgBackend::new();
        self.render(&mut backend);
        backend.finish()
    }
}

fn draw_layer<B: RenderBackend + ?Sized>(backend: &mut B, layer: &Layer) {
    backend.begin_group(layer.class, (0.0, 0.0), layer.opacity);
    for primitive in &layer.primitives {
        match primitive {
            Primitive::Line {
                x1,
                y1,
                x2,
                y2,
                stroke,
            } => backend.draw_line((*x1, *y1), (*x2, *y2), stroke),
            Primitive::Text {
                x,
                y,
                content,
                anchor,
            } => backend.draw_text((*x, *y), content, *anchor),
        }
    }
    backend.end_group();
}

/// Drawing surface a `Scene` can be replayed onto
pub trait RenderBackend {
    fn begin_frame(&mut self, width: f64, height: f64);
    fn begin_group(&mut self, class: &str, translate: (f64, f64), opacity: f64);
    fn end_group(&mut self);
    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &Stroke);
    fn draw_path(&mut self, commands: &[PathCommand], stroke: &Stroke);
    fn draw_circle(&mut self, marker: &Marker);
    fn draw_text(&mut self, at: (f64, f64), content: &str, anchor: TextAnchor);
    fn draw_tooltip(&mut self, tooltip: &TooltipBox);
    fn end_frame(&mut self);
}

/// Writes a scene out as an SVG document
#[derive(Debug, Default)]
pub struct SvgBackend {
    out: String,
    depth: usize,
}

impl SvgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }
}

impl RenderBackend for SvgBackend {
    fn begin_frame(&mut self, width: f64, height: f64) {
        let _ = writeln!(
            self.out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = num(width),
            h = num(height)
        );
        self.depth = 1;
    }

    fn begin_group(&mut self, class: &str, translate: (f64, f64), opacity: f64) {
        self.indent();
        let _ = write!(self.out, r#"<g class="{}""#, escape(class));
        if translate != (0.0, 0.0) {
            let _ = write!(
                self.out,
                r#" transform="translate({},{})""#,
                num(translate.0),
                num(translate.1)
            );
        }
        if opacity < 1.0 {
            let _ = write!(self.out, r#" opacity="{}""#, num(opacity));
        }
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn end_group(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</g>\n");
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &Stroke) {
        self.indent();
        let _ = writeln!(
            self.out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            num(from.0),
            num(from.1),
            num(to.0),
            num(to.1),
            stroke.color,
            num(stroke.width)
        );
    }

    fn draw_path(&mut self, commands: &[PathCommand], stroke: &Stroke) {
        self.indent();
        let _ = writeln!(
            self.out,
            r#"<path class="line" d="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
            path_data(commands),
            stroke.color,
            num(stroke.width)
        );
    }

    fn draw_circle(&mut self, marker: &Marker) {
        self.indent();
        let _ = write!(
            self.out,
            r#"<circle class="dot" data-id="{}" cx="{}" cy="{}" r="{}" fill="{}""#,
            marker.sequence_id,
            num(marker.cx),
            num(marker.cy),
            num(marker.radius),
            marker.fill
        );
        if let Some(stroke) = &marker.stroke {
            let _ = write!(
                self.out,
                r#" stroke="{}" stroke-width="{}""#,
                stroke.color,
                num(stroke.width)
            );
        }
        self.out.push_str("/>\n");
    }

    fn draw_text(&mut self, at: (f64, f64), content: &str, anchor: TextAnchor) {
        self.indent();
        let _ = writeln!(
            self.out,
            r#"<text x="{}" y="{}" text-anchor="{}" font-size="10">{}</text>"#,
            num(at.0),
            num(at.1),
            anchor.as_str(),
            escape(content)
        );
    }

    fn draw_tooltip(&mut self, tooltip: &TooltipBox) {
        self.indent();
        let _ = writeln!(
            self.out,
            r#"<g class="tooltip" transform="translate({},{})">"#,
            num(tooltip.left),
            num(tooltip.top)
        );
        self.depth += 1;
        self.indent();
        let _ = writeln!(
            self.out,
            r#"<rect width="140" height="{}" rx="4" fill="white" stroke="{}"/>"#,
            num(8.0 + 14.0 * tooltip.lines.len() as f64),
            HOVER_OUTLINE
        );
        for (i, line) in tooltip.lines.iter().enumerate() {
            self.indent();
            let _ = writeln!(
                self.out,
                r#"<text x="6" y="{}" font-size="11">{}</text>"#,
                num(16.0 + 14.0 * i as f64),
                escape(line)
            );
        }
        self.depth -= 1;
        self.indent();
        self.out.push_str("</g>\n");
    }

    fn end_frame(&mut self) {
        self.depth = 0;
        self.out.push_str("</svg>\n");
    }
}

/// SVG path data for a list of commands
pub fn path_data(commands: &[PathCommand]) -> String {
    let mut d = String::new();
    for command in commands {
        match *command {
            PathCommand::MoveTo(x, y) => {
                let _ = write!(d, "M{},{}", num(x), num(y));
            }
            PathCommand::LineTo(x, y) => {
                let _ = write!(d, "L{},{}", num(x), num(y));
            }
            PathCommand::CubicTo(x1, y1, x2, y2, x, y) => {
                let _ = write!(
                    d,
                    "C{},{},{},{},{},{}",
                    num(x1),
                    num(y1),
                    num(x2),
                    num(y2),
                    num(x),
                    num(y)
                );
            }
        }
    }
    d
}

/// Up to three decimals, trailing zeros trimmed
fn num(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" || text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
