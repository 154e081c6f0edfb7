// Monotone cubic interpolation in x (Steffen, 1990)
//
// Produces a smooth path through points with increasing x that never
// overshoots between neighbouring samples: a local extremum in the data stays
// the extremum of the drawn curve.

use crate::chart::scene::PathCommand;

/// Build the path commands for a monotone-x curve through `points`
pub fn monotone_x(points: &[(f64, f64)]) -> Vec<PathCommand> {
    let mut curve = MonotoneX::default();
    for &(x, y) in points {
        curve.point(x, y);
    }
    curve.finish()
}

#[derive(Default)]
struct MonotoneX {
    commands: Vec<PathCommand>,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    t0: f64,
    seen: u8,
}

fn sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

impl MonotoneX {
    fn point(&mut self, x: f64, y: f64) {
        if self.seen > 0 && x == self.x1 && y == self.y1 {
            return;
        }

        let mut t1 = f64::NAN;
        match self.seen {
            0 => {
                self.seen = 1;
                self.commands.push(PathCommand::MoveTo(x, y));
            }
            1 => self.seen = 2,
            2 => {
                self.seen = 3;
                t1 = self.slope3(x, y);
                let t0 = self.slope2(t1);
                self.bezier(t0, t1);
            }
            _ => {
                t1 = self.slope3(x, y);
                self.bezier(self.t0, t1);
            }
        }

        self.x0 = self.x1;
        self.x1 = x;
        self.y0 = self.y1;
        self.y1 = y;
        self.t0 = t1;
    }

    fn finish(mut self) -> Vec<PathCommand> {
        match self.seen {
            2 => self.commands.push(PathCommand::LineTo(self.x1, self.y1)),
            3 => {
                let t1 = self.slope2(self.t0);
                self.bezier(self.t0, t1);
            }
            _ => {}
        }
        self.commands
    }

    /// Tangent at (x1, y1) given the next point (x2, y2)
    fn slope3(&self, x2: f64, y2: f64) -> f64 {
        let h0 = self.x1 - self.x0;
        let h1 = x2 - self.x1;
        let s0 = (self.y1 - self.y0) / nonzero_or_signed_zero(h0, h1);
        let s1 = (y2 - self.y1) / nonzero_or_signed_zero(h1, h0);
        let p = (s0 * h1 + s1 * h0) / (h0 + h1);
        let t = (sign(s0) + sign(s1)) * s0.abs().min(s1.abs()).min(0.5 * p.abs());
        if t.is_nan() {
            0.0
        } else {
            t
        }
    }

    /// One-sided tangent at an end point
    fn slope2(&self, t: f64) -> f64 {
        let h = self.x1 - self.x0;
        if h != 0.0 {
            (3.0 * (self.y1 - self.y0) / h - t) / 2.0
        } else {
            t
        }
    }

    fn bezier(&mut self, t0: f64, t1: f64) {
        let dx = (self.x1 - self.x0) / 3.0;
        self.commands.push(PathCommand::CubicTo(
            self.x0 + dx,
            self.y0 + dx * t0,
            self.x1 - dx,
            self.y1 - dx * t1,
            self.x1,
            self.y1,
        ));
    }
}

fn nonzero_or_signed_zero(h: f64, other: f64) -> f64 {
    if h != 0.0 {
        h
    } else if other < 0.0 {
        -0.0
    } else {
        0.0
    }
}
