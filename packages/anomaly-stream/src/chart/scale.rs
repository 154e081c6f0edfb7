// Linear scales and "nice" tick generation

/// Linear map from a data domain to a pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Map a domain value to the range
    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / span * (r1 - r0)
    }

    /// Map a range value back to the domain
    pub fn invert(&self, pixel: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = r1 - r0;
        if span == 0.0 {
            return (d0 + d1) / 2.0;
        }
        d0 + (pixel - r0) / span * (d1 - d0)
    }

    /// Roughly `count` evenly spaced round values inside the domain
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (d0, d1) = self.domain;
        let (start, stop) = if d0 <= d1 { (d0, d1) } else { (d1, d0) };
        ticks(start, stop, count)
    }

    /// Spacing between the values `ticks(count)` returns
    pub fn tick_step(&self, count: usize) -> f64 {
        let (d0, d1) = self.domain;
        tick_step(d0.min(d1), d0.max(d1), count)
    }
}

const E10: f64 = 7.0710678118654755; // sqrt(50)
const E5: f64 = 3.1622776601683795; // sqrt(10)
const E2: f64 = std::f64::consts::SQRT_2;

/// (first index, last index, increment); a negative increment means divide
fn tick_spec(start: f64, stop: f64, count: f64) -> (f64, f64, f64) {
    let step = (stop - start) / count.max(0.0);
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= E10 {
        10.0
    } else if error >= E5 {
        5.0
    } else if error >= E2 {
        2.0
    } else {
        1.0
    };

    let (mut i1, mut i2, inc);
    if power < 0.0 {
        let scale = 10f64.powf(-power) / factor;
        i1 = (start * scale).round();
        i2 = (stop * scale).round();
        if i1 / scale < start {
            i1 += 1.0;
        }
        if i2 / scale > stop {
            i2 -= 1.0;
        }
        inc = -scale;
    } else {
        let scale = 10f64.powf(power) * factor;
        i1 = (start / scale).round();
        i2 = (stop / scale).round();
        if i1 * scale < start {
            i1 += 1.0;
        }
        if i2 * scale > stop {
            i2 -= 1.0;
        }
        inc = scale;
    }

    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_spec(start, stop, count * 2.0);
    }
    (i1, i2, inc)
}

/// Nice ticks over an ascending interval
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }

    let (i1, i2, inc) = tick_spec(start, stop, count as f64);
    if i2 < i1 || !inc.is_finite() {
        return Vec::new();
    }

    let n = (i2 - i1 + 1.0) as usize;
    (0..n)
        .map(|i| {
            let k = i1 + i as f64;
            if inc < 0.0 {
                k / -inc
            } else {
                k * inc
            }
        })
        .collect()
}

/// Distance between consecutive ticks for `ticks(start, stop, count)`
pub fn tick_step(start: f64, stop: f64, count: usize) -> f64 {
    if count == 0 || start >= stop || !start.is_finite() || !stop.is_finite() {
        return 0.0;
    }
    let (_, _, inc) = tick_spec(start, stop, count as f64);
    if inc < 0.0 {
        1.0 / -inc
    } else {
        inc
    }
}

/// Format a tick label with just enough decimals for its step
pub fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step > 0.0 && step < 1.0 {
        (-step.log10().floor()) as usize
    } else {
        0
    };
    let text = format!("{:.*}", decimals, value);
    // Avoid "-0" for values that round to zero
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_apply_and_invert() {
        let scale = LinearScale::new((0.0, 100.0), (0.0, 730.0));
        assert!(approx(scale.apply(0.0), 0.0));
        assert!(approx(scale.apply(50.0), 365.0));
        assert!(approx(scale.apply(100.0), 730.0));
        assert!(approx(scale.invert(365.0), 50.0));
    }

    #[test]
    fn test_inverted_range() {
        let scale = LinearScale::new((0.8, 3.2), (250.0, 0.0));
        assert!(approx(scale.apply(0.8), 250.0));
        assert!(approx(scale.apply(3.2), 0.0));
        assert!(scale.apply(3.0) < scale.apply(1.0));
    }

    #[test]
    fn test_degenerate_domain_maps_to_middle() {
        let scale = LinearScale::new((1.0, 1.0), (0.0, 200.0));
        assert!(approx(scale.apply(1.0), 100.0));
    }

    #[test]
    fn test_ticks_match_round_numbers() {
        assert_eq!(
            ticks(0.0, 100.0, 10),
            vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
        );
        assert_eq!(ticks(0.0, 1.0, 5), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        assert_eq!(
            ticks(0.8, 3.2, 10),
            vec![0.8, 1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.2, 2.4, 2.6, 2.8, 3.0, 3.2]
        );
        assert_eq!(ticks(-2.7, 2.3, 5), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_ticks_edge_cases() {
        assert!(ticks(0.0, 1.0, 0).is_empty());
        assert_eq!(ticks(2.0, 2.0, 10), vec![2.0]);
        assert!(ticks(f64::NAN, 1.0, 10).is_empty());
    }

    #[test]
    fn test_tick_step_and_format() {
        assert!(approx(tick_step(0.0, 100.0, 10), 10.0));
        assert!(approx(tick_step(0.8, 3.2, 10), 0.2));
        assert_eq!(format_tick(1.5, 0.5), "1.5");
        assert_eq!(format_tick(40.0, 10.0), "40");
        assert_eq!(format_tick(0.25, 0.05), "0.25");
        assert_eq!(format_tick(-0.0001, 0.5), "0.0");
    }
}
