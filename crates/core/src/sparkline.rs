use serde::Serialize;

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

fn bounds(trend: &[f64]) -> (f64, f64) {
    let (min, max) = trend
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    // A flat series would divide by zero.
    (min, if range == 0.0 { 1.0 } else { range })
}

pub fn project(trend: &[f64], width: f64, height: f64) -> Vec<Point> {
    let n = trend.len();
    if n <= 1 {
        return Vec::new();
    }

    let (min, range) = bounds(trend);
    let step = width / (n - 1) as f64;
    trend
        .iter()
        .enumerate()
        .map(|(i, &v)| Point {
            x: i as f64 * step,
            y: height - ((v - min) / range) * height,
        })
        .collect()
}

pub fn polyline(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn bars(trend: &[f64]) -> String {
    if trend.len() <= 1 {
        return String::new();
    }

    let (min, range) = bounds(trend);
    let top = (BARS.len() - 1) as f64;
    trend
        .iter()
        .map(|&v| BARS[(((v - min) / range) * top).round().clamp(0.0, top) as usize])
        .collect()
}
