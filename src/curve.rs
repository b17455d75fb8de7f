//! Keyframed 1D curves with monotone cubic interpolation.
//!
//! Terracing needs a smooth remap of [0,1] onto itself that never
//! overshoots between control points. Tangents follow Fritsch–Carlson, so
//! monotone keyframes always produce a monotone curve, and collinear
//! keyframes reproduce the straight line exactly.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::heightfield::HeightField;

/// A control point of a curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Input coordinate.
    pub time: f32,
    /// Output value at `time`.
    pub value: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// A smooth curve through at least two keyframes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct Curve {
    keys: Vec<Keyframe>,
    tangents: Vec<f32>,
}

impl Curve {
    /// Build a curve from keyframes. Keys are sorted by time; duplicate
    /// times, non-finite values, and fewer than two keys are rejected.
    ///
    /// Terrace curves usually carry three or more keys, but two are accepted
    /// on purpose: a two-key curve is the straight line between them, which
    /// is the simplest band remap.
    pub fn new(mut keys: Vec<Keyframe>) -> Result<Self> {
        if keys.len() < 2 {
            return Err(TerrainError::InvalidParameter(format!(
                "curve needs at least 2 keyframes, got {}",
                keys.len()
            )));
        }
        if keys.iter().any(|k| !k.time.is_finite() || !k.value.is_finite()) {
            return Err(TerrainError::InvalidParameter(
                "curve keyframes must be finite".to_string(),
            ));
        }
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        if keys.windows(2).any(|w| w[1].time - w[0].time <= f32::EPSILON) {
            return Err(TerrainError::InvalidParameter(
                "curve keyframes must have distinct times".to_string(),
            ));
        }

        let tangents = fritsch_carlson_tangents(&keys);
        Ok(Self { keys, tangents })
    }

    /// Convenience constructor from `(time, value)` pairs.
    pub fn from_points(points: &[(f32, f32)]) -> Result<Self> {
        Self::new(points.iter().map(|&(t, v)| Keyframe::new(t, v)).collect())
    }

    /// y = x over [0,1], keyed at both ends and the midpoint.
    pub fn identity() -> Self {
        let keys = vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.5, 0.5),
            Keyframe::new(1.0, 1.0),
        ];
        let tangents = fritsch_carlson_tangents(&keys);
        Self { keys, tangents }
    }

    /// A terrace step: flat for most of the band, then a steep riser.
    /// `sharpness` in [0,1) moves the riser toward the end of the band.
    pub fn terrace_step(sharpness: f32) -> Self {
        let knee = 0.5 + 0.45 * sharpness.clamp(0.0, 0.99);
        let keys = vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(knee, 0.1 * (1.0 - sharpness.clamp(0.0, 0.99))),
            Keyframe::new(1.0, 1.0),
        ];
        let tangents = fritsch_carlson_tangents(&keys);
        Self { keys, tangents }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Value at the last keyframe; used when extrapolating past the end.
    pub fn tail_value(&self) -> f32 {
        self.keys[self.keys.len() - 1].value
    }

    /// Evaluate the curve. Inputs outside the key range clamp to the end values.
    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; segment is [seg, seg + 1].
        let seg = self.keys.partition_point(|k| k.time <= t) - 1;
        let k0 = self.keys[seg];
        let k1 = self.keys[seg + 1];
        let h = k1.time - k0.time;
        let s = (t - k0.time) / h;

        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * k0.value
            + h10 * h * self.tangents[seg]
            + h01 * k1.value
            + h11 * h * self.tangents[seg + 1]
    }
}

impl TryFrom<Vec<Keyframe>> for Curve {
    type Error = TerrainError;

    fn try_from(keys: Vec<Keyframe>) -> Result<Self> {
        Curve::new(keys)
    }
}

impl From<Curve> for Vec<Keyframe> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}

/// A set of terrace bands: ascending start heights, each with its own
/// shaping curve. Serializable so band sets can live in config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerraceBands {
    pub starts: Vec<f32>,
    pub curves: Vec<Curve>,
}

impl TerraceBands {
    pub fn new(starts: Vec<f32>, curves: Vec<Curve>) -> Result<Self> {
        let bands = Self { starts, curves };
        // Validate once up front by terracing a single sample.
        HeightField::new(1, 1).quantize_bands(&bands.starts, &bands.curves)?;
        Ok(bands)
    }

    /// `count` equal-height bands sharing one step curve.
    pub fn uniform(count: usize, sharpness: f32) -> Result<Self> {
        if count == 0 {
            return Err(TerrainError::InvalidParameter(
                "terracing needs at least one band".to_string(),
            ));
        }
        let starts = (0..count).map(|k| k as f32 / count as f32).collect();
        let curves = vec![Curve::terrace_step(sharpness); count];
        Self::new(starts, curves)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn apply(&self, field: &mut HeightField) -> Result<()> {
        field.quantize_bands(&self.starts, &self.curves)?;
        Ok(())
    }
}

fn fritsch_carlson_tangents(keys: &[Keyframe]) -> Vec<f32> {
    let n = keys.len();
    let secants: Vec<f32> = keys
        .windows(2)
        .map(|w| (w[1].value - w[0].value) / (w[1].time - w[0].time))
        .collect();

    let mut m = vec![0.0f32; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        let (a, b) = (secants[k - 1], secants[k]);
        m[k] = if a * b <= 0.0 { 0.0 } else { (a + b) * 0.5 };
    }

    // Limit tangents so each segment stays monotone.
    for k in 0..n - 1 {
        let d = secants[k];
        if d.abs() < f32::EPSILON {
            m[k] = 0.0;
            m[k + 1] = 0.0;
            continue;
        }
        let a = m[k] / d;
        let b = m[k + 1] / d;
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            m[k] = tau * a * d;
            m[k + 1] = tau * b * d;
        }
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_reproduces_input() {
        let curve = Curve::identity();
        for i in 0..=20 {
            let t = i as f32 / 20.0;
            assert!((curve.evaluate(t) - t).abs() < 1e-5, "t = {}", t);
        }
    }

    #[test]
    fn test_passes_through_keys() {
        let curve = Curve::from_points(&[(0.0, 0.0), (0.3, 0.7), (1.0, 1.0)]).unwrap();
        assert!((curve.evaluate(0.3) - 0.7).abs() < 1e-6);
        assert!((curve.evaluate(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_monotone_data_stays_monotone() {
        let curve = Curve::from_points(&[(0.0, 0.0), (0.1, 0.8), (0.2, 0.85), (1.0, 1.0)]).unwrap();
        let mut prev = curve.evaluate(0.0);
        for i in 1..=200 {
            let v = curve.evaluate(i as f32 / 200.0);
            assert!(v >= prev - 1e-6, "curve decreased at step {}", i);
            assert!(v <= 1.0 + 1e-6);
            prev = v;
        }
    }

    #[test]
    fn test_clamps_outside_range() {
        let curve = Curve::from_points(&[(0.2, 0.1), (0.8, 0.9)]).unwrap();
        assert_eq!(curve.evaluate(-1.0), 0.1);
        assert_eq!(curve.evaluate(2.0), 0.9);
        assert_eq!(curve.tail_value(), 0.9);
    }

    #[test]
    fn test_two_keys_make_a_straight_line() {
        let curve = Curve::from_points(&[(0.0, 0.2), (1.0, 0.6)]).unwrap();
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!((curve.evaluate(t) - (0.2 + 0.4 * t)).abs() < 1e-5, "t = {}", t);
        }
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(Curve::from_points(&[(0.0, 0.0)]).is_err());
        assert!(Curve::from_points(&[(0.5, 0.0), (0.5, 1.0)]).is_err());
        assert!(Curve::from_points(&[(0.0, f32::NAN), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_unsorted_keys_are_sorted() {
        let curve = Curve::from_points(&[(1.0, 1.0), (0.0, 0.0), (0.5, 0.5)]).unwrap();
        assert_eq!(curve.keys()[0].time, 0.0);
        assert!((curve.evaluate(0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_tangents() {
        let curve = Curve::terrace_step(0.5);
        let json = serde_json::to_string(&curve).unwrap();
        let back: Curve = serde_json::from_str(&json).unwrap();
        assert_eq!(curve, back);
    }

    #[test]
    fn test_uniform_bands_make_flat_steps() {
        let bands = TerraceBands::uniform(4, 0.9).unwrap();
        assert_eq!(bands.len(), 4);

        let mut field = HeightField::from_fn(2, 1, |x, _| [0.26, 0.30][x]);
        bands.apply(&mut field).unwrap();
        // Both samples sit early in band 1, on the flat tread.
        assert!((field.get(0, 0) - field.get(1, 0)).abs() < 0.01);
        assert!(field.get(0, 0) >= 0.25);
    }

    #[test]
    fn test_bands_reject_mismatch() {
        assert!(TerraceBands::new(vec![0.0, 0.5], vec![Curve::identity()]).is_err());
        assert!(TerraceBands::new(vec![0.5, 0.2], vec![Curve::identity(); 2]).is_err());
        assert!(TerraceBands::uniform(0, 0.5).is_err());
    }
}
