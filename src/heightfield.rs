//! Normalized height fields and their filter primitives.
//!
//! A [`HeightField`] is a W×D grid of samples in [0,1] plus the
//! [`WorldScale`] needed to convert them to metres. Every filter mutates in
//! place and returns `&mut Self` so calls chain; callers that need the
//! pre-image take a [`HeightField::duplicate`] first.
//! [`HeightField::apply_masked`] packages that pattern for mask gating.
//!
//! After any operation every sample is finite and inside [0,1].
//!
//! Binary operations accept operands of a different resolution. The operand
//! is then read at the same normalized position with bilinear interpolation,
//! corner-aligned: sample `(x, z)` of a W×D target maps to
//! `u = x / (W - 1)`, `v = z / (D - 1)`, which lands exactly on the operand's
//! corner samples. Equal sizes therefore read the operand cell for cell.

use crate::curve::Curve;
use crate::error::{Result, TerrainError};
use crate::scale::WorldScale;
use crate::tilemap::{Tilemap, DIR_OFFSETS};

/// Clamp into [0,1] and map NaN to 0.
#[inline]
pub(crate) fn sanitize(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Summary statistics of a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

/// A grid of normalized terrain heights.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    heights: Tilemap<f32>,
    scale: WorldScale,
}

impl HeightField {
    /// Create a flat field at height 0 with the default world scale.
    ///
    /// # Panics
    /// Panics if `width` or `depth` is zero.
    pub fn new(width: usize, depth: usize) -> Self {
        Self::new_with(width, depth, 0.0)
    }

    /// Create a field filled with `value`.
    ///
    /// # Panics
    /// Panics if `width` or `depth` is zero.
    pub fn new_with(width: usize, depth: usize, value: f32) -> Self {
        assert!(width > 0 && depth > 0, "height field must be at least 1x1");
        Self {
            heights: Tilemap::new_with(width, depth, sanitize(value)),
            scale: WorldScale::default(),
        }
    }

    /// Build a field by evaluating `f(x, z)` at every sample.
    ///
    /// # Panics
    /// Panics if `width` or `depth` is zero.
    pub fn from_fn(width: usize, depth: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        assert!(width > 0 && depth > 0, "height field must be at least 1x1");
        Self {
            heights: Tilemap::from_fn(width, depth, |x, z| sanitize(f(x, z))),
            scale: WorldScale::default(),
        }
    }

    /// Wrap a row-major buffer of `width * depth` samples. Values are clamped
    /// into [0,1].
    pub fn from_vec(width: usize, depth: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || depth == 0 {
            return Err(TerrainError::InvalidParameter(format!(
                "height field must be at least 1x1, got {}x{}",
                width, depth
            )));
        }
        let len = data.len();
        let mut heights = Tilemap::from_vec(width, depth, data).ok_or_else(|| {
            TerrainError::InvalidParameter(format!(
                "expected {} samples for {}x{}, got {}",
                width * depth,
                width,
                depth,
                len
            ))
        })?;
        for v in heights.as_mut_slice() {
            *v = sanitize(*v);
        }
        Ok(Self {
            heights,
            scale: WorldScale::default(),
        })
    }

    /// Builder-style setter for the world scale.
    pub fn with_scale(mut self, scale: WorldScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn width(&self) -> usize {
        self.heights.width
    }

    pub fn depth(&self) -> usize {
        self.heights.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.depth())
    }

    pub fn scale(&self) -> WorldScale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: WorldScale) {
        self.scale = scale;
    }

    /// Samples in row-major order (rows along X, one row per Z).
    pub fn as_slice(&self) -> &[f32] {
        self.heights.as_slice()
    }

    pub fn tilemap(&self) -> &Tilemap<f32> {
        &self.heights
    }

    pub fn get(&self, x: usize, z: usize) -> f32 {
        *self.heights.get(x, z)
    }

    /// Read with signed coordinates, clamping to the border.
    pub fn get_clamped(&self, x: i32, z: i32) -> f32 {
        *self.heights.get_clamped(x, z)
    }

    pub fn set(&mut self, x: usize, z: usize, value: f32) {
        self.heights.set(x, z, sanitize(value));
    }

    /// Bilinear lookup at normalized coordinates; `(0,0)` and `(1,1)` are the
    /// corner samples. Inputs outside [0,1] clamp.
    pub fn sample_normalized(&self, u: f32, v: f32) -> f32 {
        let fx = u.clamp(0.0, 1.0) * (self.width() - 1) as f32;
        let fz = v.clamp(0.0, 1.0) * (self.depth() - 1) as f32;
        self.heights.sample_bilinear(fx, fz)
    }

    /// Normalized coordinate of sample `(x, z)`.
    fn normalized_coord(&self, x: usize, z: usize) -> (f32, f32) {
        let u = if self.width() > 1 {
            x as f32 / (self.width() - 1) as f32
        } else {
            0.0
        };
        let v = if self.depth() > 1 {
            z as f32 / (self.depth() - 1) as f32
        } else {
            0.0
        };
        (u, v)
    }

    /// Value of `operand` at the position of our sample `(x, z)`.
    fn operand_at(&self, operand: &HeightField, x: usize, z: usize) -> f32 {
        if operand.dimensions() == self.dimensions() {
            operand.get(x, z)
        } else {
            let (u, v) = self.normalized_coord(x, z);
            operand.sample_normalized(u, v)
        }
    }

    fn note_resample(&self, operand: &HeightField, what: &str) {
        if operand.dimensions() != self.dimensions() {
            tracing::debug!(
                "resampling {} {}x{} onto {}x{}",
                what,
                operand.width(),
                operand.depth(),
                self.width(),
                self.depth()
            );
        }
    }

    /// Produce a copy of this field at a new resolution.
    ///
    /// # Panics
    /// Panics if `width` or `depth` is zero.
    pub fn resample(&self, width: usize, depth: usize) -> HeightField {
        let target = HeightField::new(width, depth);
        let heights = Tilemap::from_fn(width, depth, |x, z| target.operand_at(self, x, z));
        HeightField {
            heights,
            scale: self.scale,
        }
    }

    /// Minimum, maximum, and mean of all samples.
    pub fn stats(&self) -> FieldStats {
        let (min, max) = self.heights.min_max();
        let mean = (self.heights.sum() / self.heights.len() as f64) as f32;
        FieldStats { min, max, mean }
    }

    /// Replace all samples from a working buffer of the same size, clamping
    /// each into [0,1]. Simulations run on raw buffers and commit through this.
    pub(crate) fn overwrite(&mut self, samples: &[f32]) {
        debug_assert_eq!(samples.len(), self.heights.len());
        for (dst, &src) in self.heights.as_mut_slice().iter_mut().zip(samples) {
            *dst = sanitize(src);
        }
    }

    fn map_in_place(&mut self, mut f: impl FnMut(f32) -> f32) -> &mut Self {
        for v in self.heights.as_mut_slice() {
            *v = sanitize(f(*v));
        }
        self
    }

    // =========================================================================
    // ARITHMETIC
    // =========================================================================

    /// Deep copy.
    pub fn duplicate(&self) -> HeightField {
        self.clone()
    }

    /// Fill with a constant height.
    pub fn set_height(&mut self, height: f32) -> &mut Self {
        self.heights.fill(sanitize(height));
        self
    }

    /// y' = clamp(y·k, lo, hi). The bounds are themselves limited to [0,1].
    pub fn multiply_clamped(&mut self, k: f32, lo: f32, hi: f32) -> &mut Self {
        let (lo, hi) = clamp_bounds(lo, hi);
        self.map_in_place(|y| (y * k).clamp(lo, hi))
    }

    /// y' = clamp(y + k, lo, hi).
    pub fn add_clamped(&mut self, k: f32, lo: f32, hi: f32) -> &mut Self {
        let (lo, hi) = clamp_bounds(lo, hi);
        self.map_in_place(|y| (y + k).clamp(lo, hi))
    }

    /// y' = clamp(y - k, lo, hi).
    pub fn subtract_clamped(&mut self, k: f32, lo: f32, hi: f32) -> &mut Self {
        let (lo, hi) = clamp_bounds(lo, hi);
        self.map_in_place(|y| (y - k).clamp(lo, hi))
    }

    /// y' = y^exp.
    pub fn power(&mut self, exp: f32) -> &mut Self {
        self.map_in_place(|y| y.powf(exp))
    }

    /// Midpoint-centred contrast: y' = (y - 0.5)·c + 0.5.
    pub fn contrast(&mut self, c: f32) -> &mut Self {
        self.map_in_place(|y| (y - 0.5) * c + 0.5)
    }

    /// Uniform terracing: y' = floor(y / step)·step. A non-positive step is a no-op.
    pub fn quantize(&mut self, step: f32) -> &mut Self {
        if !(step > 0.0) {
            return self;
        }
        self.map_in_place(|y| (y / step).floor() * step)
    }

    /// Multi-band terracing.
    ///
    /// `starts` are the ascending band start heights; band `k` spans
    /// `[starts[k], starts[k + 1])`, the last band ends at 1. A sample is
    /// mapped to `t` in [0,1] within its band, remapped through `curves[k]`,
    /// and mapped back into the band. Samples below the first start are
    /// treated as `t = 0` of band 0; samples at or past the end of the last
    /// band take that band's tail value.
    pub fn quantize_bands(&mut self, starts: &[f32], curves: &[Curve]) -> Result<&mut Self> {
        validate_bands(starts, curves)?;

        let n = starts.len();
        Ok(self.map_in_place(|y| {
            let k = starts.partition_point(|&s| s <= y).saturating_sub(1);
            let start = starts[k];
            let end = if k + 1 < n { starts[k + 1] } else { 1.0 };
            let span = end - start;
            if span <= f32::EPSILON {
                return start;
            }
            let t = ((y - start) / span).clamp(0.0, 1.0);
            let shaped = if t >= 1.0 {
                curves[k].tail_value()
            } else {
                curves[k].evaluate(t)
            };
            start + shaped * span
        }))
    }

    /// y' = 1 - y.
    pub fn invert(&mut self) -> &mut Self {
        self.map_in_place(|y| 1.0 - y)
    }

    /// Linear rescale so the minimum becomes 0 and the maximum 1.
    /// A constant field is left unchanged.
    pub fn normalise(&mut self) -> &mut Self {
        let (min_v, max_v) = self.heights.min_max();
        let range = max_v - min_v;
        if range <= f32::EPSILON {
            return self;
        }
        self.map_in_place(|y| (y - min_v) / range)
    }

    /// Transpose X and Z. Matches engines that store heights as `[z][x]`.
    pub fn flip(&mut self) -> &mut Self {
        self.heights = self.heights.transpose();
        self.scale = WorldScale::new(self.scale.size_z, self.scale.size_x, self.scale.height);
        self
    }

    /// y' = lerp(y, other.y, mask.y) per sample; `other` and `mask` are
    /// resampled when their resolution differs.
    pub fn lerp(&mut self, other: &HeightField, mask: &HeightField) -> &mut Self {
        self.note_resample(other, "lerp operand");
        self.note_resample(mask, "mask");
        let width = self.width();
        let depth = self.depth();
        for z in 0..depth {
            for x in 0..width {
                let m = self.operand_at(mask, x, z);
                let o = self.operand_at(other, x, z);
                let y = self.get(x, z);
                self.heights.set(x, z, sanitize(y * (1.0 - m) + o * m));
            }
        }
        self
    }

    /// Combine with `other` sample by sample, resampling `other` if needed.
    pub fn combine(&mut self, other: &HeightField, f: impl Fn(f32, f32) -> f32) -> &mut Self {
        self.note_resample(other, "operand");
        let width = self.width();
        let depth = self.depth();
        for z in 0..depth {
            for x in 0..width {
                let o = self.operand_at(other, x, z);
                let y = self.get(x, z);
                self.heights.set(x, z, sanitize(f(y, o)));
            }
        }
        self
    }

    /// Run `filter` gated by an optional mask.
    ///
    /// With a mask, the filter runs on a duplicate and the result is blended
    /// back with `lerp(original, filtered, mask)`, so filters never need to
    /// know about masks. Without one the filter runs in place.
    pub fn apply_masked<R>(
        &mut self,
        mask: Option<&HeightField>,
        filter: impl FnOnce(&mut HeightField) -> R,
    ) -> R {
        match mask {
            None => filter(self),
            Some(mask) => {
                let mut filtered = self.duplicate();
                let result = filter(&mut filtered);
                self.lerp(&filtered, mask);
                result
            }
        }
    }

    // =========================================================================
    // NEIGHBOURHOOD FILTERS
    // =========================================================================

    /// `passes` rounds of a 3×3 weighted blur (centre 4, cardinal 2,
    /// diagonal 1). Borders clamp.
    pub fn smooth(&mut self, passes: usize) -> &mut Self {
        const CENTER: f32 = 4.0;
        const CARDINAL: f32 = 2.0;
        const DIAGONAL: f32 = 1.0;
        const TOTAL: f32 = CENTER + 4.0 * CARDINAL + 4.0 * DIAGONAL;

        for _ in 0..passes {
            let src = self.heights.clone();
            for (x, z, v) in self.heights.iter_mut() {
                let mut sum = *src.get(x, z) * CENTER;
                for (dir, &(dx, dz)) in DIR_OFFSETS.iter().enumerate() {
                    let w = if dir % 2 == 0 { CARDINAL } else { DIAGONAL };
                    sum += *src.get_clamped(x as i32 + dx, z as i32 + dz) * w;
                }
                *v = sanitize(sum / TOTAL);
            }
        }
        self
    }

    /// Morphological dilation: each sample becomes the maximum of the
    /// (2r+1)² square around it, so raised features spread by `radius`.
    pub fn grow_edges(&mut self, radius: usize) -> &mut Self {
        self.window_filter(radius, |center, window| {
            window.iter().copied().fold(center, f32::max)
        })
    }

    /// Morphological erosion: each sample becomes the minimum of the
    /// (2r+1)² square around it, so raised features shrink by `radius`.
    pub fn shrink_edges(&mut self, radius: usize) -> &mut Self {
        self.window_filter(radius, |center, window| {
            window.iter().copied().fold(center, f32::min)
        })
    }

    /// Remove isolated spikes and pits: a sample is clamped to the range of
    /// its neighbours within `radius`. Anything wider than the window, or any
    /// sample that is not a strict local extreme, passes through unchanged.
    pub fn denoise(&mut self, radius: usize) -> &mut Self {
        self.window_filter(radius, |center, window| {
            if window.is_empty() {
                return center;
            }
            let lo = window.iter().copied().fold(f32::MAX, f32::min);
            let hi = window.iter().copied().fold(f32::MIN, f32::max);
            center.clamp(lo, hi)
        })
    }

    /// Apply `f(center, neighbours)` over a square window; the window excludes
    /// the centre and skips cells outside the grid.
    fn window_filter(&mut self, radius: usize, f: impl Fn(f32, &[f32]) -> f32) -> &mut Self {
        if radius == 0 {
            return self;
        }
        let r = radius as i32;
        let src = self.heights.clone();
        let width = src.width as i32;
        let depth = src.height as i32;
        let mut window = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);

        for (x, z, v) in self.heights.iter_mut() {
            window.clear();
            for dz in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dz == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let nz = z as i32 + dz;
                    if nx >= 0 && nz >= 0 && nx < width && nz < depth {
                        window.push(*src.get(nx as usize, nz as usize));
                    }
                }
            }
            *v = sanitize(f(*src.get(x, z), &window));
        }
        self
    }
}

fn clamp_bounds(lo: f32, hi: f32) -> (f32, f32) {
    let lo = sanitize(lo);
    let hi = sanitize(hi);
    if lo <= hi {
        (lo, hi)
    } else {
        (hi, lo)
    }
}

fn validate_bands(starts: &[f32], curves: &[Curve]) -> Result<()> {
    if starts.is_empty() {
        return Err(TerrainError::InvalidParameter(
            "terracing needs at least one band".to_string(),
        ));
    }
    if starts.len() != curves.len() {
        return Err(TerrainError::InvalidParameter(format!(
            "{} band starts but {} curves",
            starts.len(),
            curves.len()
        )));
    }
    if starts.iter().any(|s| !(0.0..=1.0).contains(s)) {
        return Err(TerrainError::InvalidParameter(
            "band starts must lie in [0,1]".to_string(),
        ));
    }
    if starts.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TerrainError::InvalidParameter(
            "band starts must be strictly ascending".to_string(),
        ));
    }
    Ok(())
}
