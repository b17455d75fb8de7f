//! Mask composition: up to two sources, each run through a transform chain,
//! merged into a single [0,1] influence field.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::export::import_heightfield;
use crate::heightfield::HeightField;

/// Where a mask layer gets its pixels.
#[derive(Clone, Debug)]
pub enum MaskSource {
    /// An image on disk, decoded through the compositor's cache.
    Image(PathBuf),
    /// A field already in memory (a stamp, a derived map, ...).
    Field(HeightField),
}

/// Per-source adjustments, applied in declaration order:
/// multiply → add → power → contrast → quantize → smooth → flip → invert → normalise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskTransform {
    pub strength: f32,
    pub offset: f32,
    pub power: f32,
    pub contrast: f32,
    /// Terrace step; 0 disables.
    pub quantize: f32,
    /// Blur passes.
    pub smooth: usize,
    pub flip: bool,
    pub invert: bool,
    pub normalise: bool,
}

impl Default for MaskTransform {
    fn default() -> Self {
        Self {
            strength: 1.0,
            offset: 0.0,
            power: 1.0,
            contrast: 1.0,
            quantize: 0.0,
            smooth: 0,
            flip: false,
            invert: false,
            normalise: false,
        }
    }
}

impl MaskTransform {
    /// Run the chain over `field`. Every step clamps to [0,1].
    pub fn apply(&self, field: &mut HeightField) {
        if self.strength != 1.0 {
            field.multiply_clamped(self.strength, 0.0, 1.0);
        }
        if self.offset != 0.0 {
            field.add_clamped(self.offset, 0.0, 1.0);
        }
        if self.power != 1.0 {
            field.power(self.power);
        }
        if self.contrast != 1.0 {
            field.contrast(self.contrast);
        }
        field.quantize(self.quantize).smooth(self.smooth);
        if self.flip {
            field.flip();
        }
        if self.invert {
            field.invert();
        }
        if self.normalise {
            field.normalise();
        }
    }
}

/// How two active layers are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeOperator {
    /// Take the second value where it is greater.
    #[default]
    AssignIfGreaterThan,
    /// Take the second value where it is smaller.
    AssignIfLessThan,
    Add,
    Multiply,
    Subtract,
}

impl MergeOperator {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        let v = match self {
            MergeOperator::AssignIfGreaterThan => {
                if b > a {
                    b
                } else {
                    a
                }
            }
            MergeOperator::AssignIfLessThan => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            MergeOperator::Add => a + b,
            MergeOperator::Multiply => a * b,
            MergeOperator::Subtract => a - b,
        };
        v.clamp(0.0, 1.0)
    }
}

/// One input to the compositor.
#[derive(Clone, Debug)]
pub struct MaskLayer {
    pub source: MaskSource,
    pub transform: MaskTransform,
    pub enabled: bool,
}

impl MaskLayer {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            source: MaskSource::Image(path.into()),
            transform: MaskTransform::default(),
            enabled: true,
        }
    }

    pub fn field(field: HeightField) -> Self {
        Self {
            source: MaskSource::Field(field),
            transform: MaskTransform::default(),
            enabled: true,
        }
    }

    pub fn with_transform(mut self, transform: MaskTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Decode cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Entries replaced because the file changed on disk.
    pub reloads: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Hits: {} | Misses: {} | Reloads: {} | Rate: {:.1}%",
            self.hits,
            self.misses,
            self.reloads,
            self.hit_rate() * 100.0
        )
    }
}

struct CachedImage {
    modified: SystemTime,
    field: HeightField,
}

/// Builds combined masks and memoizes image decoding.
///
/// Cache entries are keyed by path and invalidated only when the file's
/// last-modified time changes. The cache can be dropped at any time; the
/// next request simply decodes again.
#[derive(Default)]
pub struct MaskCompositor {
    cache: HashMap<PathBuf, CachedImage>,
    stats: CacheStats,
}

impl MaskCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn cached_images(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Decode `path`, reusing a previous decode if the file is unchanged.
    pub fn decode(&mut self, path: &Path) -> Result<HeightField> {
        let modified = std::fs::metadata(path)?.modified()?;

        if let Some(entry) = self.cache.get(path) {
            if entry.modified == modified {
                self.stats.hits += 1;
                return Ok(entry.field.clone());
            }
            tracing::debug!("{} changed on disk, decoding again", path.display());
            self.stats.reloads += 1;
        }

        self.stats.misses += 1;
        let field = import_heightfield(path)?;
        self.cache.insert(
            path.to_path_buf(),
            CachedImage {
                modified,
                field: field.clone(),
            },
        );
        Ok(field)
    }

    /// Source pixels of a layer after its transform chain.
    pub fn resolve(&mut self, layer: &MaskLayer) -> Result<HeightField> {
        let mut field = match &layer.source {
            MaskSource::Image(path) => self.decode(path)?,
            MaskSource::Field(field) => field.clone(),
        };
        layer.transform.apply(&mut field);
        Ok(field)
    }

    /// Combine up to two layers. Disabled layers count as absent.
    ///
    /// With no active layer the result is `None` (callers treat that as "no
    /// mask"). One active layer passes through. Two are merged with
    /// `operator` at the resolution of the first.
    pub fn compose(
        &mut self,
        first: Option<&MaskLayer>,
        second: Option<&MaskLayer>,
        operator: MergeOperator,
    ) -> Result<Option<HeightField>> {
        let first = first.filter(|l| l.enabled);
        let second = second.filter(|l| l.enabled);

        match (first, second) {
            (None, None) => Ok(None),
            (Some(layer), None) | (None, Some(layer)) => Ok(Some(self.resolve(layer)?)),
            (Some(a), Some(b)) => {
                let mut base = self.resolve(a)?;
                let other = self.resolve(b)?;
                base.combine(&other, |x, y| operator.apply(x, y));
                tracing::debug!("merged two mask layers with {:?}", operator);
                Ok(Some(base))
            }
        }
    }
}
