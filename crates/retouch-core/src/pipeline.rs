//! The adjustment pipeline: source image, equalization table and render target.
//!
//! A pipeline is built once per loaded source image. Construction validates
//! the source and computes the CLAHE table; any failure there is fatal and no
//! pipeline exists. After that, [`AdjustmentPipeline::apply`] recolors the full
//! source into the owned render target and never fails.
//!
//! # Example
//!
//! ```ignore
//! use retouch_core::{Adjustments, AdjustmentPipeline, Bitmap};
//!
//! let mut pipeline = AdjustmentPipeline::new(Bitmap::filled(64, 64, [90, 90, 90, 255]))?;
//! let mut adjustments = Adjustments::default();
//! adjustments.contrast = 0.4;
//! pipeline.apply(&adjustments);
//! let frame = pipeline.output();
//! ```

use thiserror::Error;

use crate::adjustments::{apply_adjustments, Adjustments};
use crate::decode::Bitmap;
use crate::histogram::EqualizationTable;

/// Fatal pipeline construction errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid source dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

/// Owns everything needed to produce adjusted frames for one source image.
#[derive(Debug)]
pub struct AdjustmentPipeline {
    source: Bitmap,
    table: EqualizationTable,
    target: Bitmap,
    applied: Adjustments,
}

impl AdjustmentPipeline {
    /// Validate the source, compute its equalization table and allocate the target.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` for empty sources or a pixel buffer that does
    /// not match the dimensions.
    pub fn new(source: Bitmap) -> Result<Self, PipelineError> {
        if source.width == 0 || source.height == 0 {
            return Err(PipelineError::InvalidDimensions {
                width: source.width,
                height: source.height,
            });
        }
        if source.pixels.len() != source.expected_len() {
            return Err(PipelineError::BufferSizeMismatch {
                expected: source.expected_len(),
                actual: source.pixels.len(),
            });
        }

        let table = EqualizationTable::compute(&source);
        let target = source.clone();
        tracing::debug!(
            width = source.width,
            height = source.height,
            "adjustment pipeline created"
        );
        Ok(Self {
            source,
            table,
            target,
            applied: Adjustments::default(),
        })
    }

    /// Re-render the target with `adjustments`.
    ///
    /// Calling again with the parameters already applied does nothing.
    pub fn apply(&mut self, adjustments: &Adjustments) {
        if self.applied == *adjustments {
            return;
        }
        apply_adjustments(&self.source, &self.table, adjustments, &mut self.target.pixels);
        self.applied = *adjustments;
    }

    /// The most recently rendered frame, at source resolution.
    pub fn output(&self) -> &Bitmap {
        &self.target
    }

    pub fn source(&self) -> &Bitmap {
        &self.source
    }

    pub fn table(&self) -> &EqualizationTable {
        &self.table
    }

    /// Parameters the current output was rendered with.
    pub fn applied(&self) -> &Adjustments {
        &self.applied
    }

    pub fn width(&self) -> u32 {
        self.source.width
    }

    pub fn height(&self) -> u32 {
        self.source.height
    }
}

impl Drop for AdjustmentPipeline {
    fn drop(&mut self) {
        tracing::debug!(
            width = self.source.width,
            height = self.source.height,
            "adjustment pipeline released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, value: u8) -> Bitmap {
        Bitmap::filled(width, height, [value, value, value, 255])
    }

    #[test]
    fn test_new_rejects_empty() {
        let err = AdjustmentPipeline::new(Bitmap::new(0, 10, vec![])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_new_rejects_short_buffer() {
        let err = AdjustmentPipeline::new(Bitmap::new(4, 4, vec![0; 60])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BufferSizeMismatch {
                expected: 64,
                actual: 60
            }
        ));
    }

    #[test]
    fn test_initial_output_is_source() {
        let pipeline = AdjustmentPipeline::new(gray(8, 8, 77)).unwrap();
        assert_eq!(pipeline.output(), pipeline.source());
        assert_eq!((pipeline.width(), pipeline.height()), (8, 8));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut pipeline = AdjustmentPipeline::new(gray(8, 8, 100)).unwrap();
        let mut adj = Adjustments::default();
        adj.brightness = 0.4;
        pipeline.apply(&adj);
        let first = pipeline.output().clone();
        pipeline.apply(&adj);
        assert_eq!(pipeline.output(), &first);
        assert_eq!(pipeline.applied(), &adj);
    }

    #[test]
    fn test_apply_back_to_neutral_restores_source() {
        let mut pipeline = AdjustmentPipeline::new(gray(8, 8, 100)).unwrap();
        let mut adj = Adjustments::default();
        adj.fade = 0.8;
        pipeline.apply(&adj);
        assert_ne!(pipeline.output(), pipeline.source());
        pipeline.apply(&Adjustments::default());
        assert_eq!(pipeline.output(), pipeline.source());
    }

    #[test]
    fn test_neutral_output_matches_source_within_rounding() {
        let mut pixels = Vec::new();
        for i in 0..100u32 {
            pixels.extend_from_slice(&[(i * 2) as u8, (255 - i) as u8, (i * 7 % 256) as u8, 255]);
        }
        let source = Bitmap::new(10, 10, pixels);
        let mut pipeline = AdjustmentPipeline::new(source.clone()).unwrap();
        pipeline.apply(&Adjustments::default());
        for (a, b) in pipeline.output().pixels.iter().zip(&source.pixels) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::InvalidDimensions {
            width: 0,
            height: 3,
        };
        assert_eq!(err.to_string(), "Invalid source dimensions: 0x3");
    }
}
