//! Replacement of product fill sentinels with NaN.
//!
//! Satellite products mark invalid pixels either with a sentinel value stored
//! in the array itself (usually `-32767`) or with a separate boolean mask built
//! from the variable's `_FillValue`/`valid_min`/`valid_max` attributes. Both
//! forms are normalized here, in place, to NaN.

use ndarray::{ArrayBase, DataMut, Dimension, Zip};
use thiserror::Error;

pub const DEFAULT_FILL_VALUE: f64 = -32767.0;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("mask shape {mask:?} does not match array shape {values:?}")]
pub struct MaskShapeError {
    pub values: Vec<usize>,
    pub mask: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillValueNormalizer {
    fill_value: f64,
}

impl Default for FillValueNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_FILL_VALUE)
    }
}

impl FillValueNormalizer {
    pub fn new(fill_value: f64) -> Self {
        Self { fill_value }
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    /// Sets every element equal to the fill value to NaN and returns how many
    /// were replaced. A NaN fill value replaces nothing.
    pub fn normalize<S, D>(&self, values: &mut ArrayBase<S, D>) -> usize
    where
        S: DataMut<Elem = f64>,
        D: Dimension,
    {
        let mut replaced = 0;
        values.map_inplace(|v| {
            if *v == self.fill_value {
                *v = f64::NAN;
                replaced += 1;
            }
        });
        replaced
    }

    /// Masked-array form: sets every element whose mask entry is `true` to NaN,
    /// then applies [`normalize`](Self::normalize) for sentinels the mask missed.
    pub fn normalize_masked<S, M, D>(
        &self,
        values: &mut ArrayBase<S, D>,
        mask: &ArrayBase<M, D>,
    ) -> Result<usize, MaskShapeError>
    where
        S: DataMut<Elem = f64>,
        M: ndarray::Data<Elem = bool>,
        D: Dimension,
    {
        if values.shape() != mask.shape() {
            return Err(MaskShapeError {
                values: values.shape().to_vec(),
                mask: mask.shape().to_vec(),
            });
        }

        let mut replaced = 0;
        Zip::from(&mut *values).and(mask).for_each(|v, &masked| {
            if masked && !v.is_nan() {
                *v = f64::NAN;
                replaced += 1;
            }
        });

        Ok(replaced + self.normalize(values))
    }
}
