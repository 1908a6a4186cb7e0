use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use zarrs::array::ArraySubset;

use crate::{Error, Result};

/// Half-open bounds for one dimension of a [`Roi`].
///
/// A missing start defaults to 0 and a missing end to the full extent of the
/// dimension, both filled in by [`Roi::normalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoiDim {
    start: Option<u64>,
    end: Option<u64>,
}

impl RoiDim {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }
}

impl From<Range<u64>> for RoiDim {
    fn from(value: Range<u64>) -> Self {
        Self::new(Some(value.start), Some(value.end))
    }
}

impl From<RangeFrom<u64>> for RoiDim {
    fn from(value: RangeFrom<u64>) -> Self {
        Self::new(Some(value.start), None)
    }
}

impl From<RangeTo<u64>> for RoiDim {
    fn from(value: RangeTo<u64>) -> Self {
        Self::new(None, Some(value.end))
    }
}

impl From<RangeFull> for RoiDim {
    fn from(_: RangeFull) -> Self {
        Self::default()
    }
}

/// Region of interest: per-dimension half-open intervals, possibly open-ended.
///
/// An un-normalized ROI never reaches block planning or copying; everything
/// downstream consumes the [`ArraySubset`] produced by [`Roi::normalize`],
/// which is the single place open bounds are filled in and limits validated.
///
/// ```
/// use zarrs_rechunk::{Roi, RoiDim};
///
/// let roi = Roi::from([RoiDim::from(3..9), RoiDim::from(..)]);
/// let subset = roi.normalize(&[10, 20]).unwrap();
/// assert_eq!(subset.start(), &[3, 0]);
/// assert_eq!(subset.shape(), &[6, 20]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roi {
    dims: Vec<RoiDim>,
}

impl Roi {
    pub fn new(dims: Vec<RoiDim>) -> Self {
        Self { dims }
    }

    pub fn dimensionality(&self) -> usize {
        self.dims.len()
    }

    /// Fill in open bounds against `shape` and validate the result.
    ///
    /// Bounds are checked, never clamped: `start > end` or `end > shape[d]`
    /// is an error.
    pub fn normalize(&self, shape: &[u64]) -> Result<ArraySubset> {
        if self.dims.len() != shape.len() {
            return Err(Error::rank_mismatch(self.dims.len(), shape.len()));
        }
        let mut ranges = Vec::with_capacity(shape.len());
        for (dim, &extent) in self.dims.iter().zip(shape) {
            let start = dim.start.unwrap_or(0);
            let end = dim.end.unwrap_or(extent);
            if start > end {
                return Err(Error::InvalidRoi(format!(
                    "start {start} is greater than end {end}"
                )));
            }
            if end > extent {
                return Err(Error::InvalidRoi(format!(
                    "end {end} exceeds the array extent {extent}"
                )));
            }
            ranges.push(start..end);
        }
        Ok(ArraySubset::new_with_ranges(&ranges))
    }
}

impl<D: Into<RoiDim>, const N: usize> From<[D; N]> for Roi {
    fn from(dims: [D; N]) -> Self {
        Self::new(dims.into_iter().map(Into::into).collect())
    }
}

impl<D: Into<RoiDim>> FromIterator<D> for Roi {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fills_open_bounds() {
        let roi = Roi::from([
            RoiDim::from(2..5),
            RoiDim::from(3..),
            RoiDim::from(..4),
            RoiDim::from(..),
        ]);
        let subset = roi.normalize(&[10, 10, 10, 10]).unwrap();
        assert_eq!(subset.start(), &[2, 3, 0, 0]);
        assert_eq!(subset.end_exc(), vec![5, 10, 4, 10]);
    }

    #[test]
    fn test_normalize_rejects_rank_mismatch() {
        let roi = Roi::from([RoiDim::from(0..5)]);
        assert!(matches!(
            roi.normalize(&[10, 10]),
            Err(Error::RankMismatch {
                got: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_normalize_rejects_out_of_bounds() {
        let roi = Roi::from([RoiDim::from(0..11)]);
        assert!(matches!(roi.normalize(&[10]), Err(Error::InvalidRoi(_))));
    }

    #[test]
    fn test_normalize_rejects_inverted_bounds() {
        let roi = Roi::from([RoiDim::from(6..3)]);
        assert!(matches!(roi.normalize(&[10]), Err(Error::InvalidRoi(_))));
    }

    #[test]
    fn test_empty_interval_is_valid() {
        let roi = Roi::from([RoiDim::from(4..4)]);
        let subset = roi.normalize(&[10]).unwrap();
        assert_eq!(subset.num_elements(), 0);
    }
}
