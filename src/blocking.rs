use std::iter::FusedIterator;

use zarrs::array::ArraySubset;

use crate::{Error, Result};

/// Lazy enumeration of the block regions covering an array shape, or the part
/// of it selected by a region of interest.
///
/// Blocks are cut on a grid aligned to the array origin; with a ROI, enough
/// grid cells are enumerated to cover it and each is clamped to the ROI
/// bounds. With `center_at_roi` the grid is shifted so a block boundary
/// coincides with the ROI origin instead.
///
/// Iteration is row-major over block indices (last dimension fastest) and
/// deterministic. Clamping can leave a block empty in some dimension; such
/// blocks are still yielded, with a zero extent, and are the caller's to skip.
///
/// ```
/// use zarrs_rechunk::Blocks;
///
/// let blocks = Blocks::new(&[10], &[4], None, false).unwrap();
/// let starts: Vec<_> = blocks.iter().map(|b| b.start()[0]).collect();
/// assert_eq!(starts, [0, 4, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct Blocks {
    block_shape: Vec<u64>,
    /// First block index per dimension on the (possibly shifted) grid.
    first: Vec<u64>,
    /// Number of block indices per dimension.
    count: Vec<u64>,
    /// Grid offset from the array origin; nonzero only with `center_at_roi`.
    shift: Vec<u64>,
    /// Covered bounds that every block is clamped to.
    min: Vec<u64>,
    max: Vec<u64>,
}

impl Blocks {
    /// Plan the blocks covering `shape`, restricted to `roi` if given.
    ///
    /// `roi` must already be normalized (see [`crate::Roi::normalize`]) and
    /// lie within `shape`. `center_at_roi` only has an effect with a ROI.
    pub fn new(
        shape: &[u64],
        block_shape: &[u64],
        roi: Option<&ArraySubset>,
        center_at_roi: bool,
    ) -> Result<Self> {
        if block_shape.len() != shape.len() {
            return Err(Error::rank_mismatch(block_shape.len(), shape.len()));
        }
        if block_shape.iter().any(|&b| b == 0) {
            return Err(Error::InvalidBlockShape);
        }

        let ndim = shape.len();
        let mut first = Vec::with_capacity(ndim);
        let mut count = Vec::with_capacity(ndim);
        let mut shift = vec![0; ndim];
        let (min, max) = match roi {
            None => {
                for (&extent, &b) in shape.iter().zip(block_shape) {
                    first.push(0);
                    count.push(extent.div_ceil(b));
                }
                (vec![0; ndim], shape.to_vec())
            }
            Some(roi) => {
                if roi.dimensionality() != ndim {
                    return Err(Error::rank_mismatch(roi.dimensionality(), ndim));
                }
                let start = roi.start();
                let end = roi.end_exc();
                for (d, &b) in block_shape.iter().enumerate() {
                    if end[d] > shape[d] {
                        return Err(Error::InvalidRoi(format!(
                            "end {} exceeds the array extent {}",
                            end[d], shape[d]
                        )));
                    }
                    first.push(start[d] / b);
                    count.push(end[d].div_ceil(b).saturating_sub(start[d] / b));
                    if center_at_roi {
                        shift[d] = start[d] % b;
                    }
                }
                (start.to_vec(), end)
            }
        };

        Ok(Self {
            block_shape: block_shape.to_vec(),
            first,
            count,
            shift,
            min,
            max,
        })
    }

    /// Total number of blocks that will be yielded, empty ones included.
    pub fn len(&self) -> usize {
        self.count
            .iter()
            .map(|&c| usize::try_from(c).unwrap_or(usize::MAX))
            .product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> BlocksIterator<'_> {
        <&Self as IntoIterator>::into_iter(self)
    }

    /// The clamped block region at the given per-dimension block indices.
    fn block_at(&self, indices: &[u64]) -> ArraySubset {
        let ranges: Vec<_> = indices
            .iter()
            .enumerate()
            .map(|(d, &i)| {
                let pos = i * self.block_shape[d] + self.shift[d];
                let start = pos.clamp(self.min[d], self.max[d]);
                let end = (pos + self.block_shape[d]).clamp(start, self.max[d]);
                start..end
            })
            .collect();
        ArraySubset::new_with_ranges(&ranges)
    }

    /// Advance `indices` through the row-major index odometer.
    fn advance(&self, mut indices: Vec<u64>) -> Option<Vec<u64>> {
        for d in (0..indices.len()).rev() {
            indices[d] += 1;
            if indices[d] < self.first[d] + self.count[d] {
                return Some(indices);
            }
            indices[d] = self.first[d];
        }
        None
    }
}

impl<'a> IntoIterator for &'a Blocks {
    type Item = ArraySubset;
    type IntoIter = BlocksIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        let remaining = self.len();
        BlocksIterator {
            blocks: self,
            next: (remaining > 0).then(|| self.first.clone()),
            remaining,
        }
    }
}

/// See [`Blocks`].
pub struct BlocksIterator<'a> {
    blocks: &'a Blocks,
    next: Option<Vec<u64>>,
    remaining: usize,
}

impl Iterator for BlocksIterator<'_> {
    type Item = ArraySubset;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.next.take()?;
        let block = self.blocks.block_at(&indices);
        self.next = self.blocks.advance(indices);
        self.remaining -= 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BlocksIterator<'_> {}

impl FusedIterator for BlocksIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(blocks: &Blocks) -> Vec<Vec<std::ops::Range<u64>>> {
        blocks
            .iter()
            .map(|b| {
                b.start()
                    .iter()
                    .zip(b.end_exc())
                    .map(|(&s, e)| s..e)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_full_shape_1d() {
        let blocks = Blocks::new(&[10], &[4], None, false).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(ranges(&blocks), [[0..4], [4..8], [8..10]]);
    }

    #[test]
    fn test_roi_1d() {
        let roi = ArraySubset::new_with_ranges(&[3..9]);
        let blocks = Blocks::new(&[10], &[4], Some(&roi), false).unwrap();
        assert_eq!(ranges(&blocks), [[3..4], [4..8], [8..9]]);
    }

    #[test]
    fn test_roi_1d_centered() {
        // Grid shifted by 3 % 4, so the first block starts exactly at the
        // ROI origin; the trailing grid cell clamps to empty.
        let roi = ArraySubset::new_with_ranges(&[3..9]);
        let blocks = Blocks::new(&[10], &[4], Some(&roi), true).unwrap();
        assert_eq!(ranges(&blocks), [[3..7], [7..9], [9..9]]);
    }

    #[test]
    fn test_exact_fit_has_no_partial_blocks() {
        let blocks = Blocks::new(&[8, 6], &[4, 3], None, false).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.shape() == [4, 3]));
    }

    #[test]
    fn test_row_major_order() {
        let blocks = Blocks::new(&[6, 6], &[2, 2], None, false).unwrap();
        let starts: Vec<_> = blocks.iter().map(|b| b.start().to_vec()).collect();
        assert_eq!(
            starts,
            [
                [0, 0],
                [0, 2],
                [0, 4],
                [2, 0],
                [2, 2],
                [2, 4],
                [4, 0],
                [4, 2],
                [4, 4]
            ]
        );
    }

    #[test]
    fn test_rank_mismatch() {
        assert!(matches!(
            Blocks::new(&[10, 10], &[4], None, false),
            Err(Error::RankMismatch { .. })
        ));
        let roi = ArraySubset::new_with_ranges(&[0..5]);
        assert!(matches!(
            Blocks::new(&[10, 10], &[4, 4], Some(&roi), false),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_block_shape_rejected() {
        assert!(matches!(
            Blocks::new(&[10], &[0], None, false),
            Err(Error::InvalidBlockShape)
        ));
    }

    /// Union of blocks partitions the covered region: disjoint, no gaps.
    fn assert_partition(blocks: &Blocks, min: &[u64], max: &[u64]) {
        let covered: u64 = min.iter().zip(max).map(|(&lo, &hi)| hi - lo).product();
        let total: u64 = blocks.iter().map(|b| b.num_elements()).sum();
        assert_eq!(total, covered);
        for block in blocks.iter() {
            for (d, (&s, e)) in block.start().iter().zip(block.end_exc()).enumerate() {
                assert!(s >= min[d] && e <= max[d]);
            }
        }
        // Pairwise disjoint: any two distinct blocks miss each other in some
        // dimension.
        let all: Vec<_> = blocks.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                let disjoint = a
                    .start()
                    .iter()
                    .zip(a.end_exc())
                    .zip(b.start().iter().zip(b.end_exc()))
                    .any(|((&sa, ea), (&sb, eb))| ea <= sb || eb <= sa || sa == ea || sb == eb);
                assert!(disjoint);
            }
        }
    }

    #[test]
    fn test_partition_without_roi() {
        let shape = [10, 7, 3];
        let blocks = Blocks::new(&shape, &[4, 2, 3], None, false).unwrap();
        assert_partition(&blocks, &[0, 0, 0], &shape);
    }

    #[test]
    fn test_partition_with_roi() {
        let roi = ArraySubset::new_with_ranges(&[3..9, 1..7]);
        let blocks = Blocks::new(&[10, 8], &[4, 3], Some(&roi), false).unwrap();
        assert_partition(&blocks, roi.start(), &roi.end_exc());
    }

    #[test]
    fn test_centering_preserves_coverage() {
        let roi = ArraySubset::new_with_ranges(&[3..9, 1..7]);
        let blocks = Blocks::new(&[10, 8], &[4, 3], Some(&roi), true).unwrap();
        assert_partition(&blocks, roi.start(), &roi.end_exc());
    }

    #[test]
    fn test_deterministic() {
        let roi = ArraySubset::new_with_ranges(&[2..9]);
        let a: Vec<_> = Blocks::new(&[12], &[5], Some(&roi), true)
            .unwrap()
            .iter()
            .collect();
        let b: Vec<_> = Blocks::new(&[12], &[5], Some(&roi), true)
            .unwrap()
            .iter()
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_roi_out_of_bounds_rejected() {
        let roi = ArraySubset::new_with_ranges(&[0..11]);
        assert!(matches!(
            Blocks::new(&[10], &[4], Some(&roi), false),
            Err(Error::InvalidRoi(_))
        ));
    }
}
