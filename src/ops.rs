//! Bulk whole-dataset operations, parallelized over the chunk grid.

use std::cmp::Ordering;

use rayon::ThreadPoolBuilder;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use zarrs::array::{Array, ElementOwned};
use zarrs::storage::{ReadableStorageTraits, ReadableWritableStorageTraits, WritableStorageTraits};

use crate::{Error, Result};

/// Total order for scalars that may lack one; NaNs compare equal to
/// everything they meet, which is adequate for grouping.
fn scalar_order<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Every chunk index in a grid, last dimension fastest.
fn grid_indices(grid_shape: &[u64]) -> Vec<Vec<u64>> {
    let mut out = Vec::new();
    if grid_shape.is_empty() || grid_shape.iter().any(|&extent| extent == 0) {
        return out;
    }
    let mut current = vec![0; grid_shape.len()];
    loop {
        out.push(current.clone());
        let mut dim = grid_shape.len();
        loop {
            if dim == 0 {
                return out;
            }
            dim -= 1;
            current[dim] += 1;
            if current[dim] < grid_shape[dim] {
                break;
            }
            current[dim] = 0;
        }
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    if threads == 0 {
        return Err(Error::InvalidThreadCount);
    }
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// Erase every stored chunk whose elements are all identical, or all equal to
/// `only_value` when given.
///
/// The array still reads back densely afterwards; erased chunks resolve to
/// the fill value, so this only loses information when a trivial chunk's
/// value differs from it.
pub fn remove_trivial_chunks<T, S>(
    array: &Array<S>,
    threads: usize,
    only_value: Option<T>,
) -> Result<()>
where
    T: ElementOwned + PartialEq + Copy + Send + Sync,
    S: ReadableWritableStorageTraits + ?Sized + 'static,
{
    let pool = build_pool(threads)?;
    let chunks = grid_indices(array.chunk_grid_shape());
    pool.install(|| {
        chunks.par_iter().try_for_each(|indices| -> Result<()> {
            let Some(data) = array.retrieve_chunk_if_exists::<Vec<T>>(indices)? else {
                return Ok(());
            };
            let Some(&first) = data.first() else {
                return Ok(());
            };
            if data.iter().all(|value| *value == first)
                && only_value.is_none_or(|value| value == first)
            {
                array.erase_chunk(indices)?;
            }
            Ok(())
        })
    })
}

/// Erase all of an array's stored chunks, then its metadata.
pub fn erase_array<S>(array: &Array<S>, threads: usize) -> Result<()>
where
    S: WritableStorageTraits + ?Sized + 'static,
{
    let pool = build_pool(threads)?;
    let chunks = grid_indices(array.chunk_grid_shape());
    pool.install(|| {
        chunks
            .par_iter()
            .try_for_each(|indices| -> Result<()> { Ok(array.erase_chunk(indices)?) })
    })?;
    array.erase_metadata()?;
    Ok(())
}

/// The distinct values present in an array's stored chunks, ascending.
///
/// Unstored chunks contribute nothing, and for chunks overhanging the array
/// bounds only the in-bounds portion is inspected.
pub fn unique<T, S>(array: &Array<S>, threads: usize) -> Result<Vec<T>>
where
    T: ElementOwned + PartialOrd + Copy + Send + Sync,
    S: ReadableStorageTraits + ?Sized + 'static,
{
    let pool = build_pool(threads)?;
    let chunks = grid_indices(array.chunk_grid_shape());
    pool.install(|| {
        chunks
            .par_iter()
            .map(|indices| -> Result<Vec<T>> {
                let Some(mut data) = stored_chunk_values(array, indices)? else {
                    return Ok(Vec::new());
                };
                data.sort_unstable_by(scalar_order);
                data.dedup_by(|a, b| scalar_order(a, b) == Ordering::Equal);
                Ok(data)
            })
            .try_reduce(Vec::new, |a, b| Ok(merge_unique(a, b)))
    })
}

/// Like [`unique`], but with the number of occurrences of each value.
pub fn unique_with_counts<T, S>(array: &Array<S>, threads: usize) -> Result<Vec<(T, u64)>>
where
    T: ElementOwned + PartialOrd + Copy + Send + Sync,
    S: ReadableStorageTraits + ?Sized + 'static,
{
    let pool = build_pool(threads)?;
    let chunks = grid_indices(array.chunk_grid_shape());
    pool.install(|| {
        chunks
            .par_iter()
            .map(|indices| -> Result<Vec<(T, u64)>> {
                let Some(mut data) = stored_chunk_values(array, indices)? else {
                    return Ok(Vec::new());
                };
                data.sort_unstable_by(scalar_order);
                let mut runs: Vec<(T, u64)> = Vec::new();
                for value in data {
                    match runs.last_mut() {
                        Some((run, count)) if scalar_order(run, &value) == Ordering::Equal => {
                            *count += 1;
                        }
                        _ => runs.push((value, 1)),
                    }
                }
                Ok(runs)
            })
            .try_reduce(Vec::new, |a, b| Ok(merge_counts(a, b)))
    })
}

/// The in-bounds values of a stored chunk, or `None` if the chunk has no
/// stored representation.
fn stored_chunk_values<T, S>(array: &Array<S>, chunk_indices: &[u64]) -> Result<Option<Vec<T>>>
where
    T: ElementOwned,
    S: ReadableStorageTraits + ?Sized + 'static,
{
    let Some(data) = array.retrieve_chunk_if_exists::<Vec<T>>(chunk_indices)? else {
        return Ok(None);
    };
    let bounded = array.chunk_subset_bounded(chunk_indices)?;
    if bounded.num_elements_usize() == data.len() {
        // Interior chunk; the whole decoded chunk is in bounds.
        Ok(Some(data))
    } else {
        Ok(Some(array.retrieve_array_subset::<Vec<T>>(&bounded)?))
    }
}

/// Merge two sorted deduplicated runs into one.
fn merge_unique<T: PartialOrd + Copy>(a: Vec<T>, b: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut ai, mut bi) = (0, 0);
    while ai < a.len() && bi < b.len() {
        match scalar_order(&a[ai], &b[bi]) {
            Ordering::Less => {
                out.push(a[ai]);
                ai += 1;
            }
            Ordering::Greater => {
                out.push(b[bi]);
                bi += 1;
            }
            Ordering::Equal => {
                out.push(a[ai]);
                ai += 1;
                bi += 1;
            }
        }
    }
    out.extend_from_slice(&a[ai..]);
    out.extend_from_slice(&b[bi..]);
    out
}

/// Merge two sorted count runs, summing counts of shared values.
fn merge_counts<T: PartialOrd + Copy>(a: Vec<(T, u64)>, b: Vec<(T, u64)>) -> Vec<(T, u64)> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut ai, mut bi) = (0, 0);
    while ai < a.len() && bi < b.len() {
        match scalar_order(&a[ai].0, &b[bi].0) {
            Ordering::Less => {
                out.push(a[ai]);
                ai += 1;
            }
            Ordering::Greater => {
                out.push(b[bi]);
                bi += 1;
            }
            Ordering::Equal => {
                out.push((a[ai].0, a[ai].1 + b[bi].1));
                ai += 1;
                bi += 1;
            }
        }
    }
    out.extend_from_slice(&a[ai..]);
    out.extend_from_slice(&b[bi..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_indices_order() {
        assert_eq!(
            grid_indices(&[2, 3]),
            [[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]
        );
        assert!(grid_indices(&[2, 0]).is_empty());
    }

    #[test]
    fn test_merge_unique() {
        assert_eq!(
            merge_unique(vec![1, 3, 5], vec![2, 3, 6]),
            vec![1, 2, 3, 5, 6]
        );
        assert_eq!(merge_unique(Vec::<i32>::new(), vec![4]), vec![4]);
    }

    #[test]
    fn test_merge_counts() {
        assert_eq!(
            merge_counts(vec![(1, 2), (3, 1)], vec![(3, 4), (5, 1)]),
            vec![(1, 2), (3, 5), (5, 1)]
        );
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(build_pool(0), Err(Error::InvalidThreadCount)));
    }
}
