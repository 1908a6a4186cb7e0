use std::sync::Arc;

use num_traits::{AsPrimitive, Zero};
use rayon::ThreadPoolBuilder;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use zarrs::array::{
    Array, ArrayBuilder, ArrayMetadataOptions, ArraySubset, BytesToBytesCodecTraits, Element,
    ElementOwned,
};
use zarrs::config::MetadataConvertVersion;
use zarrs::storage::{ReadableStorageTraits, ReadableWritableStorageTraits};

use crate::blocking::Blocks;
use crate::roi::Roi;
use crate::scalar::ScalarType;
use crate::timer::Timer;
use crate::{Error, Result, with_scalar};

/// Block-wise parallel copy of one array into a newly created array, possibly
/// changing chunk shape, data type, compression, and spatial extent.
///
/// Work is partitioned into blocks (defaulting to the destination chunk
/// shape) and distributed over a fixed-size thread pool. Blocks covering
/// distinct destination chunks are written concurrently; if a custom block
/// shape makes blocks share destination chunks, the destination store must
/// tolerate the resulting concurrent read-modify-write of those chunks.
///
/// Blocks whose source contents are uniformly numeric zero are not written at
/// all. The destination is always created with a zero fill value, so elided
/// blocks still read back as zero while occupying no storage.
///
/// ```no_run
/// # fn main() -> zarrs_rechunk::Result<()> {
/// use std::sync::Arc;
/// use zarrs_rechunk::{Rechunker, Roi};
///
/// let store = Arc::new(zarrs::filesystem::FilesystemStore::new("data").expect("store"));
/// let src = zarrs::array::Array::open(store.clone(), "/raw")?;
/// let dst = Rechunker::new(vec![64, 64], 8)
///     .roi(Roi::from([128..256, 0..256]))
///     .fit_to_roi(true)
///     .run(&src, store, "/cutout")?;
/// # Ok(())
/// # }
/// ```
pub struct Rechunker {
    chunk_shape: Vec<u64>,
    threads: usize,
    block_shape: Option<Vec<u64>>,
    data_type: Option<ScalarType>,
    roi: Option<Roi>,
    fit_to_roi: bool,
    compression: Option<Vec<Arc<dyn BytesToBytesCodecTraits>>>,
    metadata_version: MetadataConvertVersion,
}

impl Rechunker {
    /// Configure a rechunk with the destination chunk shape and the number of
    /// worker threads.
    pub fn new(chunk_shape: Vec<u64>, threads: usize) -> Self {
        Self {
            chunk_shape,
            threads,
            block_shape: None,
            data_type: None,
            roi: None,
            fit_to_roi: false,
            compression: None,
            metadata_version: MetadataConvertVersion::Default,
        }
    }

    /// Shape of the copy unit, defaulting to the destination chunk shape.
    ///
    /// Need not align with the chunk shape, but see the type-level note on
    /// concurrent writes to shared chunks.
    pub fn block_shape(mut self, block_shape: Vec<u64>) -> Self {
        self.block_shape = Some(block_shape);
        self
    }

    /// Destination data type, defaulting to the source's. Values are cast
    /// with the semantics of `as`.
    pub fn data_type(mut self, data_type: ScalarType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Restrict the copy to a region of the source.
    pub fn roi(mut self, roi: Roi) -> Self {
        self.roi = Some(roi);
        self
    }

    /// Shrink the destination to the ROI extent, re-basing coordinates to the
    /// ROI origin. Has no effect without a ROI.
    pub fn fit_to_roi(mut self, fit_to_roi: bool) -> Self {
        self.fit_to_roi = fit_to_roi;
        self
    }

    /// Destination compression, defaulting to the source's bytes-to-bytes
    /// codecs. An empty vec means uncompressed.
    pub fn compression(mut self, codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>) -> Self {
        self.compression = Some(codecs);
        self
    }

    /// Zarr metadata version written for the destination.
    pub fn metadata_version(mut self, version: MetadataConvertVersion) -> Self {
        self.metadata_version = version;
        self
    }

    /// Create `dst_path` in `dst_store` and copy `src` into it.
    ///
    /// Fails without writing anything if the parameters are invalid or an
    /// array already exists at `dst_path`. On the first failing block the
    /// remaining unstarted blocks are abandoned and the error is returned
    /// once in-flight blocks have finished; a failed call leaves the
    /// destination in an unspecified partial state and is not resumable.
    ///
    /// After all blocks land, every source attribute is copied into the
    /// destination's attribute map, overwriting colliding keys.
    pub fn run<SIn, SOut>(
        &self,
        src: &Array<SIn>,
        dst_store: Arc<SOut>,
        dst_path: &str,
    ) -> Result<Array<SOut>>
    where
        SIn: ReadableStorageTraits + ?Sized + 'static,
        SOut: ReadableWritableStorageTraits + ?Sized + 'static,
    {
        if self.threads == 0 {
            return Err(Error::InvalidThreadCount);
        }
        let src_shape = src.shape().to_vec();
        if self.chunk_shape.len() != src_shape.len() {
            return Err(Error::rank_mismatch(self.chunk_shape.len(), src_shape.len()));
        }
        let src_scalar = ScalarType::from_data_type(src.data_type())?;
        let out_scalar = self.data_type.unwrap_or(src_scalar);
        let block_shape = self.block_shape.as_ref().unwrap_or(&self.chunk_shape);

        let roi = self
            .roi
            .as_ref()
            .map(|roi| roi.normalize(&src_shape))
            .transpose()?;
        let fit_to_roi = self.fit_to_roi && roi.is_some();
        let out_shape = match &roi {
            Some(roi) if fit_to_roi => roi.shape().to_vec(),
            _ => src_shape.clone(),
        };

        // Blocks are planned in absolute source coordinates; with fit_to_roi
        // the grid is centered on the ROI origin so translated blocks align
        // with the destination's own grid.
        let blocks: Vec<ArraySubset> =
            Blocks::new(&src_shape, block_shape, roi.as_ref(), fit_to_roi)?
                .iter()
                .filter(|block| block.num_elements() > 0)
                .collect();
        // Subtracted from block coordinates before writing.
        let offset = fit_to_roi
            .then(|| roi.as_ref().map(|roi| roi.start().to_vec()))
            .flatten();

        if Array::open(dst_store.clone(), dst_path).is_ok() {
            return Err(Error::ArrayExists(dst_path.to_string()));
        }
        let compression = match &self.compression {
            Some(codecs) => codecs.clone(),
            None => src.codecs().bytes_to_bytes_codecs().to_vec(),
        };
        let metadata_options = ArrayMetadataOptions::default()
            .with_metadata_convert_version(self.metadata_version)
            .with_include_zarrs_metadata(false);
        let mut dst = ArrayBuilder::new(
            out_shape,
            self.chunk_shape.clone(),
            out_scalar.data_type(),
            out_scalar.zero_fill(),
        )
        .bytes_to_bytes_codecs(compression)
        .dimension_names(src.dimension_names().clone())
        .build(dst_store, dst_path)?;
        dst.store_metadata_opt(&metadata_options)?;

        let pool = ThreadPoolBuilder::new().num_threads(self.threads).build()?;
        let mut timer = Timer::started();
        if src_scalar == out_scalar {
            with_scalar!(src_scalar, T, {
                pool.install(|| {
                    blocks.par_iter().try_for_each(|block| {
                        copy_block::<T, _, _>(src, &dst, block, offset.as_deref())
                    })
                })
            })?;
        } else {
            with_scalar!(src_scalar, TIn, {
                with_scalar!(out_scalar, TOut, {
                    pool.install(|| {
                        blocks.par_iter().try_for_each(|block| {
                            copy_block_cast::<TIn, TOut, _, _>(src, &dst, block, offset.as_deref())
                        })
                    })
                })
            })?;
        }
        let elapsed = timer.stop()?;
        log::debug!("copied {} blocks into {dst_path} in {elapsed:?}", blocks.len());

        dst.attributes_mut().extend(src.attributes().clone());
        dst.store_metadata_opt(&metadata_options)?;
        Ok(dst)
    }
}

/// Shift `block` to destination coordinates.
fn to_output(block: &ArraySubset, offset: Option<&[u64]>) -> ArraySubset {
    match offset {
        None => block.clone(),
        Some(offset) => {
            let ranges: Vec<_> = block
                .start()
                .iter()
                .zip(block.end_exc())
                .zip(offset)
                .map(|((&start, end), &off)| (start - off)..(end - off))
                .collect();
            ArraySubset::new_with_ranges(&ranges)
        }
    }
}

/// Copy one block without changing the element type, reusing the read buffer
/// for the write.
fn copy_block<T, SIn, SOut>(
    src: &Array<SIn>,
    dst: &Array<SOut>,
    block: &ArraySubset,
    offset: Option<&[u64]>,
) -> Result<()>
where
    T: Element + ElementOwned + Zero + Send + Sync,
    SIn: ReadableStorageTraits + ?Sized + 'static,
    SOut: ReadableWritableStorageTraits + ?Sized + 'static,
{
    let data = src.retrieve_array_subset::<Vec<T>>(block)?;
    if data.iter().all(Zero::is_zero) {
        return Ok(());
    }
    dst.store_array_subset(&to_output(block, offset), data.as_slice())?;
    Ok(())
}

/// Copy one block, casting every element to the destination type.
fn copy_block_cast<TIn, TOut, SIn, SOut>(
    src: &Array<SIn>,
    dst: &Array<SOut>,
    block: &ArraySubset,
    offset: Option<&[u64]>,
) -> Result<()>
where
    TIn: ElementOwned + Zero + AsPrimitive<TOut> + Send + Sync,
    TOut: Element + Copy + Send + Sync + 'static,
    SIn: ReadableStorageTraits + ?Sized + 'static,
    SOut: ReadableWritableStorageTraits + ?Sized + 'static,
{
    let data = src.retrieve_array_subset::<Vec<TIn>>(block)?;
    // The skip inspects the source values; a block whose values only become
    // zero after the cast is still written.
    if data.iter().all(Zero::is_zero) {
        return Ok(());
    }
    let cast: Vec<TOut> = data.iter().map(|value| value.as_()).collect();
    dst.store_array_subset(&to_output(block, offset), cast.as_slice())?;
    Ok(())
}
