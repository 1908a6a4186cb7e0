pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape, block shape, and region of interest must all share one rank.
    #[error("rank mismatch: got {got}, expected {expected}")]
    RankMismatch { got: usize, expected: usize },
    #[error("invalid region of interest: {0}")]
    InvalidRoi(String),
    #[error("block shape entries must be positive")]
    InvalidBlockShape,
    #[error("thread count must be at least 1")]
    InvalidThreadCount,
    #[error("unsupported data type {0}")]
    UnsupportedDataType(String),
    #[error("an array already exists at {0}")]
    ArrayExists(String),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    ThreadPoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Timer(#[from] crate::timer::TimerError),
}

impl Error {
    pub(crate) fn rank_mismatch(got: usize, expected: usize) -> Self {
        Self::RankMismatch { got, expected }
    }
}
