use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, SortError>;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("Sort of {count} elements exceeds sorter capacity of {capacity}")]
    CapacityExceeded { count: u32, capacity: u32 },

    #[error("Sorter capacity {capacity} needs {bytes} bytes per buffer, device allows {limit}")]
    CapacityTooLarge { capacity: u32, bytes: u64, limit: u64 },
}
