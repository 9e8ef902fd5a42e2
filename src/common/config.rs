//! Configuration for the buffer pool.

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so a frame maps onto exactly one
/// OS page and file offsets stay aligned for direct I/O.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used by [`BufferPoolConfig::default`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Page directory buckets per frame.
///
/// Keeping slightly more buckets than frames keeps the chains short, so a
/// directory lookup stays close to O(1).
pub const DIRECTORY_LOAD_SCALE: f64 = 1.2;

/// Number of page directory buckets for a pool of `pool_size` frames.
#[inline]
pub fn directory_buckets(pool_size: usize) -> usize {
    (pool_size as f64 * DIRECTORY_LOAD_SCALE) as usize + 1
}

/// Construction parameters for a [`BufferPoolManager`](crate::BufferPoolManager).
///
/// The frame count is the only knob; everything else is derived from it.
///
/// # Example
/// ```
/// use clockpool::BufferPoolConfig;
///
/// let config = BufferPoolConfig::default().with_pool_size(16);
/// assert!(config.validate().is_ok());
/// assert!(BufferPoolConfig::default().with_pool_size(0).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub pool_size: usize,
}

impl BufferPoolConfig {
    /// Create a config for `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Replace the frame count.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Check that the config describes a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
