//! Frame identifier type.

use std::fmt;

/// Index of a frame in the buffer pool, in `[0, pool_size)`.
///
/// Frame ids are the only handle the pool gives out for its storage: the
/// frame arena, the descriptor table and the clock hand are all indexed by
/// them, never by page id.
///
/// # Example
/// ```
/// use clockpool::FrameId;
///
/// let frame_id = FrameId::new(2);
/// assert_eq!(frame_id.index(), 2);
/// assert_eq!(frame_id.next_in(3), FrameId::new(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }

    /// Position of the frame in the pool's arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    /// The frame after this one on a clock face of `pool_size` frames.
    #[inline]
    pub fn next_in(self, pool_size: usize) -> FrameId {
        FrameId((self.0 + 1) % pool_size)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_next_wraps() {
        assert_eq!(FrameId::new(0).next_in(4), FrameId::new(1));
        assert_eq!(FrameId::new(3).next_in(4), FrameId::new(0));
        assert_eq!(FrameId::new(0).next_in(1), FrameId::new(0));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
    }
}
