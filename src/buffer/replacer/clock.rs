//! CLOCK (second chance) replacement policy.

use crate::buffer::frame::FrameDescriptor;
use crate::common::{Error, FrameId, Result};

/// Clock hand over the frame descriptor table.
///
/// The hand sweeps the frames in circular order. A referenced frame gets a
/// second chance: its bit is cleared and the hand moves on. The first frame
/// that is empty, or valid but neither referenced nor pinned, is the victim.
///
/// The replacer only chooses the victim. Writing the victim back, unbinding
/// it from the page directory and clearing its descriptor is the manager's
/// job, since it owns the files and the directory.
pub struct ClockReplacer {
    hand: FrameId,
    pool_size: usize,
}

impl ClockReplacer {
    /// Create a replacer for `pool_size` frames.
    ///
    /// The hand starts on the last frame, so the first sweep examines frame 0.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        Self {
            hand: FrameId::new(pool_size - 1),
            pool_size,
        }
    }

    /// Current position of the hand.
    #[inline]
    pub fn hand(&self) -> FrameId {
        self.hand
    }

    #[inline]
    fn advance(&mut self) {
        self.hand = self.hand.next_in(self.pool_size);
    }

    /// Select a frame to reuse.
    ///
    /// Sweeps one rotation at a time. A rotation that ends without a victim
    /// but cleared at least one referenced bit is followed by another; a
    /// rotation that cleared nothing means no frame can be taken.
    ///
    /// `claim` is asked about each candidate before it is returned. A
    /// candidate it refuses is passed over like a pinned frame. The manager
    /// uses it to take the frame's latch, so the frame it gets back is one
    /// nobody else is touching.
    ///
    /// # Errors
    /// `Error::BufferExceeded` if every frame is valid and pinned. In that
    /// case neither the hand nor any descriptor is touched. Also returned
    /// when every unpinned frame is refused by `claim`.
    pub fn find_victim<F>(
        &mut self,
        frames: &mut [FrameDescriptor],
        mut claim: F,
    ) -> Result<FrameId>
    where
        F: FnMut(FrameId) -> bool,
    {
        debug_assert_eq!(frames.len(), self.pool_size);

        if frames.iter().all(|f| f.is_valid() && f.is_pinned()) {
            return Err(Error::BufferExceeded {
                pool_size: self.pool_size,
            });
        }

        loop {
            let mut second_chances = 0;

            for _ in 0..self.pool_size {
                self.advance();
                let frame = &mut frames[self.hand.index()];

                if !frame.is_valid() {
                    if claim(self.hand) {
                        return Ok(self.hand);
                    }
                    continue;
                }
                if frame.is_referenced() {
                    frame.clear_referenced();
                    second_chances += 1;
                    continue;
                }
                if frame.is_pinned() {
                    continue;
                }
                if claim(self.hand) {
                    return Ok(self.hand);
                }
            }

            if second_chances == 0 {
                return Err(Error::BufferExceeded {
                    pool_size: self.pool_size,
                });
            }
        }
    }
}
