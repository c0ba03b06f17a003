//! # Contiguous Frame Pool
//!
//! Manages a fixed range of physical frames and hands out physically
//! contiguous runs of them. State is kept in a caller-provided byte slice,
//! two bits per frame, so the pool itself needs no heap:
//!
//! | Bits | State |
//! |------|-------|
//! | `00` | [`FrameState::Free`] |
//! | `01` | [`FrameState::Used`] (inside a sequence) |
//! | `10` | [`FrameState::HeadOfSequence`] (first frame of a sequence) |
//!
//! Releasing a head frame frees the whole run up to the next frame that is
//! not [`FrameState::Used`]; callers therefore only remember the first frame.
//!
//! ```rust
//! # use kernel_alloc::frame_pool::ContFramePool;
//! # use kernel_vmem::FramePool;
//! # use kernel_vmem::addresses::FrameNumber;
//! let mut info = [0u8; 4];
//! assert_eq!(ContFramePool::needed_info_bytes(16), info.len());
//! let mut pool = ContFramePool::new(FrameNumber::new(256), 16, &mut info).unwrap();
//! let run = pool.get_frames(4).unwrap();
//! assert_eq!(run, FrameNumber::new(256));
//! assert_eq!(pool.free_frames(), 12);
//! pool.release_frames(run).unwrap();
//! assert_eq!(pool.free_frames(), 16);
//! ```

use kernel_vmem::addresses::FrameNumber;
use kernel_vmem::{FramePool, FramePoolError};
use log::{debug, info};

/// Allocation state of one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameState {
    Free = 0b00,
    Used = 0b01,
    HeadOfSequence = 0b10,
}

impl FrameState {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Free,
            0b10 => Self::HeadOfSequence,
            _ => Self::Used,
        }
    }
}

/// First-fit allocator over `[base, base + n_frames)`.
pub struct ContFramePool<'a> {
    base: FrameNumber,
    n_frames: u32,
    bitmap: &'a mut [u8],
    free: u32,
}

impl<'a> ContFramePool<'a> {
    /// Frames whose state fits in one byte.
    const FRAMES_PER_BYTE: u32 = 4;

    /// Bytes of bookkeeping needed to manage `n_frames` frames.
    #[must_use]
    pub const fn needed_info_bytes(n_frames: u32) -> usize {
        n_frames.div_ceil(Self::FRAMES_PER_BYTE) as usize
    }

    /// Manage `n_frames` frames starting at `base`, all initially free.
    ///
    /// # Errors
    /// [`FramePoolError::InfoTooSmall`] if `info` cannot hold the state of
    /// every frame (see [`ContFramePool::needed_info_bytes`]).
    pub fn new(
        base: FrameNumber,
        n_frames: u32,
        info: &'a mut [u8],
    ) -> Result<Self, FramePoolError> {
        let needed = Self::needed_info_bytes(n_frames);
        if info.len() < needed {
            return Err(FramePoolError::InfoTooSmall {
                needed,
                provided: info.len(),
            });
        }

        let bitmap = &mut info[..needed];
        bitmap.fill(0);
        info!("Frame pool initialized: {n_frames} frames from {base}");
        Ok(Self {
            base,
            n_frames,
            bitmap,
            free: n_frames,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> FrameNumber {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.n_frames
    }

    /// Number of frames currently free.
    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.free
    }

    /// Whether `frame` belongs to this pool.
    #[inline]
    #[must_use]
    pub const fn contains(&self, frame: FrameNumber) -> bool {
        frame.as_u32() >= self.base.as_u32() && frame.as_u32() - self.base.as_u32() < self.n_frames
    }

    /// State of `frame`, or `None` if the pool does not manage it.
    #[must_use]
    pub fn state(&self, frame: FrameNumber) -> Option<FrameState> {
        self.index_of(frame).map(|i| self.get(i))
    }

    /// Take `[first, first + count)` out of circulation, e.g. a memory hole.
    ///
    /// The range becomes one allocated sequence headed by `first`.
    ///
    /// # Errors
    /// [`FramePoolError::OutOfRange`] if any frame of the range is outside the pool.
    pub fn mark_inaccessible(&mut self, first: FrameNumber, count: u32) -> Result<(), FramePoolError> {
        let Some(start) = self.index_of(first) else {
            return Err(FramePoolError::OutOfRange(first));
        };
        if count == 0 {
            return Ok(());
        }
        if count > self.n_frames - start {
            return Err(FramePoolError::OutOfRange(self.base + self.n_frames));
        }

        for i in start..start + count {
            if self.get(i) == FrameState::Free {
                self.free -= 1;
            }
            let state = if i == start {
                FrameState::HeadOfSequence
            } else {
                FrameState::Used
            };
            self.set(i, state);
        }
        info!("Marked {count} frames from {first} inaccessible");
        Ok(())
    }

    fn index_of(&self, frame: FrameNumber) -> Option<u32> {
        self.contains(frame)
            .then(|| frame.as_u32() - self.base.as_u32())
    }

    fn get(&self, i: u32) -> FrameState {
        let byte = self.bitmap[(i / Self::FRAMES_PER_BYTE) as usize];
        FrameState::from_bits(byte >> ((i % Self::FRAMES_PER_BYTE) * 2))
    }

    fn set(&mut self, i: u32, state: FrameState) {
        let shift = (i % Self::FRAMES_PER_BYTE) * 2;
        let byte = &mut self.bitmap[(i / Self::FRAMES_PER_BYTE) as usize];
        *byte = (*byte & !(0b11 << shift)) | ((state as u8) << shift);
    }
}

impl FramePool for ContFramePool<'_> {
    fn get_frames(&mut self, count: u32) -> Result<FrameNumber, FramePoolError> {
        if count == 0 || count > self.free {
            return Err(FramePoolError::Exhausted { requested: count });
        }

        let mut run = 0;
        for i in 0..self.n_frames {
            if self.get(i) != FrameState::Free {
                run = 0;
                continue;
            }
            run += 1;
            if run == count {
                let start = i + 1 - count;
                self.set(start, FrameState::HeadOfSequence);
                for j in start + 1..=i {
                    self.set(j, FrameState::Used);
                }
                self.free -= count;
                let first = self.base + start;
                debug!("Allocated {count} frames at {first}");
                return Ok(first);
            }
        }

        Err(FramePoolError::Exhausted { requested: count })
    }

    fn release_frames(&mut self, first: FrameNumber) -> Result<(), FramePoolError> {
        let Some(start) = self.index_of(first) else {
            return Err(FramePoolError::OutOfRange(first));
        };
        if self.get(start) != FrameState::HeadOfSequence {
            return Err(FramePoolError::NotAllocated(first));
        }

        self.set(start, FrameState::Free);
        let mut released = 1;
        let mut i = start + 1;
        while i < self.n_frames && self.get(i) == FrameState::Used {
            self.set(i, FrameState::Free);
            released += 1;
            i += 1;
        }
        self.free += released;
        debug!("Released {released} frames at {first}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(info: &mut [u8], n: u32) -> ContFramePool<'_> {
        ContFramePool::new(FrameNumber::new(100), n, info).unwrap()
    }

    #[test]
    fn bookkeeping_size() {
        assert_eq!(ContFramePool::needed_info_bytes(0), 0);
        assert_eq!(ContFramePool::needed_info_bytes(1), 1);
        assert_eq!(ContFramePool::needed_info_bytes(4), 1);
        assert_eq!(ContFramePool::needed_info_bytes(5), 2);
        assert_eq!(ContFramePool::needed_info_bytes(7168), 1792);

        let mut info = [0u8; 1];
        assert_eq!(
            ContFramePool::new(FrameNumber::new(0), 8, &mut info).map(|p| p.free_frames()),
            Err(FramePoolError::InfoTooSmall {
                needed: 2,
                provided: 1
            })
        );
    }

    #[test]
    fn first_fit_and_sequence_release() {
        let mut info = [0xFFu8; 4];
        let mut p = pool(&mut info, 16);
        let a = p.get_frames(3).unwrap();
        let b = p.get_frames(2).unwrap();
        assert_eq!(a, FrameNumber::new(100));
        assert_eq!(b, FrameNumber::new(103));
        assert_eq!(p.state(a), Some(FrameState::HeadOfSequence));
        assert_eq!(p.state(a + 1), Some(FrameState::Used));
        assert_eq!(p.free_frames(), 11);

        p.release_frames(a).unwrap();
        assert_eq!(p.free_frames(), 14);
        assert_eq!(p.state(b), Some(FrameState::HeadOfSequence), "neighbour untouched");

        // the hole is reused first fit
        assert_eq!(p.get_frames(1).unwrap(), FrameNumber::new(100));
        // a run of four does not fit the remaining two-frame hole
        assert_eq!(p.get_frames(4).unwrap(), FrameNumber::new(105));
    }

    #[test]
    fn release_requires_a_head() {
        let mut info = [0u8; 4];
        let mut p = pool(&mut info, 16);
        let a = p.get_frames(2).unwrap();
        assert_eq!(p.release_frames(a + 1), Err(FramePoolError::NotAllocated(a + 1)));
        assert_eq!(
            p.release_frames(FrameNumber::new(99)),
            Err(FramePoolError::OutOfRange(FrameNumber::new(99)))
        );
        p.release_frames(a).unwrap();
        assert_eq!(p.release_frames(a), Err(FramePoolError::NotAllocated(a)));
    }

    #[test]
    fn exhaustion() {
        let mut info = [0u8; 1];
        let mut p = pool(&mut info, 4);
        assert_eq!(p.get_frames(0), Err(FramePoolError::Exhausted { requested: 0 }));
        assert_eq!(p.get_frames(5), Err(FramePoolError::Exhausted { requested: 5 }));
        p.get_frames(4).unwrap();
        assert_eq!(p.get_frames(1), Err(FramePoolError::Exhausted { requested: 1 }));
    }

    #[test]
    fn holes_are_never_handed_out() {
        let mut info = [0u8; 4];
        let mut p = pool(&mut info, 16);
        p.mark_inaccessible(FrameNumber::new(102), 4).unwrap();
        assert_eq!(p.free_frames(), 12);
        assert_eq!(p.get_frames(3).unwrap(), FrameNumber::new(106));
        assert_eq!(p.get_frames(2).unwrap(), FrameNumber::new(100));
        assert_eq!(
            p.mark_inaccessible(FrameNumber::new(114), 4),
            Err(FramePoolError::OutOfRange(FrameNumber::new(116)))
        );
        assert_eq!(
            p.mark_inaccessible(FrameNumber::new(110), u32::MAX),
            Err(FramePoolError::OutOfRange(FrameNumber::new(116)))
        );
        assert_eq!(p.free_frames(), 7, "rejected ranges change nothing");
    }
}
