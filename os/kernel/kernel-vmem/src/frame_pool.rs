//! # Physical frame sources
//!
//! The paging code never owns physical memory. It asks a [`FramePool`] for
//! frames when it needs a page directory, a page table, or a data frame, and
//! hands frames back when a page is freed. Two pools are in play:
//!
//! - the **kernel pool**, always reachable through the identity-mapped shared
//!   region, supplies page directories (and page tables in
//!   [`PagingMode::Identity`](crate::PagingMode::Identity));
//! - the **process pool** supplies data frames (and page tables in
//!   [`PagingMode::Recursive`](crate::PagingMode::Recursive)).

use crate::addresses::FrameNumber;

/// A source of contiguous physical frames.
pub trait FramePool {
    /// Allocate `count` physically contiguous frames and return the first.
    ///
    /// # Errors
    /// [`FramePoolError::Exhausted`] if no run of `count` free frames exists.
    fn get_frames(&mut self, count: u32) -> Result<FrameNumber, FramePoolError>;

    /// Release the sequence that starts at `first`.
    ///
    /// # Errors
    /// [`FramePoolError::OutOfRange`] if `first` is not managed by this pool,
    /// [`FramePoolError::NotAllocated`] if it does not start a live sequence.
    fn release_frames(&mut self, first: FrameNumber) -> Result<(), FramePoolError>;
}

impl<T: FramePool + ?Sized> FramePool for &mut T {
    #[inline]
    fn get_frames(&mut self, count: u32) -> Result<FrameNumber, FramePoolError> {
        (**self).get_frames(count)
    }

    #[inline]
    fn release_frames(&mut self, first: FrameNumber) -> Result<(), FramePoolError> {
        (**self).release_frames(first)
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum FramePoolError {
    #[error("no run of {requested} free frames available")]
    Exhausted { requested: u32 },
    #[error("frame {0} does not start an allocated sequence")]
    NotAllocated(FrameNumber),
    #[error("frame {0} is not managed by this pool")]
    OutOfRange(FrameNumber),
    #[error("pool bookkeeping needs {needed} bytes, got {provided}")]
    InfoTooSmall { needed: usize, provided: usize },
}
