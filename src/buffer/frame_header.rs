use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One slot of the buffer pool: a page-sized byte buffer plus the metadata
/// the manager needs to track residency.
///
/// The pin count is the ownership token: while it is above zero the frame
/// stays bound to its page id and cannot be recycled. The dirty flag records
/// that the in-memory bytes differ from disk; it is only ever cleared after
/// a successful write-back.
pub struct FrameHeader {
    /// Position of this frame in the pool's frame array
    frame_id: FrameId,
    /// The page currently held, INVALID_PAGE_ID while the frame is free
    page_id: RwLock<PageId>,
    /// Number of outstanding pins
    pin_count: AtomicU32,
    /// In-memory bytes diverge from the on-disk page
    is_dirty: AtomicBool,
    /// The page bytes themselves
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        *self.page_id.read()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.write() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Takes a pin, returning the new count.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Releases a pin and returns the remaining count, or `None` if the
    /// frame was not pinned (the count never goes below zero).
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Shared access to the page bytes.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Exclusive access to the page bytes. Writing through this guard does
    /// not mark the frame dirty; pass `is_dirty` on unpin instead.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Overwrites the frame's bytes from `src`.
    pub fn copy_from(&self, src: &[u8]) {
        assert_eq!(src.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(src);
    }

    /// Copies the frame's bytes into `dst`.
    pub fn copy_to(&self, dst: &mut [u8]) {
        assert_eq!(dst.len(), PAGE_SIZE);
        dst.copy_from_slice(&**self.data.read());
    }

    /// Returns the frame to its pristine free state.
    pub fn reset(&self) {
        *self.page_id.write() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
