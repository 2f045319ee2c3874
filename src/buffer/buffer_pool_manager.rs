use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{AccessType, BurrowError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::recovery::LogManager;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer};

/// BufferPoolManager caches disk pages in a fixed array of in-memory frames.
///
/// A page is resolved through the page table on a hit, or bound to a frame
/// taken from the free list (falling back to LRU-K eviction) on a miss.
/// Fetching pins the frame; callers release the pin with [`unpin_page`],
/// optionally marking the page dirty. Dirty victims are written back through
/// the disk scheduler before their frame is reused.
///
/// Locking: the page table, free list, and replacer each sit behind their
/// own mutex, acquired one at a time (page table first where two overlap).
/// No lock is held while waiting on disk I/O; a frame in transit is
/// unreachable from every shared structure, which is what keeps it from
/// being stolen during the wait.
///
/// [`unpin_page`]: BufferPoolManager::unpin_page
pub struct BufferPoolManager {
    /// Number of frames in the pool
    pool_size: usize,
    /// Next page id to hand out, never reused
    next_page_id: AtomicU32,
    /// The frame array, fixed at construction
    frames: Vec<Arc<FrameHeader>>,
    /// Maps resident page ids to their frames
    page_table: Mutex<HashMap<PageId, FrameId>>,
    /// Frames holding no page
    free_list: Mutex<VecDeque<FrameId>>,
    /// Eviction policy, called with the manager's locks held
    replacer: Mutex<LruKReplacer>,
    /// Serialises all disk I/O behind a single worker
    disk_scheduler: DiskScheduler,
    /// Opaque log sink, unused by the cache itself
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames with an LRU-`replacer_k` policy
    /// over the given disk manager.
    pub fn new(
        pool_size: usize,
        replacer_k: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            next_page_id: AtomicU32::new(0),
            frames,
            page_table: Mutex::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruKReplacer::new(replacer_k, pool_size)),
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        }
    }

    /// Allocates a fresh page and binds it to a frame, returning the new
    /// page id and the frame pinned once. Returns `Ok(None)` when every
    /// frame is pinned and nothing can be evicted.
    pub fn new_page(&self) -> Result<Option<(PageId, Arc<FrameHeader>)>> {
        let Some(frame_id) = self.acquire_frame()? else {
            return Ok(None);
        };
        let page_id = self.allocate_page();

        let frame = &self.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();

        self.page_table.lock().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, AccessType::Unknown);
            replacer.set_evictable(frame_id, false);
        }

        debug!("allocated {} in {}", page_id, frame_id);
        Ok(Some((page_id, Arc::clone(frame))))
    }

    /// Returns the pinned frame holding `page_id`, reading it from disk on a
    /// miss. Returns `Ok(None)` when the pool has no frame to spare.
    pub fn fetch_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Option<Arc<FrameHeader>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BurrowError::InvalidPageId(page_id));
        }

        {
            let page_table = self.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                trace!("hit for {} in {}", page_id, frame_id);
                return Ok(Some(self.pin_resident(frame_id, access_type)));
            }
        }

        let Some(frame_id) = self.acquire_frame()? else {
            return Ok(None);
        };
        trace!("miss for {}, reading into {}", page_id, frame_id);

        let frame = &self.frames[frame_id.as_usize()];
        let mut buf = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut buf)?;
        frame.copy_from(&buf);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        let mut page_table = self.page_table.lock();
        if let Some(&resident) = page_table.get(&page_id) {
            // another thread loaded the page while we were reading;
            // hand our frame back and use the resident one
            let existing = self.pin_resident(resident, access_type);
            drop(page_table);
            frame.reset();
            self.free_list.lock().push_back(frame_id);
            return Ok(Some(existing));
        }
        page_table.insert(page_id, frame_id);
        drop(page_table);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id, access_type);
        replacer.set_evictable(frame_id, false);

        Ok(Some(Arc::clone(frame)))
    }

    /// Releases one pin on `page_id`, marking the frame dirty if requested.
    /// The dirty flag is only ever raised here, never cleared. Returns false
    /// when the page is not resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, _access_type: AccessType) -> bool {
        let page_table = self.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `page_id` to disk whether or not it is dirty, then clears the
    /// dirty flag. Returns false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let page_table = self.page_table.lock();
            match page_table.get(&page_id) {
                Some(&frame_id) => Arc::clone(&self.frames[frame_id.as_usize()]),
                None => return Ok(false),
            }
        };

        let mut buf = [0u8; PAGE_SIZE];
        frame.copy_to(&mut buf);
        self.disk_scheduler.schedule_write_sync(page_id, &buf)?;

        // only clear the flag if the frame still holds this page; it may
        // have been evicted and rebound while we waited on the write
        if frame.page_id() == page_id {
            frame.set_dirty(false);
        }
        debug!("flushed {}", page_id);
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.page_table.lock().keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drops `page_id` from the pool, returning its frame to the free list.
    /// Deleting a non-resident page trivially succeeds; deleting a pinned
    /// page fails and leaves the frame untouched.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut page_table = self.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        page_table.remove(&page_id);
        self.replacer.lock().remove(frame_id);
        frame.reset();
        self.free_list.lock().push_back(frame_id);

        debug!("deleted {} from {}", page_id, frame_id);
        Ok(true)
    }

    /// Current pin count of a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Hands out the next page id. The id space is monotone and never
    /// recycled; running into the sentinel is a fatal programming limit.
    fn allocate_page(&self) -> PageId {
        let id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        assert_ne!(id, INVALID_PAGE_ID.as_u32(), "page id space exhausted");
        PageId::new(id)
    }

    /// Pins an already-resident frame and tells the replacer about the
    /// access.
    fn pin_resident(&self, frame_id: FrameId, access_type: AccessType) -> Arc<FrameHeader> {
        let frame = &self.frames[frame_id.as_usize()];
        frame.pin();
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id, access_type);
        replacer.set_evictable(frame_id, false);
        Arc::clone(frame)
    }

    /// Produces a frame ready to hold a new page: from the free list if one
    /// is available, otherwise by evicting a victim and writing it back if
    /// dirty. Returns `Ok(None)` when no frame can be freed.
    fn acquire_frame(&self) -> Result<Option<FrameId>> {
        if let Some(frame_id) = self.free_list.lock().pop_front() {
            return Ok(Some(frame_id));
        }

        let victim = self.replacer.lock().evict();
        let Some(frame_id) = victim else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        // unmap the victim before the write-back wait so no reader can pin
        // a frame that is being recycled
        self.page_table.lock().remove(&old_page_id);

        if frame.is_dirty() {
            trace!("writing back dirty {} from {}", old_page_id, frame_id);
            let mut buf = [0u8; PAGE_SIZE];
            frame.copy_to(&mut buf);
            self.disk_scheduler.schedule_write_sync(old_page_id, &buf)?;
        }

        frame.reset();
        Ok(Some(frame_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm, None);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, frame) = bpm.new_page().unwrap().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());
        assert_eq!(bpm.free_frame_count(), 9);
    }

    #[test]
    fn test_new_page_ids_are_distinct() {
        let (bpm, _temp) = create_bpm(10);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let (page_id, _frame) = bpm.new_page().unwrap().unwrap();
            assert!(seen.insert(page_id));
            bpm.unpin_page(page_id, false, AccessType::Unknown);
        }
    }

    #[test]
    fn test_fetch_round_trip() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, frame) = bpm.new_page().unwrap().unwrap();
        frame.data_mut()[0] = 42;
        assert!(bpm.unpin_page(page_id, true, AccessType::Unknown));

        let frame = bpm.fetch_page(page_id, AccessType::Lookup).unwrap().unwrap();
        assert_eq!(frame.data()[0], 42);
        assert_eq!(frame.pin_count(), 1);
        assert!(bpm.unpin_page(page_id, false, AccessType::Unknown));
    }

    #[test]
    fn test_unpin_unknown_page_fails() {
        let (bpm, _temp) = create_bpm(10);
        assert!(!bpm.unpin_page(PageId::new(99), false, AccessType::Unknown));
    }

    #[test]
    fn test_unpin_unpinned_page_fails() {
        let (bpm, _temp) = create_bpm(10);
        let (page_id, _frame) = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(page_id, false, AccessType::Unknown));
        assert!(!bpm.unpin_page(page_id, false, AccessType::Unknown));
    }

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let (bpm, _temp) = create_bpm(2);

        let (p1, _f1) = bpm.new_page().unwrap().unwrap();
        let (_p2, _f2) = bpm.new_page().unwrap().unwrap();
        assert!(bpm.new_page().unwrap().is_none());

        // freeing one pin makes a frame reclaimable again
        bpm.unpin_page(p1, false, AccessType::Unknown);
        assert!(bpm.new_page().unwrap().is_some());
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);
        let (page_id, _frame) = bpm.new_page().unwrap().unwrap();

        // pinned: refused, frame untouched
        assert!(!bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), Some(1));

        bpm.unpin_page(page_id, false, AccessType::Unknown);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // deleting a non-resident page trivially succeeds
        assert!(bpm.delete_page(page_id).unwrap());
    }

    #[test]
    fn test_flush_clears_dirty() {
        let (bpm, _temp) = create_bpm(10);
        let (page_id, frame) = bpm.new_page().unwrap().unwrap();
        frame.data_mut()[0] = 9;
        bpm.unpin_page(page_id, true, AccessType::Unknown);
        assert!(frame.is_dirty());

        assert!(bpm.flush_page(page_id).unwrap());
        assert!(!frame.is_dirty());
        assert!(!bpm.flush_page(PageId::new(77)).unwrap());
    }

    #[test]
    fn test_dirty_eviction_writes_back() {
        let (bpm, _temp) = create_bpm(1);

        let (p1, frame) = bpm.new_page().unwrap().unwrap();
        frame.data_mut()[0] = 0xAA;
        bpm.unpin_page(p1, true, AccessType::Unknown);

        // evicts p1, forcing the dirty write-back
        let (p2, _frame) = bpm.new_page().unwrap().unwrap();
        bpm.unpin_page(p2, false, AccessType::Unknown);

        // reading p1 back observes the written bytes
        let frame = bpm.fetch_page(p1, AccessType::Lookup).unwrap().unwrap();
        assert_eq!(frame.data()[0], 0xAA);
        bpm.unpin_page(p1, false, AccessType::Unknown);
    }
}
