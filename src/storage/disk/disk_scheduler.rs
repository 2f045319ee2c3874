use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::common::{BurrowError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// A single disk I/O request, queued for the background worker.
pub struct DiskRequest {
    /// Write when true, read otherwise
    pub is_write: bool,
    /// The page to read or write
    pub page_id: PageId,
    /// Buffer of exactly PAGE_SIZE bytes: destination for reads, source for
    /// writes. Must stay valid until the completion signal fires.
    pub data: *mut u8,
    /// Fulfilled exactly once with the outcome of the underlying I/O
    pub callback: Option<mpsc::Sender<bool>>,
}

// Safety: the pointer is only dereferenced by the worker thread, and callers
// of the sync entry points block until the completion signal fires.
unsafe impl Send for DiskRequest {}

impl DiskRequest {
    pub fn read(page_id: PageId, data: *mut u8) -> Self {
        Self {
            is_write: false,
            page_id,
            data,
            callback: None,
        }
    }

    pub fn write(page_id: PageId, data: *mut u8) -> Self {
        Self {
            is_write: true,
            page_id,
            data,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: mpsc::Sender<bool>) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// DiskScheduler serialises disk I/O through a single background worker that
/// owns the only path to the [`DiskManager`]. Requests drain FIFO, so two
/// requests queued by the same caller complete in submission order. Callers
/// needing synchronous semantics wait on the per-request completion signal;
/// enqueueing without a callback is a fire-and-forget write.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Sender<DiskRequest>,
    shutdown: Arc<AtomicBool>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a scheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_dm = Arc::clone(&disk_manager);
        let worker_shutdown = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || {
            Self::worker_loop(worker_dm, receiver, worker_shutdown);
        });

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Enqueues a request for the worker. Returns once the request is
    /// queued, not once it completes.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| BurrowError::DiskScheduler(format!("failed to schedule request: {}", e)))
    }

    /// Reads `page_id` into `data`, blocking until the I/O completes.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = mpsc::channel();
        self.schedule(DiskRequest::read(page_id, data.as_mut_ptr()).with_callback(tx))?;
        Self::await_completion(rx, page_id)
    }

    /// Writes `data` to `page_id`, blocking until the I/O completes.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = mpsc::channel();
        // the worker only reads through the pointer for a write request
        let request = DiskRequest::write(page_id, data.as_ptr() as *mut u8).with_callback(tx);
        self.schedule(request)?;
        Self::await_completion(rx, page_id)
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Blocks on a completion signal and surfaces an I/O failure as an
    /// error. No retry happens at this layer.
    fn await_completion(rx: mpsc::Receiver<bool>, page_id: PageId) -> Result<()> {
        let success = rx.recv().map_err(|e| {
            BurrowError::DiskScheduler(format!("completion signal lost: {}", e))
        })?;
        if !success {
            return Err(BurrowError::DiskScheduler(format!(
                "I/O failed for {}",
                page_id
            )));
        }
        Ok(())
    }

    /// Drains requests until shutdown is signalled, then drains whatever is
    /// still queued and exits.
    fn worker_loop(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(&disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => Self::process_request(&disk_manager, request),
                // wake up to re-check the shutdown flag
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        let result = if request.is_write {
            // Safety: the submitter guarantees PAGE_SIZE valid bytes until
            // the completion signal fires
            let data = unsafe { std::slice::from_raw_parts(request.data, PAGE_SIZE) };
            disk_manager.write_page(request.page_id, data)
        } else {
            // Safety: as above, and the submitter holds the only other
            // reference while blocked on the callback
            let data = unsafe { std::slice::from_raw_parts_mut(request.data, PAGE_SIZE) };
            disk_manager.read_page(request.page_id, data)
        };

        if let Err(e) = &result {
            warn!("disk request for {} failed: {}", request.page_id, e);
        }

        if let Some(callback) = request.callback {
            let _ = callback.send(result.is_ok());
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
        debug!("disk scheduler shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = PageId::new(0);
        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler.schedule_write_sync(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_same_caller_order() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = PageId::new(0);

        // successive writes to the same page complete in submission order,
        // so the last value wins
        for i in 0..4u8 {
            let mut data = [0u8; PAGE_SIZE];
            data[0] = i;
            scheduler.schedule_write_sync(page_id, &data).unwrap();
        }

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();
        assert_eq!(read_data[0], 3);
    }

    #[test]
    fn test_disk_scheduler_drains_on_drop() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let dm = Arc::new(DiskManager::new(&path).unwrap());
            let scheduler = DiskScheduler::new(dm);
            let mut data = [0u8; PAGE_SIZE];
            data[7] = 7;
            scheduler.schedule_write_sync(PageId::new(2), &data).unwrap();
        }

        // the write landed before the scheduler went away
        let dm = DiskManager::new(&path).unwrap();
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(2), &mut data).unwrap();
        assert_eq!(data[7], 7);
    }
}
