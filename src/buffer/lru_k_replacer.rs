use std::collections::{HashMap, VecDeque};

use crate::common::{AccessType, FrameId, Timestamp};

/// Access history for one tracked frame. Only the last `k` timestamps are
/// retained; ranking needs the oldest retained entry and nothing else.
#[derive(Debug)]
struct LruKNode {
    /// Access timestamps, oldest at the front, strictly increasing
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

impl LruKNode {
    fn new(timestamp: Timestamp) -> Self {
        let mut history = VecDeque::new();
        history.push_back(timestamp);
        Self {
            history,
            is_evictable: false,
        }
    }
}

/// LRU-K replacement policy.
///
/// The replacer ranks evictable frames in two tiers. A frame with fewer than
/// `k` recorded accesses is "cold" and is ranked by its first-ever access,
/// i.e. plain LRU. A frame with `k` or more accesses is "hot" and is ranked
/// by its k-th most recent access. Cold frames always lose to hot frames
/// regardless of timestamps, which keeps one-shot scan pages from displacing
/// genuinely hot pages.
///
/// The replacer does no locking of its own; the buffer pool manager calls it
/// with its latch held.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Number of frames the pool owns; valid frame ids are `0..num_frames`
    num_frames: usize,
    /// Monotone logical clock, advanced on every recorded access
    current_timestamp: Timestamp,
    /// Tracked frames
    node_store: HashMap<FrameId, LruKNode>,
    /// Count of nodes with the evictable flag set
    curr_size: usize,
}

impl LruKReplacer {
    /// Creates a replacer for a pool of `num_frames` frames using parameter
    /// `k`. Both must be positive.
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k > 0, "LRU-K requires k > 0");
        assert!(num_frames > 0, "replacer needs at least one frame");
        Self {
            k,
            num_frames,
            current_timestamp: 0,
            node_store: HashMap::new(),
            curr_size: 0,
        }
    }

    /// Selects and forgets a victim frame, or returns `None` when nothing is
    /// evictable. Cold frames (fewer than `k` accesses) are evicted first by
    /// earliest first access; otherwise the frame with the earliest k-th
    /// most recent access loses.
    pub fn evict(&mut self) -> Option<FrameId> {
        let mut cold: Option<(FrameId, Timestamp)> = None;
        let mut hot: Option<(FrameId, Timestamp)> = None;

        for (&frame_id, node) in &self.node_store {
            if !node.is_evictable {
                continue;
            }
            if node.history.len() < self.k {
                let first = *node.history.front().unwrap();
                if cold.map_or(true, |(_, best)| first < best) {
                    cold = Some((frame_id, first));
                }
            } else {
                let kth_recent = node.history[node.history.len() - self.k];
                if hot.map_or(true, |(_, best)| kth_recent < best) {
                    hot = Some((frame_id, kth_recent));
                }
            }
        }

        let (victim, _) = cold.or(hot)?;
        self.node_store.remove(&victim);
        self.curr_size -= 1;
        Some(victim)
    }

    /// Records an access to `frame_id` at the next clock tick, registering
    /// the frame (non-evictable) on first sight. The access type is recorded
    /// like any other today.
    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id {} out of range for pool of {} frames",
            frame_id,
            self.num_frames
        );

        self.current_timestamp += 1;
        let timestamp = self.current_timestamp;

        match self.node_store.get_mut(&frame_id) {
            Some(node) => {
                node.history.push_back(timestamp);
                while node.history.len() > self.k {
                    node.history.pop_front();
                }
            }
            None => {
                self.node_store.insert(frame_id, LruKNode::new(timestamp));
            }
        }
    }

    /// Flips the evictable flag of a tracked frame. Toggling a frame the
    /// replacer has never seen is a caller bug.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = self
            .node_store
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("set_evictable on untracked {}", frame_id));

        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                self.curr_size += 1;
            } else {
                self.curr_size -= 1;
            }
        }
    }

    /// Forgets a frame and its history. Unknown frames are ignored; removing
    /// a tracked frame that is not evictable is a caller bug.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.node_store.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "remove called on non-evictable {}",
            frame_id
        );
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
