use std::collections::VecDeque;

use crate::canvas::Frame;

const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

// ============================================================================
// HISTORY MANAGER - linear frame history with a cursor
// ============================================================================

/// Ordered committed frames plus the index of the one on screen.
///
/// History is a line, not a tree: committing while the cursor is behind the
/// newest frame discards everything after the cursor first.
pub struct HistoryManager {
    frames: VecDeque<Frame>,
    /// `None` until the first commit.
    step: Option<usize>,
    /// Optional depth cap; `None` keeps every frame.
    max_history_size: Option<usize>,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running total: every distinct ink buffer once, plus descriptions.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    /// Unbounded depth with the default 256 MiB memory cap.
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            step: None,
            max_history_size: None,
            max_memory_bytes: Some(DEFAULT_MEMORY_LIMIT),
            total_memory: 0,
        }
    }

    /// Cap the number of frames. Zero is treated as one.
    pub fn with_depth_limit(mut self, max_history_size: Option<usize>) -> Self {
        self.max_history_size = max_history_size.map(|n| n.max(1));
        self
    }

    pub fn with_memory_limit(mut self, max_memory_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn commit(&mut self, frame: Frame) {
        let keep = self.step.map_or(0, |s| s + 1);
        while self.frames.len() > keep {
            if let Some(dropped) = self.frames.pop_back() {
                self.release(&dropped);
            }
        }

        self.total_memory += self.cost_of(&frame);
        self.frames.push_back(frame);
        self.step = Some(self.frames.len() - 1);

        self.prune();
    }

    /// Step back one frame and return it, or `None` at the oldest frame.
    pub fn undo(&mut self) -> Option<&Frame> {
        match self.step {
            Some(s) if s > 0 => {
                self.step = Some(s - 1);
                self.frames.get(s - 1)
            }
            _ => None,
        }
    }

    /// Step forward one frame and return it, or `None` at the newest frame.
    pub fn redo(&mut self) -> Option<&Frame> {
        let next = self.step.map_or(0, |s| s + 1);
        if next < self.frames.len() && self.step.is_some() {
            self.step = Some(next);
            self.frames.get(next)
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&Frame> {
        self.step.and_then(|s| self.frames.get(s))
    }

    pub fn can_undo(&self) -> bool {
        self.step.is_some_and(|s| s > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.step.is_some_and(|s| s + 1 < self.frames.len())
    }

    pub fn step(&self) -> Option<usize> {
        self.step
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn undo_count(&self) -> usize {
        self.step.unwrap_or(0)
    }

    pub fn redo_count(&self) -> usize {
        self.step.map_or(0, |s| self.frames.len() - 1 - s)
    }

    /// Descriptions up to and including the current frame, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        let end = self.step.map_or(0, |s| s + 1);
        self.frames
            .iter()
            .take(end)
            .rev()
            .map(|f| f.description().to_string())
            .collect()
    }

    /// Bytes held. An ink buffer shared by several frames counts once.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.step = None;
        self.total_memory = 0;
    }

    /// Evict the oldest frames to stay within the depth and memory caps.
    /// The cursor moves with the frames so it still indexes the same one.
    fn prune(&mut self) {
        let mut evicted = 0usize;
        if let Some(max_frames) = self.max_history_size {
            while self.frames.len() > max_frames {
                self.evict_oldest();
                evicted += 1;
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.frames.len() > 1 {
                self.evict_oldest();
                evicted += 1;
            }
        }

        if evicted > 0 {
            log_info!(
                "history: evicted {} oldest frame(s), {} remain ({} bytes)",
                evicted,
                self.frames.len(),
                self.total_memory
            );
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(removed) = self.frames.pop_front() {
            self.release(&removed);
            self.step = match self.step {
                Some(s) if s > 0 => Some(s - 1),
                Some(_) if !self.frames.is_empty() => Some(0),
                _ => None,
            };
        }
    }

    /// Bytes `frame` adds on top of the frames already held.
    fn cost_of(&self, frame: &Frame) -> usize {
        if self.frames.iter().any(|f| f.shares_pixels_with(frame)) {
            frame.description().len()
        } else {
            frame.memory_bytes()
        }
    }

    /// Account for a frame that was just removed from `frames`.
    fn release(&mut self, removed: &Frame) {
        let cost = self.cost_of(removed);
        self.total_memory = self.total_memory.saturating_sub(cost);
    }
}
