use std::collections::VecDeque;

use crate::detection::DetectionCandidate;

/// FIFO of per-frame candidate sets, bounded to `max_history` frames.
#[derive(Debug, Clone)]
pub struct StabilizationWindow {
    frames: VecDeque<Vec<DetectionCandidate>>,
    max_history: usize,
}

impl StabilizationWindow {
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            frames: VecDeque::with_capacity(max_history + 1),
            max_history,
        }
    }

    /// Append a frame, evicting the oldest ones beyond capacity.
    pub fn push(&mut self, frame: Vec<DetectionCandidate>) {
        self.frames.push_back(frame);
        while self.frames.len() > self.max_history {
            self.frames.pop_front();
        }
    }

    /// The most recent `n` frames, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Vec<DetectionCandidate>> {
        let skip = self.frames.len().saturating_sub(n);
        self.frames.iter().skip(skip)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
