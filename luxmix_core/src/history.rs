use std::collections::VecDeque;

use crate::types::Frame;

/// Fixed-depth ring of mixed frames, newest at index 0.
///
/// Depth and width are set once per configuration; `begin_frame` recycles
/// the oldest frame's allocation so the steady-state loop never allocates.
pub struct HistoryBuffer {
    frames: VecDeque<Frame>,
    width: usize,
}

impl HistoryBuffer {
    pub fn new(depth: usize, width: usize) -> Self {
        let depth = depth.max(1);
        let mut frames = VecDeque::with_capacity(depth);
        for _ in 0..depth {
            frames.push_back(vec![0.0; width]);
        }
        HistoryBuffer { frames, width }
    }

    /// Depth from a retention window: every tick in `retention_ms` stays
    /// addressable, and there is always at least the current frame.
    pub fn for_retention(retention_ms: f64, tick_ms: f64) -> usize {
        if tick_ms <= 0.0 {
            return 1;
        }
        ((retention_ms / tick_ms).ceil() as usize).max(1)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Rotate the ring: the oldest frame is reused as the new head, loaded
    /// with `base`. Returns the head for in-place mixing.
    pub fn begin_frame(&mut self, base: &[f64]) -> &mut Frame {
        let mut frame = self.frames.pop_back().unwrap_or_else(|| vec![0.0; self.width]);
        frame.clear();
        frame.extend_from_slice(base);
        frame.resize(self.width, 0.0);
        self.frames.push_front(frame);
        self.frames.front_mut().unwrap()
    }

    pub fn head(&self) -> &Frame {
        // Constructed non-empty and never drained.
        &self.frames[0]
    }

    /// Frame `delay` ticks ago, clamped to the oldest retained frame.
    pub fn delayed(&self, delay: usize) -> &Frame {
        &self.frames[delay.min(self.frames.len() - 1)]
    }
}
