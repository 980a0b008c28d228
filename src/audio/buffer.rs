//! Bounded sample store between the capture callback and the recognizer.
//!
//! The `mic-capture` thread pushes 16 kHz samples; the recognizer drains
//! them every poll.  Once `capacity` samples are held, the oldest are
//! dropped, so a forgotten session never grows without bound.
//!
//! ```rust
//! use hud_agent::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.drain(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

use std::collections::VecDeque;

pub struct RingBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// A zero `capacity` is raised to one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `data`, evicting the oldest samples past `capacity`.
    pub fn push_slice(&mut self, data: &[T]) {
        // Only the newest `capacity` items of an oversized slice can survive.
        let data = &data[data.len().saturating_sub(self.capacity)..];
        let overflow = (self.samples.len() + data.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(data.iter().copied());
    }

    /// Everything held, oldest first.  Leaves the buffer empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.samples.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
