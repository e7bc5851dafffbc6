//! Fixed-capacity history and rolling per-tick counters.

use shopfloor_core::fixed::Fixed64;

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of [`Fixed64`] samples. When full, the oldest
/// sample is overwritten. Iterates oldest to newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Fixed64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![Fixed64::ZERO; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: Fixed64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<Fixed64> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity() - 1) % self.capacity();
        Some(self.data[idx])
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Fixed64> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).map(move |i| self.data[(start + i) % self.capacity()])
    }

    pub fn to_vec(&self) -> Vec<Fixed64> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.data.fill(Fixed64::ZERO);
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// RollingWindow
// ---------------------------------------------------------------------------

/// A count over the most recent N ticks.
///
/// Call [`add`](Self::add) during a tick and [`commit`](Self::commit) once at
/// its end. Queries include the uncommitted current tick.
#[derive(Debug, Clone)]
pub(crate) struct RollingWindow {
    tick_counts: Vec<u64>,
    write_pos: usize,
    committed_total: u64,
    current: u64,
    /// Committed ticks held, capped at the window size.
    committed_count: usize,
}

impl RollingWindow {
    /// A size of 0 is clamped to 1.
    pub(crate) fn new(window_size: usize) -> Self {
        Self {
            tick_counts: vec![0; window_size.max(1)],
            write_pos: 0,
            committed_total: 0,
            current: 0,
            committed_count: 0,
        }
    }

    pub(crate) fn add(&mut self, count: u64) {
        self.current += count;
    }

    /// Close the current tick, evicting the oldest when full.
    pub(crate) fn commit(&mut self) {
        let size = self.tick_counts.len();
        if self.committed_count == size {
            self.committed_total -= self.tick_counts[self.write_pos];
        }
        self.tick_counts[self.write_pos] = self.current;
        self.committed_total += self.current;
        self.current = 0;
        self.write_pos = (self.write_pos + 1) % size;
        if self.committed_count < size {
            self.committed_count += 1;
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.committed_total + self.current
    }

    /// Ticks covered by [`total`](Self::total).
    pub(crate) fn ticks(&self) -> usize {
        if self.current > 0 {
            self.committed_count + 1
        } else {
            self.committed_count
        }
    }

    /// Average count per tick.
    pub(crate) fn rate(&self) -> Fixed64 {
        let ticks = self.ticks();
        if ticks == 0 {
            return Fixed64::ZERO;
        }
        Fixed64::saturating_from_num(self.total()) / Fixed64::saturating_from_num(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    #[test]
    fn ring_buffer_wraps_oldest_first() {
        let mut buf = RingBuffer::new(3);
        for i in 1..=5 {
            buf.push(f(i as f64));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.to_vec(), vec![f(3.0), f(4.0), f(5.0)]);
        assert_eq!(buf.latest(), Some(f(5.0)));
    }

    #[test]
    fn ring_buffer_zero_capacity_is_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(f(2.0));
        buf.push(f(3.0));
        assert_eq!(buf.to_vec(), vec![f(3.0)]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);
    }

    #[test]
    fn rolling_window_evicts_old_ticks() {
        let mut w = RollingWindow::new(2);
        w.add(4);
        w.commit();
        w.add(2);
        w.commit();
        assert_eq!(w.total(), 6);
        assert_eq!(w.rate(), f(3.0));
        w.commit();
        assert_eq!(w.total(), 2);
        assert_eq!(w.rate(), f(1.0));
    }

    #[test]
    fn rolling_window_counts_current_tick() {
        let mut w = RollingWindow::new(4);
        assert_eq!(w.rate(), Fixed64::ZERO);
        w.add(3);
        assert_eq!(w.total(), 3);
        assert_eq!(w.ticks(), 1);
        assert_eq!(w.rate(), f(3.0));
    }
}
