pub const DEFAULT_LATENCY_WINDOW: usize = 20;

/// Mean of the last `capacity` values, kept as a running sum over a
/// circular history.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    history: Vec<f32>,
    next: usize,
    count: usize,
    sum: f32,
}

impl RollingAverage {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![0.0; capacity.max(1)],
            next: 0,
            count: 0,
            sum: 0.0,
        }
    }

    /// Adds `value` and returns the updated average.
    pub fn accumulate(&mut self, value: f32) -> f32 {
        if self.count == self.history.len() {
            self.sum -= self.history[self.next];
        } else {
            self.count += 1;
        }
        self.history[self.next] = value;
        self.sum += value;
        self.next = (self.next + 1) % self.history.len();
        self.average()
    }

    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f32
    }

    pub fn sum(&self) -> f32 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.history.fill(0.0);
        self.next = 0;
        self.count = 0;
        self.sum = 0.0;
    }
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_on_constant_input() {
        let mut avg = RollingAverage::new(20);
        for _ in 0..25 {
            avg.accumulate(1.0);
        }
        assert_eq!(avg.average(), 1.0);
        assert_eq!(avg.len(), 20);
    }

    #[test]
    fn alternating_input_settles_at_mean() {
        let mut avg = RollingAverage::new(20);
        for i in 0..40 {
            avg.accumulate(if i % 2 == 0 { 0.0 } else { 2.0 });
        }
        assert_eq!(avg.average(), 1.0);
    }

    #[test]
    fn partial_window_uses_count_so_far() {
        let mut avg = RollingAverage::new(20);
        assert_eq!(avg.average(), 0.0);
        assert_eq!(avg.accumulate(3.0), 3.0);
        assert_eq!(avg.accumulate(5.0), 4.0);
    }

    #[test]
    fn oldest_value_leaves_the_window() {
        let mut avg = RollingAverage::new(3);
        avg.accumulate(9.0);
        avg.accumulate(0.0);
        avg.accumulate(0.0);
        assert_eq!(avg.average(), 3.0);
        assert_eq!(avg.accumulate(0.0), 0.0);
    }

    #[test]
    fn window_of_one() {
        let mut avg = RollingAverage::new(1);
        assert_eq!(avg.accumulate(4.0), 4.0);
        assert_eq!(avg.accumulate(-2.0), -2.0);

        let mut zero = RollingAverage::new(0);
        assert_eq!(zero.capacity(), 1);
        assert_eq!(zero.accumulate(7.0), 7.0);
    }
}
