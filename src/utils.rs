use std::time::{
    Duration,
    Instant,
};

use log::{
    debug,
    info,
    trace,
};
use num_traits::{
    Float,
    NumCast,
};

pub struct ContextTimer {
    start: Instant,
    name: String,
    level: LogLevel,
    report_start: bool,
    cumtime: Duration,
}

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    INFO,
    DEBUG,
    TRACE,
}

impl ContextTimer {
    pub fn new(
        name: &str,
        report_start: bool,
        level: LogLevel,
    ) -> ContextTimer {
        let out = ContextTimer {
            start: Instant::now(),
            name: name.to_string(),
            level,
            report_start,
            cumtime: Duration::new(0, 0),
        };
        if report_start {
            out.start_msg();
        }
        out
    }

    fn start_msg(&self) {
        match self.level {
            LogLevel::INFO => info!("Started: '{}'", self.name),
            LogLevel::DEBUG => debug!("Started: '{}'", self.name),
            LogLevel::TRACE => trace!("Started: '{}'", self.name),
        }
    }

    pub fn stop(
        &mut self,
        report: bool,
    ) -> Duration {
        let duration = self.start.elapsed();
        self.cumtime += duration;
        if report {
            self.report();
        }
        duration
    }

    pub fn report(&self) {
        let duration_ms = self.cumtime.as_micros() as f64 / 1000.;
        match self.level {
            LogLevel::INFO => info!("Time elapsed in '{}' is: {:.03}ms", self.name, duration_ms),
            LogLevel::DEBUG => debug!("Time elapsed in '{}' is: {:.03}ms", self.name, duration_ms),
            LogLevel::TRACE => trace!("Time elapsed in '{}' is: {:.03}ms", self.name, duration_ms),
        }
    }

    pub fn start_sub_timer(
        &self,
        name: &str,
    ) -> ContextTimer {
        ContextTimer::new(
            &format!("{}::{}", self.name, name),
            self.report_start,
            self.level,
        )
    }
}

/// Running mean and population variance (Welford), without storing the
/// samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningStats<T> {
    n: u64,
    mean: T,
    m2: T,
    min: Option<T>,
    max: Option<T>,
}

impl<T: Float + Default> RunningStats<T> {
    pub fn add(
        &mut self,
        x: T,
    ) {
        self.n += 1;
        let n = <T as NumCast>::from(self.n).unwrap_or_else(T::one);
        let delta = x - self.mean;
        self.mean = self.mean + delta / n;
        self.m2 = self.m2 + delta * (x - self.mean);

        if self.min.map_or(true, |m| x < m) {
            self.min = Some(x);
        }
        if self.max.map_or(true, |m| x > m) {
            self.max = Some(x);
        }
    }

    pub fn from_slice(data: &[T]) -> Self {
        let mut out = Self::default();
        for x in data {
            out.add(*x);
        }
        out
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn get_mean(&self) -> T {
        self.mean
    }

    /// Population variance (no Bessel correction).
    pub fn get_variance(&self) -> T {
        if self.n == 0 {
            return T::zero();
        }
        self.m2 / <T as NumCast>::from(self.n).unwrap_or_else(T::one)
    }

    pub fn get_sd(&self) -> T {
        self.get_variance().sqrt()
    }

    pub fn get_min(&self) -> Option<T> {
        self.min
    }

    pub fn get_max(&self) -> Option<T> {
        self.max
    }
}

/// Indices that would sort `values`, using the IEEE total order.
/// The sort is stable, so equal values keep their original order.
pub fn argsort_f64(values: &[f64]) -> Vec<usize> {
    let mut indices = (0..values.len()).collect::<Vec<_>>();
    indices.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    indices
}

/// Returns the `[left, right)` index range of the elements of a sorted
/// slice that fall inside the inclusive bounds. Missing bounds are open.
///
/// Usage:
/// ```rust
/// use specmesh::utils::inclusive_range;
/// let data: [f64; 7] = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0];
/// let (left, right) = inclusive_range(&data, Some(1.5), Some(3.0));
/// assert_eq!(&data[left..right], &[1.5, 2.0, 2.5, 3.0]);
/// let (left, right) = inclusive_range(&data, None, Some(0.5));
/// assert_eq!(left, right);
/// let (left, right) = inclusive_range(&data, Some(3.2), None);
/// assert_eq!(&data[left..right], &[3.5, 4.0]);
/// let empty: [f64; 0] = [];
/// assert_eq!(inclusive_range(&empty, Some(1.0), Some(2.0)), (0, 0));
/// ```
#[inline]
pub fn inclusive_range(
    sorted: &[f64],
    low: Option<f64>,
    high: Option<f64>,
) -> (usize, usize) {
    let left = match low {
        Some(low) => sorted.partition_point(|x| *x < low),
        None => 0,
    };
    let right = match high {
        Some(high) => sorted.partition_point(|x| *x <= high),
        None => sorted.len(),
    };
    (left, right.max(left))
}
