//! Floating point helpers: tolerance comparison (backed by `approx`) and
//! streaming sample moments for summarizing draws.

use approx::AbsDiffEq;

/// Default absolute tolerance for `almost_eq`.
pub const ACC: f64 = 10e-11;

/// Compares two floats with a maximum absolute difference of `acc`. Equal
/// infinities compare equal.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

#[macro_export]
macro_rules! assert_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`)",
                $prec, $a, $b
            );
        }
    };
}

/// Running count, mean, variance and range of a stream of samples (Welford's
/// algorithm). NaN samples are counted separately and excluded from the
/// moments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleMoments {
    count: u64,
    nan_count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl SampleMoments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            self.nan_count += 1;
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn nan_count(&self) -> u64 {
        self.nan_count
    }

    /// `None` until at least one sample has been pushed.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased sample variance; `None` with fewer than two samples.
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let degrees_of_freedom = (self.count - 1) as f64;
        Some(self.m2 / degrees_of_freedom)
    }

    #[must_use]
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    #[must_use]
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

impl Extend<f64> for SampleMoments {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for SampleMoments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut moments = SampleMoments::new();
        moments.extend(iter);
        moments
    }
}
