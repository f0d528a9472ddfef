use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Default)]
pub struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.count += 1;
        let delta = val - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (val - self.mean);
    }

    /// Mean and sample standard deviation, `NaN` where undefined.
    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            count: self.count,
            mean: if self.count > 0 { self.mean } else { f64::NAN },
            std_dev: if self.count > 1 {
                (self.m2 / (self.count - 1) as f64).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        iter.into_iter().for_each(|val| acc.add(val));
        acc
    }
}

/// One value per recorded step.
#[derive(Debug, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub vals: Vec<f64>,
    /// Statistics over the second half of the series.
    pub late: AccumulatorReport,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let late = self.vals[self.vals.len() / 2..].iter().copied().collect::<Accumulator>();
        TimeSeriesReport {
            vals: self.vals.clone(),
            late: late.report(),
        }
    }
}
