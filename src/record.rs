//! Recorded microdata.

use serde::{Deserialize, Serialize};

/// Worker row of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: usize,
    pub class: usize,
    pub productivity: f64,
    pub hours: f64,
    pub employer: Option<usize>,
    pub employer_size: Option<usize>,
    pub wage: f64,
    pub educated: bool,
    pub searched: bool,
    pub switched: bool,
}

/// Firm row of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmRecord {
    pub id: usize,
    pub discount_factor: f64,
    pub size: usize,
    pub size_by_class: [usize; 2],
    pub output: f64,
    pub output_by_class: [f64; 2],
    pub costs: f64,
    pub revenue: f64,
    pub profit: f64,
}

/// Snapshot of the market at a given step.
///
/// Step 0 is the state right after setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub step: usize,
    pub workers: Vec<WorkerRecord>,
    pub firms: Vec<FirmRecord>,
}
