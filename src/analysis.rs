use crate::config::Params;
use crate::record::Record;
use crate::stats::TimeSeries;
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::Path,
};

/// Observable computed from the sequence of records of a run.
pub trait Obs {
    fn update(&mut self, record: &Record);
    fn report(&self) -> serde_json::Value;
}

/// Per-class mean wage, mean productivity and share of educated workers.
pub struct ClassMeans {
    wage: [TimeSeries; 2],
    productivity: [TimeSeries; 2],
    educated: [TimeSeries; 2],
}

impl ClassMeans {
    pub fn new() -> Self {
        Self {
            wage: Default::default(),
            productivity: Default::default(),
            educated: Default::default(),
        }
    }
}

impl Obs for ClassMeans {
    fn update(&mut self, record: &Record) {
        for class in 0..2 {
            let mut n = 0;
            let mut wage = 0.0;
            let mut prod = 0.0;
            let mut n_educ = 0;
            for wkr in record.workers.iter().filter(|wkr| wkr.class == class) {
                n += 1;
                wage += wkr.wage;
                prod += wkr.productivity;
                n_educ += wkr.educated as usize;
            }
            // Empty classes yield NaN.
            let n = n as f64;
            self.wage[class].push(wage / n);
            self.productivity[class].push(prod / n);
            self.educated[class].push(n_educ as f64 / n);
        }
    }

    fn report(&self) -> serde_json::Value {
        let classes: Vec<_> = (0..2)
            .map(|class| {
                serde_json::json!({
                    "class": class,
                    "mean_wage": self.wage[class].report(),
                    "mean_productivity": self.productivity[class].report(),
                    "educated_share": self.educated[class].report(),
                })
            })
            .collect();
        serde_json::json!({ "classes": classes })
    }
}

/// Number of firms with employees and total profit.
pub struct FirmActivity {
    n_active: TimeSeries,
    total_profit: TimeSeries,
}

impl FirmActivity {
    pub fn new() -> Self {
        Self {
            n_active: TimeSeries::new(),
            total_profit: TimeSeries::new(),
        }
    }
}

impl Obs for FirmActivity {
    fn update(&mut self, record: &Record) {
        let n_active = record.firms.iter().filter(|firm| firm.size > 0).count();
        self.n_active.push(n_active as f64);
        self.total_profit
            .push(record.firms.iter().map(|firm| firm.profit).sum());
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "n_active_firms": self.n_active.report(),
            "total_profit": self.total_profit.report(),
        })
    }
}

pub struct Switches {
    n_switched: TimeSeries,
}

impl Switches {
    pub fn new() -> Self {
        Self {
            n_switched: TimeSeries::new(),
        }
    }
}

impl Obs for Switches {
    fn update(&mut self, record: &Record) {
        let n_switched = record.workers.iter().filter(|wkr| wkr.switched).count();
        self.n_switched.push(n_switched as f64);
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "n_switched": self.n_switched.report() })
    }
}

pub struct Analyzer {
    n_records: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(par: &Params) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(ClassMeans::new()),
            Box::new(FirmActivity::new()),
            Box::new(Switches::new()),
        ];
        Self {
            n_records: par.steps + 1,
            obs_ptr_vec,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        self.add_records(&mut reader)
    }

    pub fn add_records<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        for i_record in 0..self.n_records {
            let record: Record = decode::from_read(&mut *reader)
                .with_context(|| format!("failed to read record {i_record}"))?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&record);
            }
        }
        Ok(())
    }

    pub fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::Value::Array(reports)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.report())
            .context("failed to serialize results")?;
        Ok(())
    }
}
