use crate::analysis::Analyzer;
use crate::config::{Config, Experiment};
use crate::market::Market;
use anyhow::{Context, Result, bail};
use glob::glob;
use rayon::prelude::*;
use std::{
    any::Any,
    fs,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

/// Runs, analyzes and cleans the experiments of a simulation directory.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run every experiment, or only `exp_name`, in parallel.
    ///
    /// A failing experiment does not stop the others.
    pub fn run_experiments(&self, exp_name: Option<&str>) -> Result<()> {
        let exps: Vec<&Experiment> = match exp_name {
            Some(name) => vec![self.cfg.experiment(name)?],
            None => self.cfg.experiments.iter().collect(),
        };

        let data_dir = self.data_dir();
        fs::create_dir_all(&data_dir).with_context(|| format!("failed to create {data_dir:?}"))?;

        let n_failed = exps
            .par_iter()
            .filter(|exp| !run_isolated(&exp.name, || self.run_experiment(exp)))
            .count();

        if n_failed > 0 {
            bail!("{n_failed} of {} experiments failed", exps.len());
        }
        Ok(())
    }

    fn run_experiment(&self, exp: &Experiment) -> Result<()> {
        log::info!("starting experiment {:?} for {} steps", exp.name, exp.params.steps);

        let mut market = Market::new(exp.params.clone()).context("failed to set up market")?;

        let data_file = self.data_file(&exp.name);
        market
            .perform_simulation(&data_file)
            .with_context(|| format!("failed to perform simulation into {data_file:?}"))?;

        log::info!(
            "experiment {:?} complete after {} steps, wrote {data_file:?}",
            exp.name,
            market.t()
        );
        Ok(())
    }

    /// Analyze every experiment that has a data file.
    pub fn analyze_experiments(&self) -> Result<()> {
        for exp in &self.cfg.experiments {
            let data_file = self.data_file(&exp.name);
            if !data_file.is_file() {
                log::warn!("no data for experiment {:?}, skipping", exp.name);
                continue;
            }

            let mut analyzer = Analyzer::new(&exp.params);
            analyzer
                .add_file(&data_file)
                .with_context(|| format!("failed to add {data_file:?}"))?;

            let results_file = self.results_file(&exp.name);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("wrote {results_file:?}");
        }

        Ok(())
    }

    /// Remove all data and results files.
    pub fn clean_experiments(&self) -> Result<()> {
        for pattern in ["*.msgpack", "*-results.json"] {
            let pattern = self.data_dir().join(pattern);
            let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
            for file in glob(pattern).context("failed to glob data files")? {
                let file = file.context("failed to read glob entry")?;
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        Ok(())
    }

    fn data_dir(&self) -> PathBuf {
        self.sim_dir.join("data")
    }

    fn data_file(&self, exp_name: &str) -> PathBuf {
        self.data_dir().join(format!("{exp_name}.msgpack"))
    }

    fn results_file(&self, exp_name: &str) -> PathBuf {
        self.data_dir().join(format!("{exp_name}-results.json"))
    }
}

/// Run one experiment, turning errors and panics into a logged failure.
///
/// Returns whether the experiment succeeded.
fn run_isolated<F>(exp_name: &str, f: F) -> bool
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            log::error!("experiment {exp_name:?} failed: {error:#}");
            false
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::error!("experiment {exp_name:?} panicked: {msg}");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}
