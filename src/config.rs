use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, fs, ops::RangeBounds, path::Path};
use toml::{Table, Value};

/// Model parameters of a single experiment.
///
/// Resolved from the `[base]` table of the configuration file with the
/// experiment's `overrides` merged on top.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    /// Seed of the experiment's random number generator.
    pub seed: u64,
    /// Number of simulation steps.
    pub steps: usize,

    /// Number of workers (the number of firms is `2 * n_workers + 1`).
    pub n_workers: usize,

    /// Inclusive range of initial productivities.
    pub prod_range: [u32; 2],
    /// Inclusive range of firm discount factors.
    pub d_range: [f64; 2],

    /// Fractional productivity gain from education.
    pub premium: f64,
    /// Weight the average discount factor by firm size.
    pub weighted: bool,
    /// Characteristic class subject to the discount.
    pub d_class: usize,

    /// Fraction of workers active at each step.
    pub active: f64,
    /// Number of firms sampled per employer search.
    pub sample: usize,
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        check_num(self.steps, 1..=1_000_000).context("invalid number of steps")?;
        check_num(self.n_workers, 1..=1_000_000).context("invalid number of workers")?;

        let [prod_lo, prod_hi] = self.prod_range;
        // The education cost divides by productivity.
        if prod_lo == 0 {
            bail!("invalid productivity range: lower bound must be positive");
        }
        if prod_lo > prod_hi {
            bail!("invalid productivity range: {prod_lo} is greater than {prod_hi}");
        }
        let [d_lo, d_hi] = self.d_range;
        check_num(d_lo, 0.0..=1.0).context("invalid discount range lower bound")?;
        check_num(d_hi, d_lo..=1.0).context("invalid discount range upper bound")?;

        check_num(self.premium, 0.0..=10.0).context("invalid education premium")?;
        check_num(self.d_class, 0..=1).context("invalid discriminated class")?;

        // Zero is excluded, at least one worker must be active.
        if !(self.active > 0.0 && self.active <= 1.0) {
            bail!("invalid active share: must be in (0, 1], but is {}", self.active);
        }
        check_num(self.sample, 1..=2 * self.n_workers).context("invalid sample size")?;

        Ok(())
    }

    pub fn n_firms(&self) -> usize {
        2 * self.n_workers + 1
    }

    /// Number of workers drawn into the active subset at each step.
    pub fn n_active(&self) -> usize {
        let n_active = (self.n_workers as f64 * self.active).ceil() as usize;
        n_active.min(self.n_workers)
    }

    /// Midpoint of the productivity range.
    pub fn ref_productivity(&self) -> f64 {
        (self.prod_range[0] as f64 + self.prod_range[1] as f64) / 2.0
    }
}

/// Experiment with its fully resolved parameters.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub name: String,
    pub params: Params,
}

/// Simulation configuration.
///
/// Every experiment is resolved and validated when the configuration is loaded,
/// so a bad experiment aborts before any simulation starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub experiments: Vec<Experiment>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    base: Table,
    experiments: Vec<RawExperiment>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExperiment {
    name: String,
    #[serde(default)]
    overrides: Table,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed,
    /// or if any experiment has invalid parameters.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("failed to deserialize config")?;

        if raw.experiments.is_empty() {
            bail!("config must define at least one experiment");
        }

        let mut names = HashSet::new();
        let mut experiments = Vec::with_capacity(raw.experiments.len());
        for raw_exp in raw.experiments {
            let name = raw_exp.name;
            check_name(&name).with_context(|| format!("invalid experiment name {name:?}"))?;
            if !names.insert(name.clone()) {
                bail!("duplicate experiment name {name:?}");
            }

            let params = resolve_params(&raw.base, raw_exp.overrides)
                .with_context(|| format!("invalid parameters of experiment {name:?}"))?;

            experiments.push(Experiment { name, params });
        }

        Ok(Self { experiments })
    }

    pub fn experiment(&self, name: &str) -> Result<&Experiment> {
        self.experiments
            .iter()
            .find(|exp| exp.name == name)
            .with_context(|| format!("no experiment named {name:?}"))
    }
}

fn resolve_params(base: &Table, overrides: Table) -> Result<Params> {
    let mut table = base.clone();
    table.extend(overrides);

    let params: Params = Value::Table(table)
        .try_into()
        .context("failed to deserialize params")?;

    params.validate().context("failed to validate params")?;

    Ok(params)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if let Some(c) = name
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    {
        bail!("name must contain only ASCII alphanumerics, '_' or '-', but contains {c:?}");
    }
    Ok(())
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
