use crate::config::Params;
use crate::firm::Firm;
use crate::record::{FirmRecord, Record, WorkerRecord};
use crate::worker::Worker;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Labor market simulation.
///
/// Owns the worker and firm populations, the parameters and the random
/// number generator of a single experiment. Employment relations are stored
/// as indices on both sides and are only modified through
/// [`Market::switch_employer`], which keeps rosters and employers consistent.
pub struct Market {
    par: Params,
    workers: Vec<Worker>,
    firms: Vec<Firm>,
    rng: ChaCha12Rng,
    i_wkr_all: Vec<usize>,
    t: usize,
}

impl Market {
    /// Create the populations and the initial assignment of worker `i` to firm `i`.
    pub fn new(par: Params) -> Result<Self> {
        par.validate().context("failed to validate params")?;

        let mut rng = ChaCha12Rng::seed_from_u64(par.seed);

        let class_dist = Uniform::new_inclusive(0, 1)?;
        let prod_dist = Uniform::new_inclusive(par.prod_range[0], par.prod_range[1])?;
        let ref_prod = par.ref_productivity();
        let mut workers = Vec::with_capacity(par.n_workers);
        for _ in 0..par.n_workers {
            let class = class_dist.sample(&mut rng);
            let prod = prod_dist.sample(&mut rng) as f64;
            workers.push(Worker::new(class, prod, ref_prod));
        }

        let d_dist = Uniform::new_inclusive(par.d_range[0], par.d_range[1])?;
        let mut firms = Vec::with_capacity(par.n_firms());
        for _ in 0..par.n_firms() {
            // Discount factors are kept at two decimal places.
            let discount_factor = (d_dist.sample(&mut rng) * 100.0).round() / 100.0;
            firms.push(Firm::new(discount_factor, par.d_class));
        }

        let i_wkr_all = (0..par.n_workers).collect();

        let mut market = Self {
            par,
            workers,
            firms,
            rng,
            i_wkr_all,
            t: 0,
        };

        // Firms past the first `n_workers` start empty.
        for i in 0..market.par.n_workers {
            market.switch_employer(i, i);
            market.workers[i].wage = market.firms[i].calc_wage(&market.workers[i]);
        }

        Ok(market)
    }

    #[cfg(test)]
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    #[cfg(test)]
    pub fn firms(&self) -> &[Firm] {
        &self.firms
    }

    /// Number of steps performed so far.
    pub fn t(&self) -> usize {
        self.t
    }

    /// Run the simulation and write every record to a MessagePack file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        self.run(&mut writer)?;

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Run the remaining steps, writing the current record and one record per step.
    pub fn run<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        encode::write(writer, &self.update()).context("failed to serialize record")?;

        let steps_per_report = (self.par.steps / 10).max(1);
        while self.t < self.par.steps {
            self.step();

            if cfg!(debug_assertions) {
                self.check_consistency()
                    .with_context(|| format!("inconsistent market at step {}", self.t))?;
            }

            encode::write(writer, &self.update()).context("failed to serialize record")?;

            if self.t % steps_per_report == 0 || self.t == self.par.steps {
                let progress = 100.0 * self.t as f64 / self.par.steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        self.end();

        Ok(())
    }

    /// Perform a single step.
    pub fn step(&mut self) {
        self.t += 1;

        for wkr in &mut self.workers {
            wkr.searched = false;
            wkr.switched = false;
        }

        // Select active workers.
        let i_wkr_sel: Vec<usize> = self
            .i_wkr_all
            .choose_multiple(&mut self.rng, self.par.n_active())
            .copied()
            .collect();

        // Education comes first so new productivity is visible to employers.
        let mut n_educ = 0;
        for &i_wkr in &i_wkr_sel {
            let wkr = &mut self.workers[i_wkr];
            if wkr.educated() {
                continue;
            }
            let educated = wkr.education_decision(
                self.par.premium,
                self.par.weighted,
                self.par.d_class,
                &self.firms,
                &mut self.rng,
            );
            if educated {
                n_educ += 1;
            }
        }

        let mut n_switch = 0;
        for &i_wkr in &i_wkr_sel {
            if self.firm_selection(i_wkr) {
                n_switch += 1;
            }
        }

        for wkr in &mut self.workers {
            wkr.refresh_employer_size(&self.firms);
        }

        for firm in &mut self.firms {
            firm.produce(&self.workers);
            firm.calc_profit(&self.workers);
        }

        log::debug!("step {}: {n_educ} educated, {n_switch} switched", self.t);
    }

    /// Record the current state.
    pub fn update(&self) -> Record {
        let workers = self
            .workers
            .iter()
            .enumerate()
            .map(|(id, wkr)| WorkerRecord {
                id,
                class: wkr.class(),
                productivity: wkr.productivity(),
                hours: wkr.hours(),
                employer: wkr.employer(),
                employer_size: wkr.employer_size(),
                wage: wkr.wage,
                educated: wkr.educated(),
                searched: wkr.searched,
                switched: wkr.switched,
            })
            .collect();

        let firms = self
            .firms
            .iter()
            .enumerate()
            .map(|(id, firm)| FirmRecord {
                id,
                discount_factor: firm.discount_factor(),
                size: firm.size,
                size_by_class: firm.size_by_class,
                output: firm.output,
                output_by_class: firm.output_by_class,
                costs: firm.costs,
                revenue: firm.revenue,
                profit: firm.profit,
            })
            .collect();

        Record {
            step: self.t,
            workers,
            firms,
        }
    }

    /// Log a summary of the final state.
    pub fn end(&self) {
        for class in 0..2 {
            let (n, wage_sum, n_educ) = self
                .workers
                .iter()
                .filter(|wkr| wkr.class() == class)
                .fold((0, 0.0, 0), |(n, wage_sum, n_educ), wkr| {
                    (n + 1, wage_sum + wkr.wage, n_educ + wkr.educated() as usize)
                });
            if n == 0 {
                continue;
            }
            let avg_wage = wage_sum / n as f64;
            let educ_share = n_educ as f64 / n as f64;
            log::info!("class {class}: {n} workers, mean wage {avg_wage:.3}, educated {educ_share:.3}");
        }
        let n_active = self.firms.iter().filter(|firm| firm.is_active()).count();
        log::info!("{n_active} of {} firms active", self.firms.len());
    }

    /// Search for a better paid job and switch if one is found.
    fn firm_selection(&mut self, i_wkr: usize) -> bool {
        self.workers[i_wkr].searched = true;

        let offer = self.workers[i_wkr].rank_firms(self.par.sample, &self.firms, &mut self.rng);
        let Some((i_firm, wage)) = offer else {
            return false;
        };
        if wage <= self.workers[i_wkr].wage {
            return false;
        }

        let wkr = &mut self.workers[i_wkr];
        wkr.switched = true;
        wkr.wage = wage;
        self.switch_employer(i_wkr, i_firm);

        true
    }

    /// Move a worker to a new employer, updating both rosters and the worker's employer.
    fn switch_employer(&mut self, i_wkr: usize, i_firm: usize) {
        if let Some(i_old) = self.workers[i_wkr].employer() {
            debug_assert!(
                self.firms[i_old].roster().contains(&i_wkr),
                "worker {i_wkr} missing from roster of its employer {i_old}"
            );
            self.firms[i_old].separate(i_wkr, &self.workers);
        }
        debug_assert!(
            !self.firms[i_firm].roster().contains(&i_wkr),
            "worker {i_wkr} already in roster of firm {i_firm}"
        );
        self.firms[i_firm].hire(i_wkr, &self.workers);
        self.workers[i_wkr].update_employer(Some((i_firm, &self.firms[i_firm])));
    }

    /// Check that every worker is in exactly one roster and that rosters and employers agree.
    pub fn check_consistency(&self) -> Result<()> {
        let mut n_rosters = vec![0; self.workers.len()];

        for (i_firm, firm) in self.firms.iter().enumerate() {
            if firm.size != firm.roster().len() {
                bail!("firm {i_firm} has size {} but {} employees", firm.size, firm.roster().len());
            }
            if firm.size != firm.size_by_class[0] + firm.size_by_class[1] {
                bail!("firm {i_firm} has size {} but sizes by class {:?}", firm.size, firm.size_by_class);
            }
            for &i_wkr in firm.roster() {
                n_rosters[i_wkr] += 1;
                let employer = self.workers[i_wkr].employer();
                if employer != Some(i_firm) {
                    bail!("worker {i_wkr} is in roster of firm {i_firm} but has employer {employer:?}");
                }
            }
        }

        if let Some(i_wkr) = n_rosters.iter().position(|&n| n != 1) {
            bail!("worker {i_wkr} is in {} rosters", n_rosters[i_wkr]);
        }

        Ok(())
    }
}
