use crate::worker::Worker;

/// Firm of the market.
///
/// The roster holds indices into the market's worker population. Size and
/// production fields are derived from the roster and are recomputed by
/// [`Firm::hire`], [`Firm::separate`], [`Firm::produce`] and [`Firm::calc_profit`].
#[derive(Debug, Clone)]
pub struct Firm {
    discount_factor: f64,
    flagged_class: usize,

    roster: Vec<usize>,

    pub size: usize,
    pub size_by_class: [usize; 2],

    pub price: f64,

    pub output: f64,
    pub output_by_class: [f64; 2],

    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
}

impl Firm {
    pub fn new(discount_factor: f64, flagged_class: usize) -> Self {
        Self {
            discount_factor,
            flagged_class,
            roster: Vec::new(),
            size: 0,
            size_by_class: [0; 2],
            price: 1.0,
            output: 0.0,
            output_by_class: [0.0; 2],
            revenue: 0.0,
            costs: 0.0,
            profit: 0.0,
        }
    }

    pub fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    pub fn roster(&self) -> &[usize] {
        &self.roster
    }

    pub fn is_active(&self) -> bool {
        self.size > 0
    }

    /// Add a worker to the roster. Does nothing if the worker is already there.
    ///
    /// Only the firm side is updated, the worker's employer is set by the market.
    pub fn hire(&mut self, i_wkr: usize, workers: &[Worker]) {
        if !self.roster.contains(&i_wkr) {
            self.roster.push(i_wkr);
        }
        self.set_size(workers);
    }

    /// Remove a worker from the roster. Does nothing if the worker is absent.
    pub fn separate(&mut self, i_wkr: usize, workers: &[Worker]) {
        if let Some(pos) = self.roster.iter().position(|&i| i == i_wkr) {
            self.roster.remove(pos);
        }
        self.set_size(workers);
    }

    fn set_size(&mut self, workers: &[Worker]) {
        self.size_by_class = [0; 2];
        for &i_wkr in &self.roster {
            self.size_by_class[workers[i_wkr].class()] += 1;
        }
        self.size = self.roster.len();
    }

    pub fn produce(&mut self, workers: &[Worker]) {
        self.output_by_class = [0.0; 2];
        for &i_wkr in &self.roster {
            let wkr = &workers[i_wkr];
            self.output_by_class[wkr.class()] += wkr.productivity() * wkr.hours();
        }
        self.output = self.output_by_class.iter().sum();
    }

    /// Must follow [`Firm::produce`] in the same step.
    pub fn calc_profit(&mut self, workers: &[Worker]) {
        self.revenue = self.output * self.price;
        self.costs = self
            .roster
            .iter()
            .map(|&i_wkr| workers[i_wkr].wage * workers[i_wkr].hours())
            .sum();
        self.profit = self.revenue - self.costs;
    }

    /// Hourly wage this firm offers a worker.
    ///
    /// Workers of the flagged class are paid `1 - discount_factor` of their marginal product.
    pub fn calc_wage(&self, wkr: &Worker) -> f64 {
        let wage = self.price * wkr.productivity();
        if wkr.class() == self.flagged_class {
            wage * (1.0 - self.discount_factor)
        } else {
            wage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers() -> Vec<Worker> {
        vec![
            Worker::new(0, 10.0, 10.0),
            Worker::new(1, 12.0, 10.0),
            Worker::new(1, 5.0, 10.0),
        ]
    }

    #[test]
    fn hire_and_separate_are_idempotent() {
        let wkrs = workers();
        let mut firm = Firm::new(0.5, 1);

        firm.hire(0, &wkrs);
        firm.hire(1, &wkrs);
        firm.hire(1, &wkrs);
        assert_eq!(firm.roster(), &[0, 1]);
        assert_eq!(firm.size, 2);
        assert_eq!(firm.size_by_class, [1, 1]);

        firm.separate(2, &wkrs);
        assert_eq!(firm.size, 2);

        firm.separate(0, &wkrs);
        firm.separate(0, &wkrs);
        assert_eq!(firm.roster(), &[1]);
        assert_eq!(firm.size_by_class, [0, 1]);
        assert_eq!(firm.size, firm.size_by_class[0] + firm.size_by_class[1]);
    }

    #[test]
    fn wage_discount_applies_to_flagged_class_only() {
        let wkrs = workers();
        let firm = Firm::new(0.25, 1);

        assert_eq!(firm.calc_wage(&wkrs[0]), 10.0);
        assert_eq!(firm.calc_wage(&wkrs[1]), 12.0 * 0.75);

        let firm = Firm::new(0.25, 0);
        assert_eq!(firm.calc_wage(&wkrs[0]), 10.0 * 0.75);
        assert_eq!(firm.calc_wage(&wkrs[1]), 12.0);
    }

    #[test]
    fn production_and_profit() {
        let mut wkrs = workers();
        let mut firm = Firm::new(0.5, 1);
        for i_wkr in 0..wkrs.len() {
            firm.hire(i_wkr, &wkrs);
            wkrs[i_wkr].wage = firm.calc_wage(&wkrs[i_wkr]);
        }

        firm.produce(&wkrs);
        assert_eq!(firm.output_by_class, [80.0, 136.0]);
        assert_eq!(firm.output, 216.0);

        firm.calc_profit(&wkrs);
        assert_eq!(firm.revenue, 216.0);
        assert_eq!(firm.costs, 80.0 + 48.0 + 20.0);
        assert_eq!(firm.profit, 216.0 - 148.0);
    }

    #[test]
    fn empty_firm_produces_nothing() {
        let wkrs = workers();
        let mut firm = Firm::new(0.3, 1);
        firm.produce(&wkrs);
        firm.calc_profit(&wkrs);
        assert!(!firm.is_active());
        assert_eq!(firm.output, 0.0);
        assert_eq!(firm.profit, 0.0);
    }
}
