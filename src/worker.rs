use crate::firm::Firm;
use rand::prelude::*;

/// Hours worked per period.
pub const HOURS: f64 = 8.0;

/// Worker of the market.
///
/// The employer is an index into the market's firm population. It is only
/// changed through [`Worker::update_employer`], which the market calls together
/// with the matching roster update.
#[derive(Debug, Clone)]
pub struct Worker {
    class: usize,
    productivity: f64,
    ref_productivity: f64,
    educated: bool,

    pub wage: f64,

    employer: Option<usize>,
    employer_size: Option<usize>,

    pub searched: bool,
    pub switched: bool,
}

impl Worker {
    pub fn new(class: usize, productivity: f64, ref_productivity: f64) -> Self {
        Self {
            class,
            productivity,
            ref_productivity,
            educated: false,
            wage: 0.0,
            employer: None,
            employer_size: None,
            searched: false,
            switched: false,
        }
    }

    pub fn class(&self) -> usize {
        self.class
    }

    pub fn productivity(&self) -> f64 {
        self.productivity
    }

    pub fn hours(&self) -> f64 {
        HOURS
    }

    pub fn educated(&self) -> bool {
        self.educated
    }

    pub fn employer(&self) -> Option<usize> {
        self.employer
    }

    /// Employer size as of the last update, stale until the end of each step.
    pub fn employer_size(&self) -> Option<usize> {
        self.employer_size
    }

    /// Set or clear the employer and its cached size together.
    pub fn update_employer(&mut self, employer: Option<(usize, &Firm)>) {
        match employer {
            Some((i_firm, firm)) => {
                self.employer = Some(i_firm);
                self.employer_size = Some(firm.size);
            }
            None => {
                self.employer = None;
                self.employer_size = None;
            }
        }
    }

    pub fn refresh_employer_size(&mut self, firms: &[Firm]) {
        self.employer_size = self.employer.map(|i_firm| firms[i_firm].size);
    }

    /// Educate the worker, raising productivity by `premium` and repricing the current wage.
    pub fn get_education(&mut self, premium: f64, firms: &[Firm]) {
        self.educated = true;
        self.productivity *= 1.0 + premium;
        if let Some(i_firm) = self.employer {
            self.wage = firms[i_firm].calc_wage(self);
        }
    }

    /// Decide whether to get an education and do so if it pays off.
    ///
    /// The cost is scaled so that, without discrimination, the decision
    /// threshold sits exactly at the reference productivity. Workers of the
    /// discriminated class see their benefit reduced by the average discount
    /// factor of the active firms. Returns whether the worker got educated.
    pub fn education_decision<R: Rng + ?Sized>(
        &mut self,
        premium: f64,
        weighted: bool,
        d_class: usize,
        firms: &[Firm],
        rng: &mut R,
    ) -> bool {
        if self.educated {
            return false;
        }

        let cost = self.ref_productivity.powi(2) * premium / self.productivity;
        let mut benefit = self.productivity * premium;
        if self.class == d_class {
            // No active firms means nobody to discriminate.
            let avg_discount = calc_avg_discount(firms, weighted).unwrap_or(0.0);
            benefit *= 1.0 - avg_discount;
        }

        let educate = if benefit > cost {
            true
        } else if benefit == cost {
            rng.random_bool(0.5)
        } else {
            false
        };

        if educate {
            self.get_education(premium, firms);
        }
        educate
    }

    /// Sample `n` distinct firms other than the current employer.
    pub fn select_firms<R: Rng + ?Sized>(
        &self,
        n: usize,
        firms: &[Firm],
        rng: &mut R,
    ) -> Vec<usize> {
        let i_firm_vec: Vec<usize> = (0..firms.len())
            .filter(|&i_firm| Some(i_firm) != self.employer)
            .collect();
        i_firm_vec.choose_multiple(rng, n).copied().collect()
    }

    /// Best wage offer among `n` sampled firms.
    ///
    /// Ties keep the firm sampled first. Returns `None` if no firm was sampled.
    pub fn rank_firms<R: Rng + ?Sized>(
        &self,
        n: usize,
        firms: &[Firm],
        rng: &mut R,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for i_firm in self.select_firms(n, firms, rng) {
            let wage = firms[i_firm].calc_wage(self);
            if best.is_none_or(|(_, best_wage)| wage > best_wage) {
                best = Some((i_firm, wage));
            }
        }
        best
    }
}

/// Average discount factor of the firms with at least one employee.
///
/// If `weighted`, each firm is weighted by its size. Returns `None` if no firm is active.
pub fn calc_avg_discount(firms: &[Firm], weighted: bool) -> Option<f64> {
    let active = firms.iter().filter(|firm| firm.is_active());

    let (sum, norm) = if weighted {
        active.fold((0.0, 0.0), |(sum, norm), firm| {
            let size = firm.size as f64;
            (sum + firm.discount_factor() * size, norm + size)
        })
    } else {
        active.fold((0.0, 0.0), |(sum, norm), firm| {
            (sum + firm.discount_factor(), norm + 1.0)
        })
    };

    if norm == 0.0 { None } else { Some(sum / norm) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    fn rng() -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(7)
    }

    /// Three firms with discount factors 0.2, 0.4 and 0.9, the last one empty.
    /// The first holds workers 0 and 1, the second worker 2.
    fn population() -> (Vec<Worker>, Vec<Firm>) {
        let mut wkrs = vec![
            Worker::new(0, 12.0, 10.0),
            Worker::new(1, 12.0, 10.0),
            Worker::new(1, 8.0, 10.0),
        ];
        let mut firms = vec![Firm::new(0.2, 1), Firm::new(0.4, 1), Firm::new(0.9, 1)];
        for (i_wkr, i_firm) in [(0, 0), (1, 0), (2, 1)] {
            firms[i_firm].hire(i_wkr, &wkrs);
            wkrs[i_wkr].update_employer(Some((i_firm, &firms[i_firm])));
            wkrs[i_wkr].wage = firms[i_firm].calc_wage(&wkrs[i_wkr]);
        }
        (wkrs, firms)
    }

    #[test]
    fn average_discount_ignores_empty_firms() {
        let (_, firms) = population();

        let unweighted = calc_avg_discount(&firms, false).unwrap();
        assert!((unweighted - 0.3).abs() < 1e-12);

        let weighted = calc_avg_discount(&firms, true).unwrap();
        assert!((weighted - (0.2 * 2.0 + 0.4) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn average_discount_without_active_firms() {
        let firms = vec![Firm::new(0.5, 1), Firm::new(0.7, 1)];
        assert_eq!(calc_avg_discount(&firms, false), None);
        assert_eq!(calc_avg_discount(&firms, true), None);

        // Treated as no discrimination.
        let mut wkr = Worker::new(1, 12.0, 10.0);
        assert!(wkr.education_decision(0.2, true, 1, &firms, &mut rng()));
        assert!(wkr.educated());
    }

    #[test]
    fn education_threshold_is_reference_productivity() {
        let (mut wkrs, firms) = population();
        let mut rng = rng();

        // Above reference, not discriminated.
        assert!(wkrs[0].education_decision(0.2, false, 1, &firms, &mut rng));
        assert!(wkrs[0].educated());
        assert!((wkrs[0].productivity() - 14.4).abs() < 1e-12);
        assert!((wkrs[0].wage - 14.4).abs() < 1e-12);

        // Below reference.
        assert!(!wkrs[2].education_decision(0.2, false, 1, &firms, &mut rng));
        assert!(!wkrs[2].educated());
        assert_eq!(wkrs[2].productivity(), 8.0);
    }

    #[test]
    fn discrimination_raises_the_bar() {
        let (mut wkrs, firms) = population();
        let mut rng = rng();

        // cost = 100 * 0.2 / 12 = 1.67, benefit = 2.4 * (1 - 0.3) = 1.68.
        assert!(wkrs[1].clone().education_decision(0.2, false, 1, &firms, &mut rng));
        // Weighted average is 0.27, so the benefit is even larger.
        assert!(wkrs[1].clone().education_decision(0.2, true, 1, &firms, &mut rng));

        let mut firms = firms;
        firms[0] = Firm::new(0.5, 1);
        firms[0].hire(0, &wkrs);
        firms[0].hire(1, &wkrs);
        // benefit = 2.4 * (1 - 0.45) = 1.32 < cost.
        assert!(!wkrs[1].education_decision(0.2, false, 1, &firms, &mut rng));
        assert!(!wkrs[1].educated());
        assert_eq!(wkrs[1].productivity(), 12.0);
    }

    #[test]
    fn education_is_decided_once() {
        let (mut wkrs, firms) = population();
        let mut rng = rng();

        assert!(wkrs[0].education_decision(0.2, false, 1, &firms, &mut rng));
        let prod = wkrs[0].productivity();
        assert!(!wkrs[0].education_decision(0.2, false, 1, &firms, &mut rng));
        assert_eq!(wkrs[0].productivity(), prod);
        assert!(wkrs[0].educated());
    }

    #[test]
    fn zero_premium_leaves_productivity_unchanged() {
        let mut rng = rng();
        for _ in 0..16 {
            let mut wkr = Worker::new(0, 10.0, 10.0);
            wkr.education_decision(0.0, false, 1, &[], &mut rng);
            assert_eq!(wkr.productivity(), 10.0);
        }
    }

    #[test]
    fn indifference_is_a_coin_flip() {
        // cost = 100 * 0.5 / 10 = 5 = benefit.
        let mut rng = rng();
        let mut n_educ = 0;
        let n_trials = 200;
        for _ in 0..n_trials {
            let mut wkr = Worker::new(0, 10.0, 10.0);
            if wkr.education_decision(0.5, false, 1, &[], &mut rng) {
                n_educ += 1;
                assert!(wkr.educated());
                assert_eq!(wkr.productivity(), 15.0);
            } else {
                assert!(!wkr.educated());
                assert_eq!(wkr.productivity(), 10.0);
            }
        }
        assert!(n_educ > 0);
        assert!(n_educ < n_trials);
    }

    #[test]
    fn equal_offers_keep_the_first_sampled_firm() {
        let wkrs = vec![Worker::new(1, 10.0, 10.0)];
        let mut firms = vec![Firm::new(0.3, 1); 6];
        firms[0].hire(0, &wkrs);
        let mut wkr = wkrs[0].clone();
        wkr.update_employer(Some((0, &firms[0])));

        let mut rng = rng();
        for _ in 0..64 {
            let i_firm_vec = wkr.select_firms(4, &firms, &mut rng.clone());
            let (i_firm, wage) = wkr.rank_firms(4, &firms, &mut rng).unwrap();
            assert_eq!(i_firm, i_firm_vec[0]);
            assert!((wage - 7.0).abs() < 1e-12);
        }
    }

    #[test]
    fn firm_selection_excludes_employer() {
        let (wkrs, firms) = population();
        let mut rng = rng();

        for _ in 0..32 {
            let i_firm_vec = wkrs[0].select_firms(2, &firms, &mut rng);
            assert_eq!(i_firm_vec.len(), 2);
            assert!(!i_firm_vec.contains(&0));
            assert_ne!(i_firm_vec[0], i_firm_vec[1]);
        }
    }

    #[test]
    fn best_offer_is_the_highest_wage() {
        let (wkrs, firms) = population();
        let mut rng = rng();

        // Worker 2 (class 1, productivity 8) at firm 1 sees firms 0 and 2.
        let (i_firm, wage) = wkrs[2].rank_firms(2, &firms, &mut rng).unwrap();
        assert_eq!(i_firm, 0);
        assert!((wage - 8.0 * 0.8).abs() < 1e-12);

        assert_eq!(wkrs[2].rank_firms(0, &firms, &mut rng), None);
    }

    #[test]
    fn employer_is_set_and_cleared_together() {
        let (mut wkrs, firms) = population();
        assert_eq!(wkrs[0].employer(), Some(0));
        assert_eq!(wkrs[0].employer_size(), Some(1));

        wkrs[0].refresh_employer_size(&firms);
        assert_eq!(wkrs[0].employer_size(), Some(2));

        wkrs[0].update_employer(None);
        assert_eq!(wkrs[0].employer(), None);
        assert_eq!(wkrs[0].employer_size(), None);
    }
}
