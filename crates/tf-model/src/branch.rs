//! In-progress track candidates grown by DFS over linked triplets (§3, §9).

use crate::hit::HitId;

/// An in-progress track candidate.
///
/// Mirrors the reference implementation's `Branch` class field-for-field:
/// ordered hit indices, the starting station, cumulative chi-square, a
/// self-referential pool id, and an alive flag toggled by the competition
/// loop. Ids are plain indices into the candidate pool, never pointers (§9).
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    station: u16,
    chi2: f64,
    id: u32,
    is_alive: bool,
    hits: Vec<HitId>,
}

impl Branch {
    /// Builds an empty branch, pre-reserving space for `max_hits` hits so
    /// DFS growth along a station chain does not reallocate. The reference
    /// implementation hardcodes a capacity of 25 (CBM's station count); here
    /// it is threaded through from the active setup instead, since this
    /// crate's station count is configurable (see DESIGN.md).
    pub fn new(id: u32, max_hits: usize) -> Self {
        Self { station: 0, chi2: 0.0, id, is_alive: false, hits: Vec::with_capacity(max_hits) }
    }

    pub fn set_station(&mut self, station: u16) {
        self.station = station;
    }

    pub fn set_chi2(&mut self, chi2: f64) {
        self.chi2 = chi2;
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.is_alive = alive;
    }

    pub fn add_hit(&mut self, hit: HitId) {
        self.hits.push(hit);
    }

    pub fn reset_hits(&mut self) {
        self.hits.clear();
    }

    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }

    pub fn station(&self) -> u16 {
        self.station
    }

    pub fn chi2(&self) -> f64 {
        self.chi2
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn hits(&self) -> &[HitId] {
        &self.hits
    }

    pub fn hits_mut(&mut self) -> &mut Vec<HitId> {
        &mut self.hits
    }

    /// Strict weak order used by the candidate competition: more hits wins;
    /// tied hit counts prefer the branch starting on the earlier station;
    /// tied on both, the lower (or equal) chi-square wins.
    pub fn is_better_than(&self, other: &Branch) -> bool {
        if self.n_hits() != other.n_hits() {
            return self.n_hits() > other.n_hits();
        }
        if self.station() != other.station() {
            return self.station() < other.station();
        }
        self.chi2() <= other.chi2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(id: u32, hits: usize, station: u16, chi2: f64) -> Branch {
        let mut b = Branch::new(id, 32);
        for h in 0..hits {
            b.add_hit(h as HitId);
        }
        b.set_station(station);
        b.set_chi2(chi2);
        b
    }

    #[test]
    fn more_hits_wins() {
        let a = branch(0, 5, 2, 10.0);
        let b = branch(1, 3, 0, 0.1);
        assert!(a.is_better_than(&b));
        assert!(!b.is_better_than(&a));
    }

    #[test]
    fn tie_on_hits_prefers_earlier_station() {
        let a = branch(0, 4, 1, 10.0);
        let b = branch(1, 4, 3, 0.1);
        assert!(a.is_better_than(&b));
    }

    #[test]
    fn tie_on_hits_and_station_prefers_lower_chi2() {
        let a = branch(0, 4, 1, 1.0);
        let b = branch(1, 4, 1, 2.0);
        assert!(a.is_better_than(&b));
        // equal chi2 ties in favor of self (<=)
        let c = branch(2, 4, 1, 1.0);
        assert!(a.is_better_than(&c));
    }

    #[test]
    fn order_is_a_strict_weak_order_on_a_small_sample() {
        // Transitivity check across a handful of branches with varied keys.
        let branches = vec![
            branch(0, 5, 0, 1.0),
            branch(1, 5, 0, 2.0),
            branch(2, 4, 0, 0.5),
            branch(3, 5, 1, 0.5),
        ];
        for a in &branches {
            for b in &branches {
                for c in &branches {
                    if a.is_better_than(b) && b.is_better_than(c) {
                        assert!(
                            a.is_better_than(c),
                            "transitivity violated for ids {} {} {}",
                            a.id(),
                            b.id(),
                            c.id()
                        );
                    }
                }
            }
        }
    }
}
