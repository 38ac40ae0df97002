//! Per-operator timing of the sample pipeline.

use crate::common::*;

/// Elapsed times of consecutive steps of one sample.
#[derive(Debug)]
pub struct Timing<'a> {
    instant: Instant,
    elapsed: Vec<(&'a str, Duration)>,
}

impl<'a> Timing<'a> {
    pub fn new() -> Self {
        Self {
            instant: Instant::now(),
            elapsed: vec![],
        }
    }

    /// Record the time since the last record under `name`.
    pub fn set_record(&mut self, name: &'a str) {
        self.elapsed.push((name, self.instant.elapsed()));
        self.instant = Instant::now();
    }

    pub fn records(&self) -> &[(&'a str, Duration)] {
        &self.elapsed
    }
}

impl<'a> Default for Timing<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulated time per operator name, shared by the workers of all flows.
#[derive(Debug, Default)]
pub struct Profile {
    totals: DashMap<String, Duration>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, timing: &Timing<'_>) {
        timing.records().iter().for_each(|&(name, elapsed)| {
            match self.totals.get_mut(name) {
                Some(mut total) => *total += elapsed,
                None => {
                    *self.totals.entry(name.to_owned()).or_default() += elapsed;
                }
            }
        });
    }

    pub fn total(&self, name: &str) -> Option<Duration> {
        self.totals.get(name).map(|total| *total)
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn clear(&self) {
        self.totals.clear();
    }

    /// Share of the total time per operator, largest first.
    pub fn summary(&self) -> Vec<(String, f64)> {
        let totals: Vec<(String, Duration)> = self
            .totals
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let sum: f64 = totals.iter().map(|(_, elapsed)| elapsed.as_secs_f64()).sum();

        totals
            .into_iter()
            .map(|(name, elapsed)| {
                let percent = if sum > 0.0 {
                    elapsed.as_secs_f64() * 100.0 / sum
                } else {
                    0.0
                };
                (name, percent)
            })
            .sorted_by(|(lname, lhs), (rname, rhs)| {
                rhs.total_cmp(lhs).then_with(|| lname.cmp(rname))
            })
            .collect()
    }

    /// The summary as printable lines.
    pub fn summary_lines(&self) -> Vec<String> {
        self.summary()
            .into_iter()
            .map(|(name, percent)| format!("{:32}: {:6.2}%", name, percent))
            .collect()
    }
}
