use std::fmt;

use log::info;

/// Depth histogram of empty links in an [`Llrb`] tree, collected while
/// validating it. An empty link at depth `d` means a root-to-leaf path
/// of `d` nodes.
///
/// [`Llrb`]: crate::Llrb
#[derive(Clone)]
pub struct Depth {
    samples: usize,
    min: usize,
    max: usize,
    total: usize,
    depths: [u64; 256],
}

impl Depth {
    pub(crate) fn new() -> Depth {
        Default::default()
    }

    pub(crate) fn sample(&mut self, depth: usize) {
        self.samples += 1;
        self.total += depth;
        self.min = std::cmp::min(self.min, depth);
        self.max = std::cmp::max(self.max, depth);
        self.depths[depth] += 1;
    }

    /// Return number of empty links sampled.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Return the shortest root-to-leaf path.
    pub fn min(&self) -> usize {
        if self.samples == 0 {
            0
        } else {
            self.min
        }
    }

    /// Return the longest root-to-leaf path.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Return the average root-to-leaf path.
    pub fn mean(&self) -> usize {
        match self.samples {
            0 => 0,
            n => self.total / n,
        }
    }

    /// Return depth as tuple of percentiles, each tuple provides
    /// (percentile, depth). Only percentiles from 90 onwards are
    /// reported, one entry for each depth that crosses a new percentile.
    pub fn percentiles(&self) -> Vec<(u8, usize)> {
        let mut percentiles: Vec<(u8, usize)> = vec![];
        if self.samples == 0 {
            return percentiles;
        }
        let (mut acc, mut prev_perc) = (0_u64, 90_u8);
        let iter = self.depths.iter().enumerate().filter(|(_, &n)| n > 0);
        for (depth, n) in iter {
            acc += *n;
            let perc = ((acc as f64 / self.samples as f64) * 100_f64) as u8;
            if perc >= prev_perc {
                percentiles.push((perc, depth));
                prev_perc = perc + 1;
            }
        }
        percentiles
    }

    /// Log depth statistics in human readable format.
    pub fn pretty_print(&self, prefix: &str) {
        info!(
            "{}depth (min, mean, max): {:?}",
            prefix,
            (self.min(), self.mean(), self.max)
        );
        for (perc, depth) in self.percentiles().into_iter() {
            info!("{}  {} percentile = {}", prefix, perc, depth);
        }
    }

    /// Convert depth statistics to JSON format, useful for plotting.
    pub fn json(&self) -> String {
        let ps: Vec<String> = self
            .percentiles()
            .into_iter()
            .map(|(p, d)| format!("\"{}\": {}", p, d))
            .collect();
        format!(
            "{{ \"min\": {}, \"mean\": {}, \"max\": {}, \"percentiles\": {{ {} }} }}",
            self.min(),
            self.mean(),
            self.max,
            ps.join(", ")
        )
    }
}

// min() hides the sentinel kept for an empty histogram.
impl fmt::Debug for Depth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Depth")
            .field("samples", &self.samples)
            .field("min", &self.min())
            .field("mean", &self.mean())
            .field("max", &self.max)
            .field("percentiles", &self.percentiles())
            .finish()
    }
}

impl Default for Depth {
    fn default() -> Self {
        Depth {
            samples: 0,
            min: usize::MAX,
            max: 0,
            total: 0,
            depths: [0; 256],
        }
    }
}
