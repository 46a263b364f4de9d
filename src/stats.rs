//! Simulation statistics collection and reporting.
//!
//! Per-cycle gauges and counters from the pipeline units, assembled into a
//! serializable snapshot after a run.

use serde::Serialize;

/// A per-cycle sampled quantity (queue depth, issue width, ...).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gauge {
    sum: u64,
    samples: u64,
    max: u64,
}

impl Gauge {
    pub fn record(&mut self, value: u64) {
        self.sum += value;
        self.samples += 1;
        self.max = self.max.max(value);
    }

    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.sum as f64 / self.samples as f64
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Snapshot of the counters a run produced, serializable for the CLI's JSON
/// output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    pub cycles: u64,
    pub flushes: u64,

    pub cu_pushed: Gauge,
    pub cu_pending: Gauge,
    pub cu_pending_read: Gauge,
    pub cu_blocked: Gauge,
    pub cu_forwardings: u64,
    pub cu_cycles: u64,
    pub cu_cant_add: u64,
    pub cu_blocked_branch: u64,
    pub cu_blocked_data_hazard: u64,

    pub bp_lookups: u64,
    pub bp_mispredictions: u64,

    pub icache_hits: u64,
    pub icache_misses: u64,
    pub dcache_hits: u64,
    pub dcache_misses: u64,
}

impl SimStats {
    /// Prints a human-readable summary.
    pub fn print(&self) {
        println!("----------------------------------------");
        println!("PIPELINE STATISTICS");
        println!("----------------------------------------");
        println!("cycles                 {}", self.cycles);
        println!("flushes                {}", self.flushes);
        println!("issue.avg_width        {:.3}", self.cu_pushed.average());
        println!("issue.max_width        {}", self.cu_pushed.max());
        println!("issue.avg_pending      {:.3}", self.cu_pending.average());
        println!("issue.forwardings      {}", self.cu_forwardings);
        println!("issue.blocked_branch   {}", self.cu_blocked_branch);
        println!("issue.blocked_hazard   {}", self.cu_blocked_data_hazard);
        println!("issue.backpressure     {}", self.cu_cant_add);
        let accuracy = if self.bp_lookups > 0 {
            100.0 * (1.0 - self.bp_mispredictions as f64 / self.bp_lookups as f64)
        } else {
            0.0
        };
        println!("bp.lookups             {}", self.bp_lookups);
        println!("bp.mispredicts         {}", self.bp_mispredictions);
        println!("bp.accuracy            {accuracy:.2}%");
        let print_cache = |name: &str, hits: u64, misses: u64| {
            let total = hits + misses;
            let rate = if total > 0 {
                100.0 * hits as f64 / total as f64
            } else {
                0.0
            };
            println!("{name:<6} accesses: {total:<8} hits: {hits:<8} hit_rate: {rate:.2}%");
        };
        print_cache("L1-I", self.icache_hits, self.icache_misses);
        print_cache("L1-D", self.dcache_hits, self.dcache_misses);
        println!("----------------------------------------");
    }
}
