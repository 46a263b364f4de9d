//! Memory management unit: L1 instruction and data caches over slow memory.
//!
//! Both caches are LRU over 64-byte lines by default. The data cache is
//! write-back: stores land in resident lines and reach backing memory only
//! when a line is evicted or when [`MemoryManagementUnit::flush`] drains the
//! cache at the end of a run. The instruction cache is read-only, so its
//! evictions are simply dropped.

use crate::config::SimConfig;
use crate::core::cache::{CacheLine, LruCache};
use crate::isa::Execution;

pub struct MemoryManagementUnit {
    l1i: LruCache,
    l1d: LruCache,
    cycles_memory_access: u64,
    pub icache_hits: u64,
    pub icache_misses: u64,
    pub dcache_hits: u64,
    pub dcache_misses: u64,
}

impl MemoryManagementUnit {
    pub fn new(config: &SimConfig) -> MemoryManagementUnit {
        MemoryManagementUnit {
            l1i: LruCache::new(config.cache.l1i.line_bytes, config.cache.l1i.size_bytes),
            l1d: LruCache::new(config.cache.l1d.line_bytes, config.cache.l1d.size_bytes),
            cycles_memory_access: config.memory.access_cycles,
            icache_hits: 0,
            icache_misses: 0,
            dcache_hits: 0,
            dcache_misses: 0,
        }
    }

    /// Collects the bytes for `addrs` from the instruction cache; `None` if
    /// any address misses.
    pub fn get_from_l1i(&mut self, addrs: &[i32]) -> Option<Vec<i8>> {
        match collect(&mut self.l1i, addrs) {
            Some(bytes) => {
                self.icache_hits += 1;
                Some(bytes)
            }
            None => {
                self.icache_misses += 1;
                None
            }
        }
    }

    /// Collects the bytes for `addrs` from the data cache; `None` if any
    /// address misses.
    pub fn get_from_l1d(&mut self, addrs: &[i32]) -> Option<Vec<i8>> {
        match collect(&mut self.l1d, addrs) {
            Some(bytes) => {
                self.dcache_hits += 1;
                Some(bytes)
            }
            None => {
                self.dcache_misses += 1;
                None
            }
        }
    }

    /// Reads the line-aligned block containing `addr` from backing memory.
    pub fn fetch_cache_line(&self, memory: &[i8], addr: i32) -> Vec<i8> {
        let base = self.l1d_line_base(addr) as usize;
        memory[base..base + self.l1d.line_length()].to_vec()
    }

    /// Inserts a line into the instruction cache. Evicted lines are dropped:
    /// the instruction cache never holds modified data.
    pub fn push_line_to_l1i(&mut self, addr: i32, line: Vec<i8>) {
        let base = line_base(addr, self.l1i.line_length());
        let _evicted = self.l1i.push_line(base, line);
    }

    /// Inserts a line into the data cache, spilling the evicted line (if any)
    /// to backing memory.
    pub fn push_line_to_l1d(&mut self, memory: &mut [i8], addr: i32, line: Vec<i8>) {
        let base = self.l1d_line_base(addr);
        if let Some(evicted) = self.l1d.push_line(base, line) {
            write_back(memory, evicted.boundary[0], &evicted.data);
        }
    }

    /// Whether every byte a store wants to touch is resident in the data
    /// cache.
    pub fn execution_memory_changes_in_l1d(&mut self, execution: &Execution) -> bool {
        execution
            .memory_changes
            .keys()
            .all(|&addr| self.l1d.get(addr).is_some())
    }

    /// Applies a store's byte changes to the data cache in place.
    pub fn write_execution_memory_changes_to_l1d(&mut self, execution: &Execution) {
        for (&addr, &value) in &execution.memory_changes {
            self.l1d.write(addr, &[value]);
        }
    }

    /// Spills every data-cache line to backing memory, charging one memory
    /// access per line. After this, memory reflects every committed store.
    pub fn flush(&mut self, memory: &mut [i8]) -> u64 {
        let mut cycles = 0;
        for line in self.l1d.drain() {
            write_back(memory, line.boundary[0], &line.data);
            cycles += self.cycles_memory_access;
        }
        let _ = self.l1i.drain();
        cycles
    }

    pub fn l1i_line_length(&self) -> usize {
        self.l1i.line_length()
    }

    pub fn l1d_lines(&self) -> &[CacheLine] {
        self.l1d.lines()
    }

    fn l1d_line_base(&self, addr: i32) -> i32 {
        line_base(addr, self.l1d.line_length())
    }
}

fn collect(cache: &mut LruCache, addrs: &[i32]) -> Option<Vec<i8>> {
    let mut bytes = Vec::with_capacity(addrs.len());
    for &addr in addrs {
        bytes.push(cache.get(addr)?);
    }
    Some(bytes)
}

fn line_base(addr: i32, line_length: usize) -> i32 {
    addr.div_euclid(line_length as i32) * line_length as i32
}

fn write_back(memory: &mut [i8], base: i32, data: &[i8]) {
    let base = base as usize;
    memory[base..base + data.len()].copy_from_slice(data);
}
