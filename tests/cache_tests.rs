//! Integration tests for the LRU cache and the memory management unit.

use riscv_pipesim::config::SimConfig;
use riscv_pipesim::core::cache::LruCache;
use riscv_pipesim::core::mmu::MemoryManagementUnit;
use riscv_pipesim::isa::Execution;

use std::collections::BTreeMap;

fn small_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.cache.l1i.size_bytes = 64;
    config.cache.l1i.line_bytes = 16;
    config.cache.l1d.size_bytes = 64;
    config.cache.l1d.line_bytes = 16;
    config
}

/// Tests that a miss has no side effect and a hit returns the stored byte.
#[test]
fn test_cache_get_hit_and_miss() {
    let mut cache = LruCache::new(4, 16);
    assert_eq!(cache.get(0), None);

    cache.push_line(0, vec![1, 2, 3, 4]);
    assert_eq!(cache.get(0), Some(1));
    assert_eq!(cache.get(3), Some(4));
    assert_eq!(cache.get(4), None);
}

/// Tests that a successful get moves the accessed line to the front.
#[test]
fn test_cache_lru_promotion() {
    let mut cache = LruCache::new(4, 16);
    cache.push_line(0, vec![0; 4]);
    cache.push_line(4, vec![0; 4]);
    cache.push_line(8, vec![0; 4]);

    assert_eq!(cache.lines()[0].boundary, [8, 12]);
    let _ = cache.get(2);
    assert_eq!(cache.lines()[0].boundary, [0, 4]);
}

/// Tests that the cache never holds more lines than its capacity and that the
/// evicted line is the least recently used one.
#[test]
fn test_cache_eviction_returns_lru() {
    let mut cache = LruCache::new(4, 16);
    for base in [0, 4, 8, 12] {
        assert!(cache.push_line(base, vec![base as i8; 4]).is_none());
    }
    assert_eq!(cache.lines().len(), 4);

    // Touch line 0 so line 4 becomes the LRU.
    let _ = cache.get(0);
    let evicted = cache.push_line(16, vec![9; 4]).expect("over capacity");
    assert_eq!(evicted.boundary, [4, 8]);
    assert_eq!(evicted.data, vec![4; 4]);
    assert_eq!(cache.lines().len(), 4);
}

/// Tests in-place writes to resident bytes.
#[test]
fn test_cache_write_in_place() {
    let mut cache = LruCache::new(4, 16);
    cache.push_line(8, vec![0; 4]);
    cache.write(9, &[7, 8]);
    assert_eq!(cache.get(9), Some(7));
    assert_eq!(cache.get(10), Some(8));
}

/// Tests that writing bytes that are not resident is a simulator bug.
#[test]
#[should_panic(expected = "cache line")]
fn test_cache_write_missing_line_panics() {
    let mut cache = LruCache::new(4, 16);
    cache.write(0, &[1]);
}

/// Tests that a cache size that is not a multiple of the line size is
/// rejected.
#[test]
#[should_panic(expected = "multiple")]
fn test_cache_bad_geometry_panics() {
    let _ = LruCache::new(3, 16);
}

/// Tests line-aligned refills through the MMU.
#[test]
fn test_mmu_fetch_line_is_aligned() {
    let config = small_config();
    let mmu = MemoryManagementUnit::new(&config);
    let mut memory = vec![0i8; 256];
    for (i, byte) in memory.iter_mut().enumerate() {
        *byte = i as i8;
    }
    let line = mmu.fetch_cache_line(&memory, 21);
    assert_eq!(line.len(), 16);
    assert_eq!(line[0], 16);
    assert_eq!(line[15], 31);
}

/// Tests that a data-cache eviction writes the old line back to memory.
#[test]
fn test_mmu_eviction_writes_back() {
    let config = small_config();
    let mut mmu = MemoryManagementUnit::new(&config);
    let mut memory = vec![0i8; 256];

    mmu.push_line_to_l1d(&mut memory, 0, vec![5; 16]);
    for base in [16, 32, 48, 64] {
        mmu.push_line_to_l1d(&mut memory, base, vec![1; 16]);
    }
    // Line [0, 16) was the LRU when line 64 arrived.
    assert_eq!(&memory[0..16], &[5; 16]);
}

/// Tests that collecting bytes succeeds only when every address hits.
#[test]
fn test_mmu_collect_requires_full_hit() {
    let config = small_config();
    let mut mmu = MemoryManagementUnit::new(&config);
    let mut memory = vec![0i8; 256];

    mmu.push_line_to_l1d(&mut memory, 0, (0..16).map(|i| i as i8).collect());
    assert_eq!(mmu.get_from_l1d(&[14, 15]), Some(vec![14, 15]));
    assert_eq!(mmu.get_from_l1d(&[15, 16]), None);
    assert_eq!(mmu.dcache_hits, 1);
    assert_eq!(mmu.dcache_misses, 1);
}

/// Tests that store bytes can be checked for residency and applied in place.
#[test]
fn test_mmu_store_through_cache() {
    let config = small_config();
    let mut mmu = MemoryManagementUnit::new(&config);
    let mut memory = vec![0i8; 256];

    mmu.push_line_to_l1d(&mut memory, 0, vec![0; 16]);
    let execution = Execution::memory_write(BTreeMap::from([(3, 7i8), (4, 8i8)]));
    assert!(mmu.execution_memory_changes_in_l1d(&execution));
    mmu.write_execution_memory_changes_to_l1d(&execution);
    assert_eq!(mmu.get_from_l1d(&[3, 4]), Some(vec![7, 8]));

    let outside = Execution::memory_write(BTreeMap::from([(40, 1i8)]));
    assert!(!mmu.execution_memory_changes_in_l1d(&outside));
}

/// Tests that the final flush drains every line and charges one memory access
/// per line.
#[test]
fn test_mmu_flush_spills_and_charges() {
    let config = small_config();
    let mut mmu = MemoryManagementUnit::new(&config);
    let mut memory = vec![0i8; 256];

    mmu.push_line_to_l1d(&mut memory, 0, vec![3; 16]);
    mmu.push_line_to_l1d(&mut memory, 32, vec![4; 16]);
    let cycles = mmu.flush(&mut memory);

    assert_eq!(cycles, 2 * config.memory.access_cycles);
    assert_eq!(&memory[0..16], &[3; 16]);
    assert_eq!(&memory[32..48], &[4; 16]);
    assert!(mmu.l1d_lines().is_empty());
}
