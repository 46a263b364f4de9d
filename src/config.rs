use serde::Deserialize;

const DEFAULT_MEMORY_BYTES: usize = 0x100000;
const DEFAULT_MEMORY_ACCESS_CYCLES: u64 = 50;

const DEFAULT_CACHE_BYTES: usize = 1024;
const DEFAULT_CACHE_LINE_BYTES: usize = 64;
const DEFAULT_L1D_ACCESS_CYCLES: u64 = 1;

const DEFAULT_BUS_SIZE: usize = 2;
const DEFAULT_EXECUTE_UNITS: usize = 2;
const DEFAULT_WRITE_BACK_UNITS: usize = 2;
const DEFAULT_BTB_SIZE: usize = 4;
const DEFAULT_FLUSH_CYCLES: u64 = 1;
const DEFAULT_PENDING_CAPACITY: usize = 10;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub cache: CacheHierarchyConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_bytes")]
    pub size_bytes: usize,

    #[serde(default = "default_memory_access_cycles")]
    pub access_cycles: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            size_bytes: DEFAULT_MEMORY_BYTES,
            access_cycles: DEFAULT_MEMORY_ACCESS_CYCLES,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheHierarchyConfig {
    #[serde(default)]
    pub l1i: CacheConfig,

    #[serde(default)]
    pub l1d: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_bytes")]
    pub size_bytes: usize,

    #[serde(default = "default_cache_line_bytes")]
    pub line_bytes: usize,

    #[serde(default = "default_l1d_access_cycles")]
    pub access_cycles: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            size_bytes: DEFAULT_CACHE_BYTES,
            line_bytes: DEFAULT_CACHE_LINE_BYTES,
            access_cycles: DEFAULT_L1D_ACCESS_CYCLES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_bus_size")]
    pub bus_size: usize,

    #[serde(default = "default_execute_units")]
    pub execute_units: usize,

    #[serde(default = "default_write_back_units")]
    pub write_back_units: usize,

    #[serde(default = "default_btb_size")]
    pub btb_size: usize,

    #[serde(default = "default_flush_cycles")]
    pub flush_cycles: u64,

    #[serde(default = "default_pending_capacity")]
    pub pending_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            bus_size: DEFAULT_BUS_SIZE,
            execute_units: DEFAULT_EXECUTE_UNITS,
            write_back_units: DEFAULT_WRITE_BACK_UNITS,
            btb_size: DEFAULT_BTB_SIZE,
            flush_cycles: DEFAULT_FLUSH_CYCLES,
            pending_capacity: DEFAULT_PENDING_CAPACITY,
        }
    }
}

fn default_memory_bytes() -> usize {
    DEFAULT_MEMORY_BYTES
}

fn default_memory_access_cycles() -> u64 {
    DEFAULT_MEMORY_ACCESS_CYCLES
}

fn default_cache_bytes() -> usize {
    DEFAULT_CACHE_BYTES
}

fn default_cache_line_bytes() -> usize {
    DEFAULT_CACHE_LINE_BYTES
}

fn default_l1d_access_cycles() -> u64 {
    DEFAULT_L1D_ACCESS_CYCLES
}

fn default_bus_size() -> usize {
    DEFAULT_BUS_SIZE
}

fn default_execute_units() -> usize {
    DEFAULT_EXECUTE_UNITS
}

fn default_write_back_units() -> usize {
    DEFAULT_WRITE_BACK_UNITS
}

fn default_btb_size() -> usize {
    DEFAULT_BTB_SIZE
}

fn default_flush_cycles() -> u64 {
    DEFAULT_FLUSH_CYCLES
}

fn default_pending_capacity() -> usize {
    DEFAULT_PENDING_CAPACITY
}
