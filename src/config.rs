//! Run configuration
//!
//! [`TilerConfig`] drives the core (tile size, pyramid depth, concurrency,
//! naming) and [`GdalSettings`] drives the GDAL subprocess backend. Both are
//! immutable once built. Values come from defaults, an optional TOML file
//! (`[tiler]` and `[gdal]` tables) and command-line overrides, in that order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{TilerError, TilerResult};

/// What to do with sibling work once a tile or block has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep processing every other tile and block; report failures at the end
    Continue,
    /// Stop scheduling new stages after the first failure
    Abort,
}

impl FailurePolicy {
    /// Parse a policy name (`continue` or `abort`)
    pub fn from_name(name: &str) -> TilerResult<Self> {
        match name.to_lowercase().as_str() {
            "continue" | "skip" => Ok(FailurePolicy::Continue),
            "abort" | "fail-fast" => Ok(FailurePolicy::Abort),
            _ => Err(TilerError::InvalidConfig(format!("Unknown failure policy: {}", name))),
        }
    }
}

/// Configuration of a pyramid build
#[derive(Debug, Clone)]
pub struct TilerConfig {
    levels: u32,
    tile_size: u32,
    workers: usize,
    digits: usize,
    delete_original: bool,
    failure_policy: FailurePolicy,
    skip_existing: bool,
    rescale_percent: f64,
    overview_factors: Vec<u32>,
    block_size: u32,
}

impl Default for TilerConfig {
    fn default() -> Self {
        TilerConfig {
            levels: 3,
            tile_size: 16384,
            workers: 5,
            digits: 4,
            delete_original: false,
            failure_policy: FailurePolicy::Continue,
            skip_existing: true,
            rescale_percent: 12.5,
            overview_factors: vec![2, 4],
            block_size: 512,
        }
    }
}

impl TilerConfig {
    /// Start from the defaults
    pub fn builder() -> TilerConfigBuilder {
        TilerConfigBuilder::new()
    }

    /// Number of pyramid levels above level 0
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Side length of a level-0 tile in pixels
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Maximum number of tiles or blocks processed concurrently
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Zero-pad width of row and column numbers in tile names
    pub fn digits(&self) -> usize {
        self.digits
    }

    /// Delete the unmasked crop instead of renaming it aside
    pub fn delete_original(&self) -> bool {
        self.delete_original
    }

    /// Handling of tile and block failures
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Skip tiles whose outputs already exist and probe valid
    pub fn skip_existing(&self) -> bool {
        self.skip_existing
    }

    /// Linear output size of a pyramid mosaic, in percent
    pub fn rescale_percent(&self) -> f64 {
        self.rescale_percent
    }

    /// Internal overview reduction factors
    pub fn overview_factors(&self) -> &[u32] {
        &self.overview_factors
    }

    /// Internal block size of intermediate rasters
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

/// Builder for [`TilerConfig`]
#[derive(Debug, Clone, Default)]
pub struct TilerConfigBuilder {
    config: TilerConfig,
}

impl TilerConfigBuilder {
    /// Create a builder holding the defaults
    pub fn new() -> Self {
        TilerConfigBuilder { config: TilerConfig::default() }
    }

    pub fn levels(mut self, levels: u32) -> Self {
        self.config.levels = levels;
        self
    }

    pub fn tile_size(mut self, tile_size: u32) -> Self {
        self.config.tile_size = tile_size;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn digits(mut self, digits: usize) -> Self {
        self.config.digits = digits;
        self
    }

    pub fn delete_original(mut self, delete_original: bool) -> Self {
        self.config.delete_original = delete_original;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn skip_existing(mut self, skip_existing: bool) -> Self {
        self.config.skip_existing = skip_existing;
        self
    }

    pub fn rescale_percent(mut self, percent: f64) -> Self {
        self.config.rescale_percent = percent;
        self
    }

    pub fn overview_factors(mut self, factors: Vec<u32>) -> Self {
        self.config.overview_factors = factors;
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Apply the `[tiler]` table of a configuration file
    ///
    /// Keys that are absent keep their current value; keys with the wrong
    /// type are rejected.
    pub fn apply_file(mut self, file: &ConfigFile) -> TilerResult<Self> {
        let table = match file.table("tiler") {
            Some(table) => table,
            None => return Ok(self),
        };

        if let Some(v) = read_integer(table, "tiler", "levels")? {
            self.config.levels = to_u32(v, "tiler.levels")?;
        }
        if let Some(v) = read_integer(table, "tiler", "tile_size")? {
            self.config.tile_size = to_u32(v, "tiler.tile_size")?;
        }
        if let Some(v) = read_integer(table, "tiler", "workers")? {
            self.config.workers = to_u32(v, "tiler.workers")? as usize;
        }
        if let Some(v) = read_integer(table, "tiler", "digits")? {
            self.config.digits = to_u32(v, "tiler.digits")? as usize;
        }
        if let Some(v) = read_bool(table, "tiler", "delete_original")? {
            self.config.delete_original = v;
        }
        if let Some(v) = read_bool(table, "tiler", "skip_existing")? {
            self.config.skip_existing = v;
        }
        if let Some(v) = read_string(table, "tiler", "failure_policy")? {
            self.config.failure_policy = FailurePolicy::from_name(&v)?;
        }
        if let Some(value) = table.get("rescale_percent") {
            self.config.rescale_percent = value
                .as_float()
                .or_else(|| value.as_integer().map(|i| i as f64))
                .ok_or_else(|| type_error("tiler", "rescale_percent", "a number"))?;
        }
        if let Some(value) = table.get("overview_factors") {
            let items = value
                .as_array()
                .ok_or_else(|| type_error("tiler", "overview_factors", "an array of integers"))?;
            let mut factors = Vec::with_capacity(items.len());
            for item in items {
                let factor = item
                    .as_integer()
                    .ok_or_else(|| type_error("tiler", "overview_factors", "an array of integers"))?;
                factors.push(to_u32(factor, "tiler.overview_factors")?);
            }
            self.config.overview_factors = factors;
        }
        if let Some(v) = read_integer(table, "tiler", "block_size")? {
            self.config.block_size = to_u32(v, "tiler.block_size")?;
        }

        Ok(self)
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> TilerResult<TilerConfig> {
        let config = self.config;

        if config.tile_size == 0 {
            return Err(TilerError::InvalidConfig("tile size must be positive".to_string()));
        }
        if config.workers == 0 {
            return Err(TilerError::InvalidConfig("at least one worker is required".to_string()));
        }
        if config.digits == 0 || config.digits > 9 {
            return Err(TilerError::InvalidConfig(format!(
                "digit width must be between 1 and 9, got {}",
                config.digits
            )));
        }
        if !(config.rescale_percent > 0.0 && config.rescale_percent <= 100.0) {
            return Err(TilerError::InvalidConfig(format!(
                "rescale percent must be in (0, 100], got {}",
                config.rescale_percent
            )));
        }
        if config.overview_factors.iter().any(|&factor| factor < 2) {
            return Err(TilerError::InvalidConfig("overview factors must be at least 2".to_string()));
        }
        if config.block_size == 0 || config.block_size % 16 != 0 {
            return Err(TilerError::InvalidConfig(format!(
                "block size must be a positive multiple of 16, got {}",
                config.block_size
            )));
        }

        Ok(config)
    }
}

/// Settings of the GDAL subprocess backend
#[derive(Debug, Clone)]
pub struct GdalSettings {
    /// Folder holding the GDAL executables, `None` to search `PATH`
    pub bin_dir: Option<PathBuf>,
    /// Value passed as `--config GDAL_CACHEMAX`, in megabytes
    pub cache_max_mb: u32,
    /// Footprint extraction executable
    pub footprint_tool: String,
    /// Internal block size of cropped tiles and masks, taken from [`TilerConfig::block_size`]
    pub block_size: u32,
}

impl Default for GdalSettings {
    fn default() -> Self {
        GdalSettings {
            bin_dir: None,
            cache_max_mb: 512,
            footprint_tool: "extractfootprint.sh".to_string(),
            block_size: 512,
        }
    }
}

impl GdalSettings {
    /// Defaults overridden by the `[gdal]` table of a configuration file
    pub fn from_file(file: &ConfigFile) -> TilerResult<Self> {
        let mut settings = GdalSettings::default();
        let table = match file.table("gdal") {
            Some(table) => table,
            None => return Ok(settings),
        };

        if let Some(dir) = read_string(table, "gdal", "bin_dir")? {
            settings.bin_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = read_integer(table, "gdal", "cache_max_mb")? {
            settings.cache_max_mb = to_u32(v, "gdal.cache_max_mb")?;
        }
        if let Some(tool) = read_string(table, "gdal", "footprint_tool")? {
            settings.footprint_tool = tool;
        }
        Ok(settings)
    }

    /// Resolve an executable name against `bin_dir`
    pub fn tool_path(&self, tool: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }
}

/// A parsed TOML configuration file
#[derive(Debug, Clone)]
pub struct ConfigFile {
    value: toml::Value,
}

impl ConfigFile {
    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> TilerResult<Self> {
        let value: toml::Value = content
            .parse()
            .map_err(|e| TilerError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?;
        Ok(ConfigFile { value })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> TilerResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// An empty configuration (all defaults)
    pub fn empty() -> Self {
        ConfigFile { value: toml::Value::Table(toml::map::Map::new()) }
    }

    fn table(&self, name: &str) -> Option<&toml::map::Map<String, toml::Value>> {
        self.value.get(name).and_then(|v| v.as_table())
    }
}

type Table = toml::map::Map<String, toml::Value>;

fn read_integer(table: &Table, section: &str, key: &str) -> TilerResult<Option<i64>> {
    match table.get(key) {
        Some(value) => value
            .as_integer()
            .map(Some)
            .ok_or_else(|| type_error(section, key, "an integer")),
        None => Ok(None),
    }
}

fn read_bool(table: &Table, section: &str, key: &str) -> TilerResult<Option<bool>> {
    match table.get(key) {
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| type_error(section, key, "a boolean")),
        None => Ok(None),
    }
}

fn read_string(table: &Table, section: &str, key: &str) -> TilerResult<Option<String>> {
    match table.get(key) {
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| type_error(section, key, "a string")),
        None => Ok(None),
    }
}

fn to_u32(value: i64, key: &str) -> TilerResult<u32> {
    u32::try_from(value).map_err(|_| TilerError::InvalidConfig(format!("{} out of range: {}", key, value)))
}

fn type_error(section: &str, key: &str, expected: &str) -> TilerError {
    TilerError::InvalidConfig(format!("{}.{} must be {}", section, key, expected))
}
