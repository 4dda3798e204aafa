use crate::counter::height::DEFAULT_WATCHER_CAPACITY;
use crate::runtime::telemetry;
use anyhow::{bail, Result};
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_MS: u64 = 500;
const DEFAULT_RESULT_PUBLICATION_BLOCK_STEP: u64 = 3;
const DEFAULT_RESUBSCRIBE_INITIAL_BACKOFF_SECS: u64 = 1;
const DEFAULT_RESUBSCRIBE_MAX_BACKOFF_SECS: u64 = 30;

/// Runtime configuration for the block counter service and publishers.
///
/// All instances must be constructed via [`CoordinationConfig::builder`] or
/// [`CoordinationConfig::new`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationConfig {
    initial_height: u64,
    tick_interval: Duration,
    result_publication_block_step: u64,
    resubscribe_initial_backoff: Duration,
    resubscribe_max_backoff: Duration,
    watcher_capacity: usize,
    metrics_interval: Duration,
}

pub struct CoordinationConfigParams {
    pub initial_height: u64,
    pub tick_interval: Duration,
    pub result_publication_block_step: u64,
    pub resubscribe_initial_backoff: Duration,
    pub resubscribe_max_backoff: Duration,
    pub watcher_capacity: usize,
    pub metrics_interval: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            initial_height: 0,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            result_publication_block_step: DEFAULT_RESULT_PUBLICATION_BLOCK_STEP,
            resubscribe_initial_backoff: Duration::from_secs(
                DEFAULT_RESUBSCRIBE_INITIAL_BACKOFF_SECS,
            ),
            resubscribe_max_backoff: Duration::from_secs(DEFAULT_RESUBSCRIBE_MAX_BACKOFF_SECS),
            watcher_capacity: DEFAULT_WATCHER_CAPACITY,
            metrics_interval: telemetry::DEFAULT_METRICS_INTERVAL,
        }
    }
}

impl CoordinationConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> CoordinationConfigBuilder {
        CoordinationConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: CoordinationConfigParams) -> Result<Self> {
        let CoordinationConfigParams {
            initial_height,
            tick_interval,
            result_publication_block_step,
            resubscribe_initial_backoff,
            resubscribe_max_backoff,
            watcher_capacity,
            metrics_interval,
        } = params;

        let config = Self {
            initial_height,
            tick_interval,
            result_publication_block_step,
            resubscribe_initial_backoff,
            resubscribe_max_backoff,
            watcher_capacity,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Height the counter reports before the first block arrives.
    pub fn initial_height(&self) -> u64 {
        self.initial_height
    }

    /// Block period of the self-contained ticker.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Width, in blocks, of each member's publication eligibility window.
    pub fn result_publication_block_step(&self) -> u64 {
        self.result_publication_block_step
    }

    pub fn resubscribe_initial_backoff(&self) -> Duration {
        self.resubscribe_initial_backoff
    }

    pub fn resubscribe_max_backoff(&self) -> Duration {
        self.resubscribe_max_backoff
    }

    /// Buffered heights per block watcher before updates are dropped.
    pub fn watcher_capacity(&self) -> usize {
        self.watcher_capacity
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            bail!("tick_interval must be greater than 0");
        }

        if self.result_publication_block_step == 0 {
            bail!("result_publication_block_step must be greater than 0");
        }

        if self.resubscribe_initial_backoff.is_zero() {
            bail!("resubscribe_initial_backoff must be greater than 0");
        }

        if self.resubscribe_max_backoff < self.resubscribe_initial_backoff {
            bail!(
                "resubscribe_max_backoff ({:?}) must be at least resubscribe_initial_backoff ({:?})",
                self.resubscribe_max_backoff,
                self.resubscribe_initial_backoff,
            );
        }

        if self.watcher_capacity == 0 {
            bail!("watcher_capacity must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CoordinationConfigBuilder {
    initial_height: Option<u64>,
    tick_interval: Option<Duration>,
    result_publication_block_step: Option<u64>,
    resubscribe_initial_backoff: Option<Duration>,
    resubscribe_max_backoff: Option<Duration>,
    watcher_capacity: Option<usize>,
    metrics_interval: Option<Duration>,
}

impl CoordinationConfigBuilder {
    pub fn initial_height(mut self, height: u64) -> Self {
        self.initial_height = Some(height);
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn result_publication_block_step(mut self, blocks: u64) -> Self {
        self.result_publication_block_step = Some(blocks);
        self
    }

    pub fn resubscribe_initial_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_initial_backoff = Some(backoff);
        self
    }

    pub fn resubscribe_max_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_max_backoff = Some(backoff);
        self
    }

    pub fn watcher_capacity(mut self, capacity: usize) -> Self {
        self.watcher_capacity = Some(capacity);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<CoordinationConfig> {
        let defaults = CoordinationConfig::default();
        let params = CoordinationConfigParams {
            initial_height: self.initial_height.unwrap_or(defaults.initial_height),
            tick_interval: self.tick_interval.unwrap_or(defaults.tick_interval),
            result_publication_block_step: self
                .result_publication_block_step
                .unwrap_or(defaults.result_publication_block_step),
            resubscribe_initial_backoff: self
                .resubscribe_initial_backoff
                .unwrap_or(defaults.resubscribe_initial_backoff),
            resubscribe_max_backoff: self
                .resubscribe_max_backoff
                .unwrap_or(defaults.resubscribe_max_backoff),
            watcher_capacity: self.watcher_capacity.unwrap_or(defaults.watcher_capacity),
            metrics_interval: self.metrics_interval.unwrap_or(defaults.metrics_interval),
        };

        CoordinationConfig::new(params)
    }
}
