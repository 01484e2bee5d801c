use std::{num::NonZeroUsize, str::FromStr, sync::Arc};

use bon::bon;
use core_affinity::CoreId;
use thiserror::Error;

use super::triangle_bvh::LEAF_NODE_MAX_TRIANGLES;

const DEFAULT_MAX_LEAF_TRIANGLES: usize = LEAF_NODE_MAX_TRIANGLES;
const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per logical CPU.
    #[default]
    Auto,
    Manual(NonZeroUsize),
}

impl WorkerCount {
    pub fn get(&self) -> usize {
        match self {
            WorkerCount::Auto => num_cpus::get(),
            WorkerCount::Manual(num) => num.get(),
        }
    }
}

/// Engine settings shared by all scenes created on a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub workers: WorkerCount,
    /// Pin batch worker threads to CPU cores.
    pub pin_threads: bool,
    /// Largest number of triangles stored in a single hierarchy leaf.
    pub max_leaf_triangles: usize,
    /// Number of rays a batch worker takes at a time.
    pub chunk_size: NonZeroUsize,
}

#[bon]
impl DeviceConfig {
    #[builder]
    pub fn new(
        #[builder(default)] workers: WorkerCount,
        #[builder(default)] pin_threads: bool,
        #[builder(default = DEFAULT_MAX_LEAF_TRIANGLES)] max_leaf_triangles: usize,
        #[builder(default = DEFAULT_CHUNK_SIZE)] chunk_size: NonZeroUsize,
    ) -> Self {
        DeviceConfig {
            workers,
            pin_threads,
            max_leaf_triangles,
            chunk_size,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::builder().build()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed config entry {0:?}, expected key=value")]
    MalformedEntry(String),

    #[error("Unknown config key {0:?}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for config key {key:?}")]
    InvalidValue { key: String, value: String },
}

impl FromStr for DeviceConfig {
    type Err = ConfigError;

    /// Parses a comma separated list of `key=value` entries,
    /// for example `threads=4,pin_threads=1,leaf_size=16,chunk_size=64`.
    /// `threads=0` selects one worker per CPU. Missing keys keep their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = DeviceConfig::default();

        for entry in s.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let Some((key, value)) = entry.split_once('=') else {
                return Err(ConfigError::MalformedEntry(entry.to_owned()));
            };
            let (key, value) = (key.trim(), value.trim());
            let invalid = || ConfigError::InvalidValue {
                key: key.to_owned(),
                value: value.to_owned(),
            };

            match key {
                "threads" => {
                    let count: usize = value.parse().map_err(|_| invalid())?;
                    config.workers =
                        NonZeroUsize::new(count).map_or(WorkerCount::Auto, WorkerCount::Manual);
                }
                "pin_threads" => {
                    config.pin_threads = match value {
                        "1" | "true" => true,
                        "0" | "false" => false,
                        _ => return Err(invalid()),
                    };
                }
                "leaf_size" => {
                    config.max_leaf_triangles = value.parse().map_err(|_| invalid())?;
                }
                "chunk_size" => {
                    config.chunk_size = value.parse().map_err(|_| invalid())?;
                }
                _ => return Err(ConfigError::UnknownKey(key.to_owned())),
            }
        }

        Ok(config)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Leaf size {0} is out of range 1..={max}", max = LEAF_NODE_MAX_TRIANGLES)]
    LeafSizeOutOfRange(usize),

    #[error("Thread pinning requested, but the CPU core list is unavailable")]
    NoCoreIds,
}

/// Validated engine configuration, cheap to clone and share between scenes.
#[derive(Clone, Debug)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

#[derive(Debug)]
struct DeviceInner {
    config: DeviceConfig,
    core_ids: Option<Vec<CoreId>>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Device, DeviceError> {
        Self::validate(&config)
            .inspect_err(|e| log::error!("Device initialization failed: {e}"))?;

        let core_ids = if config.pin_threads {
            let ids = core_affinity::get_core_ids().filter(|ids| !ids.is_empty());
            if ids.is_none() {
                log::error!("Device initialization failed: {}", DeviceError::NoCoreIds);
                return Err(DeviceError::NoCoreIds);
            }
            ids
        } else {
            None
        };

        log::debug!(
            "Created device with {} workers, leaf size {}",
            config.workers.get(),
            config.max_leaf_triangles
        );

        Ok(Device {
            inner: Arc::new(DeviceInner { config, core_ids }),
        })
    }

    fn validate(config: &DeviceConfig) -> Result<(), DeviceError> {
        if !(1..=LEAF_NODE_MAX_TRIANGLES).contains(&config.max_leaf_triangles) {
            return Err(DeviceError::LeafSizeOutOfRange(config.max_leaf_triangles));
        }
        Ok(())
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn worker_count(&self) -> usize {
        self.inner.config.workers.get()
    }

    /// Core the given worker should be pinned to, None when pinning is disabled.
    pub fn core_for_worker(&self, worker_id: usize) -> Option<CoreId> {
        let ids = self.inner.core_ids.as_ref()?;
        ids.get(worker_id % ids.len()).copied()
    }
}
