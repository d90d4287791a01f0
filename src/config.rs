// config.rs — executor selection from code or from the environment.
//
// Environment variables:
//
//   GAUSSBLUR_STRATEGY               sequential | partitioned | device
//   GAUSSBLUR_WORKERS                positive integer (partitioned only)
//   GAUSSBLUR_ALLOW_SOFTWARE_ADAPTER 0 | 1 (device only)
//
// An unset variable keeps the default. A set but unparseable one is an
// error, not a silent default.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::{BlurError, Result};
use crate::executor::Strategy;
use crate::gpu::blur::DeviceExecutor;
use crate::gpu::device::DeviceOptions;
use crate::partition::{default_workers, PartitionedExecutor};
use crate::sequential::SequentialExecutor;

pub const ENV_STRATEGY: &str = "GAUSSBLUR_STRATEGY";
pub const ENV_WORKERS: &str = "GAUSSBLUR_WORKERS";
pub const ENV_ALLOW_SOFTWARE: &str = "GAUSSBLUR_ALLOW_SOFTWARE_ADAPTER";

/// Executor kind, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Sequential,
    Partitioned,
    Device,
}

impl FromStr for StrategyKind {
    type Err = BlurError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(StrategyKind::Sequential),
            "partitioned" | "parallel" | "threads" => Ok(StrategyKind::Partitioned),
            "device" | "gpu" => Ok(StrategyKind::Device),
            _ => Err(BlurError::InvalidConfig { key: ENV_STRATEGY, value: s.to_string() }),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Partitioned => "partitioned",
            StrategyKind::Device => "device",
        })
    }
}

/// Everything needed to build a [`Strategy`].
#[derive(Debug, Clone)]
pub struct BlurConfig {
    pub strategy: StrategyKind,
    /// Worker threads for the partitioned executor.
    pub workers: NonZeroUsize,
    pub device: DeviceOptions,
}

impl Default for BlurConfig {
    fn default() -> Self {
        BlurConfig {
            strategy: StrategyKind::Partitioned,
            workers: default_workers(),
            device: DeviceOptions::default(),
        }
    }
}

impl BlurConfig {
    /// Defaults overridden by the `GAUSSBLUR_*` environment variables.
    ///
    /// # Errors
    /// `InvalidConfig` naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = BlurConfig::default();

        if let Some(v) = lookup(ENV_STRATEGY) {
            config.strategy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_WORKERS) {
            config.workers = v
                .trim()
                .parse()
                .map_err(|_| BlurError::InvalidConfig { key: ENV_WORKERS, value: v.clone() })?;
        }
        if let Some(v) = lookup(ENV_ALLOW_SOFTWARE) {
            config.device.allow_software_adapter = match v.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(BlurError::InvalidConfig { key: ENV_ALLOW_SOFTWARE, value: v }),
            };
        }
        Ok(config)
    }

    /// Build the configured strategy.
    pub fn strategy(&self) -> Strategy {
        match self.strategy {
            StrategyKind::Sequential => Strategy::Sequential(SequentialExecutor::new()),
            StrategyKind::Partitioned => {
                Strategy::Partitioned(PartitionedExecutor::with_workers(self.workers))
            }
            StrategyKind::Device => Strategy::Device(DeviceExecutor::new(self.device.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = BlurConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.strategy, StrategyKind::Partitioned);
        assert_eq!(cfg.workers, default_workers());
        assert!(cfg.device.allow_software_adapter);
    }

    #[test]
    fn test_overrides() {
        let cfg = BlurConfig::from_lookup(lookup(&[
            (ENV_STRATEGY, "Sequential"),
            (ENV_WORKERS, " 6 "),
            (ENV_ALLOW_SOFTWARE, "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.strategy, StrategyKind::Sequential);
        assert_eq!(cfg.workers.get(), 6);
        assert!(!cfg.device.allow_software_adapter);
        assert_eq!(cfg.strategy().name(), "sequential");
    }

    #[test]
    fn test_bad_values_are_errors() {
        for (key, value) in [
            (ENV_STRATEGY, "quantum"),
            (ENV_WORKERS, "0"),
            (ENV_WORKERS, "-3"),
            (ENV_ALLOW_SOFTWARE, "maybe"),
        ] {
            let err = BlurConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            match err {
                BlurError::InvalidConfig { key: k, value: v } => {
                    assert_eq!(k, key);
                    assert_eq!(v, value);
                }
                other => panic!("expected InvalidConfig, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in [StrategyKind::Sequential, StrategyKind::Partitioned, StrategyKind::Device] {
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_partitioned_strategy_uses_workers() {
        let cfg = BlurConfig {
            workers: NonZeroUsize::new(3).unwrap(),
            ..BlurConfig::default()
        };
        match cfg.strategy() {
            Strategy::Partitioned(e) => assert_eq!(e.workers(), 3),
            other => panic!("expected partitioned, got {other:?}"),
        }
    }
}
