use crate::run_config::RunConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, AdamWConfig, SgdConfig};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    AdamW,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Adam" => Ok(OptimizerKind::Adam),
            "AdamW" => Ok(OptimizerKind::AdamW),
            "SGD" => Ok(OptimizerKind::Sgd),
            other => anyhow::bail!("optimizer {other} is not implemented (Adam, AdamW, SGD)"),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizerKind::Adam => "Adam",
            OptimizerKind::AdamW => "AdamW",
            OptimizerKind::Sgd => "SGD",
        })
    }
}

/// Optimizer choice with the hyper-parameters it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub kind: OptimizerKind,
    pub lr: f64,
    pub betas: (f32, f32),
    pub momentum: f64,
}

/// Burn optimizer config ready to `init` against a model.
pub enum OptimizerConfig {
    Adam(AdamConfig),
    AdamW(AdamWConfig),
    Sgd(SgdConfig),
}

impl OptimizerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Adam(_) => "AdamConfig",
            OptimizerConfig::AdamW(_) => "AdamWConfig",
            OptimizerConfig::Sgd(_) => "SgdConfig",
        }
    }
}

impl OptimizerSettings {
    pub fn from_config(cfg: &RunConfig) -> anyhow::Result<Self> {
        let kind: OptimizerKind = cfg.optimizer_type.parse()?;
        let betas = match (kind, cfg.betas.as_slice()) {
            (OptimizerKind::Sgd, _) => (0.9, 0.999),
            (_, [b1, b2]) => (*b1, *b2),
            (_, other) => anyhow::bail!("--betas takes 2 values, got {}", other.len()),
        };
        Ok(Self {
            kind,
            lr: cfg.lr,
            betas,
            momentum: cfg.momentum,
        })
    }

    /// Adam variants take the betas, SGD takes the momentum.
    pub fn build(&self) -> OptimizerConfig {
        match self.kind {
            OptimizerKind::Adam => OptimizerConfig::Adam(
                AdamConfig::new()
                    .with_beta_1(self.betas.0)
                    .with_beta_2(self.betas.1),
            ),
            OptimizerKind::AdamW => OptimizerConfig::AdamW(
                AdamWConfig::new()
                    .with_beta_1(self.betas.0)
                    .with_beta_2(self.betas.1),
            ),
            OptimizerKind::Sgd => OptimizerConfig::Sgd(
                SgdConfig::new()
                    .with_momentum(Some(MomentumConfig::new().with_momentum(self.momentum))),
            ),
        }
    }

    pub fn describe(&self) -> String {
        match self.kind {
            OptimizerKind::Sgd => format!("{} lr={} momentum={}", self.kind, self.lr, self.momentum),
            _ => format!(
                "{} lr={} betas=({}, {})",
                self.kind, self.lr, self.betas.0, self.betas.1
            ),
        }
    }
}
