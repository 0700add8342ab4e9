//! # 约束求解器选择
//!
//! 世界持有的求解器种类和全局求解参数。

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 约束求解器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum ConstraintSolverKind {
    /// 顺序冲量
    #[default]
    #[value(name = "si")]
    SequentialImpulse,
    /// 混合线性互补 + 投影高斯-赛德尔
    #[value(name = "pgs")]
    MlcpPgs,
    /// 混合线性互补 + Dantzig 主元法
    #[value(name = "dantzig")]
    MlcpDantzig,
    /// 混合线性互补 + Lemke 算法
    #[value(name = "lemke")]
    MlcpLemke,
}

/// MLCP 求解器的后端算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlcpBackend {
    Pgs,
    Dantzig,
    Lemke,
}

impl ConstraintSolverKind {
    pub const COUNT: usize = 4;

    /// 0 → SI, 1 → PGS, 2 → Dantzig, 其余 → Lemke
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::SequentialImpulse,
            1 => Self::MlcpPgs,
            2 => Self::MlcpDantzig,
            _ => Self::MlcpLemke,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::SequentialImpulse => 0,
            Self::MlcpPgs => 1,
            Self::MlcpDantzig => 2,
            Self::MlcpLemke => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SequentialImpulse => "Sequential Impulse",
            Self::MlcpPgs => "MLCP + PGS",
            Self::MlcpDantzig => "MLCP + Dantzig",
            Self::MlcpLemke => "MLCP + Lemke",
        }
    }

    pub fn mlcp_backend(self) -> Option<MlcpBackend> {
        match self {
            Self::SequentialImpulse => None,
            Self::MlcpPgs => Some(MlcpBackend::Pgs),
            Self::MlcpDantzig => Some(MlcpBackend::Dantzig),
            Self::MlcpLemke => Some(MlcpBackend::Lemke),
        }
    }
}

impl fmt::Display for ConstraintSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 全局求解参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverInfo {
    pub solver: ConstraintSolverKind,
    /// 全局约束力混合系数
    pub global_cfm: f32,
}

impl SolverInfo {
    pub fn new(solver: ConstraintSolverKind) -> Self {
        Self {
            solver,
            global_cfm: 0.0,
        }
    }
}
