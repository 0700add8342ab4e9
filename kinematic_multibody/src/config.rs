//! # 场景配置
//!
//! 场景参数从 RON 文件读取，缺省字段取 [`SceneConfig::default`] 的值。
//!
//! ```ron
//! (
//!     num_links: 7,
//!     floating_base: true,
//!     animation: (amplitude: 0.5, frequency: 2.0, phase: 0.0),
//! )
//! ```

use crate::error::ConfigError;
use crate::multibody::{ConstraintSolverKind, Integrator};
use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 运动学关节的正弦轨迹: `amplitude * sin(frequency * t + phase)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub amplitude: f32,
    /// 角频率 (rad/s)
    pub frequency: f32,
    pub phase: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            frequency: 3.0,
            phase: -0.3,
        }
    }
}

impl AnimationConfig {
    pub fn target(&self, time: f32) -> f32 {
        self.amplitude * (self.frequency * time + self.phase).sin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub num_links: usize,
    pub link_half_extents: [f32; 3],
    pub link_mass: f32,
    pub base_position: [f32; 3],
    pub floating_base: bool,
    /// 第一次初始化使用的求解器
    pub solver: ConstraintSolverKind,
    pub integrator: Integrator,

    pub damping: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub use_gyro: bool,
    pub can_sleep: bool,
    pub self_collision: bool,
    /// 只创建多体，不加地面和箱子
    pub multibody_only: bool,
    /// 关节 0 的初始角度 (°)
    pub initial_joint_angle_deg: f32,

    pub friction: f32,
    /// 相机距离缩放
    pub scaling: f32,
    pub gravity: [f32; 3],
    pub global_cfm: f32,
    pub internal_time_step: f32,

    pub ground_height: f32,
    pub ground_half_extents: [f32; 3],
    pub box_half_extents: [f32; 3],
    pub box_mass: f32,
    pub box_position: [f32; 3],

    pub animation: AnimationConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_links: 5,
            link_half_extents: [0.05, 0.37, 0.1],
            link_mass: 1.0,
            base_position: [-0.4, 2.0, 0.0],
            floating_base: false,
            solver: ConstraintSolverKind::SequentialImpulse,
            integrator: Integrator::SemiImplicitEuler,
            damping: true,
            linear_damping: 0.1,
            angular_damping: 0.9,
            use_gyro: true,
            can_sleep: false,
            self_collision: true,
            multibody_only: false,
            initial_joint_angle_deg: 45.0,
            friction: 1.0,
            scaling: 0.4,
            gravity: [0.0, -9.81, 0.0],
            global_cfm: 1e-3,
            internal_time_step: 1.0 / 240.0,
            ground_height: -51.55,
            ground_half_extents: [50.0, 50.0, 50.0],
            box_half_extents: [0.5, 0.5, 0.5],
            box_mass: 1.0,
            box_position: [0.0, 0.0, 0.0],
            animation: AnimationConfig::default(),
        }
    }
}

fn positive_extents(field: &'static str, extents: [f32; 3]) -> Result<(), ConfigError> {
    if extents.iter().all(|e| e.is_finite() && *e > 0.0) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("half extents must be positive, got {:?}", extents),
        })
    }
}

fn finite_vector(field: &'static str, vector: [f32; 3]) -> Result<(), ConfigError> {
    if vector.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("components must be finite, got {:?}", vector),
        })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be non-negative, got {}", value),
        })
    }
}

impl SceneConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_extents("link_half_extents", self.link_half_extents)?;
        positive_extents("ground_half_extents", self.ground_half_extents)?;
        positive_extents("box_half_extents", self.box_half_extents)?;
        positive("link_mass", self.link_mass)?;
        positive("internal_time_step", self.internal_time_step)?;
        positive("scaling", self.scaling)?;
        // 质量为零的箱子是静态的
        non_negative("box_mass", self.box_mass)?;
        non_negative("friction", self.friction)?;
        non_negative("linear_damping", self.linear_damping)?;
        non_negative("angular_damping", self.angular_damping)?;
        non_negative("global_cfm", self.global_cfm)?;
        finite_vector("gravity", self.gravity)?;
        finite_vector("base_position", self.base_position)?;
        finite_vector("box_position", self.box_position)?;
        let AnimationConfig {
            amplitude,
            frequency,
            phase,
        } = self.animation;
        if ![amplitude, frequency, phase].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "animation",
                reason: "amplitude, frequency and phase must be finite".to_string(),
            });
        }
        Ok(())
    }

    pub fn link_half_extents(&self) -> Vec3 {
        Vec3::from_array(self.link_half_extents)
    }

    pub fn base_position(&self) -> Vec3 {
        Vec3::from_array(self.base_position)
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    pub fn ground_half_extents(&self) -> Vec3 {
        Vec3::from_array(self.ground_half_extents)
    }

    pub fn box_half_extents(&self) -> Vec3 {
        Vec3::from_array(self.box_half_extents)
    }

    pub fn box_position(&self) -> Vec3 {
        Vec3::from_array(self.box_position)
    }

    /// 开启阻尼时的 (线, 角) 阻尼系数，否则为零
    pub fn effective_damping(&self) -> (f32, f32) {
        if self.damping {
            (self.linear_damping, self.angular_damping)
        } else {
            (0.0, 0.0)
        }
    }
}
