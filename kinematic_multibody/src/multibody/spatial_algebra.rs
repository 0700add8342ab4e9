//! # 空间代数模块
//!
//! 实现6D空间向量的运算，用于多体动力学计算。
//!
//! 基于Featherstone的空间代数理论。所有空间量都表达在世界坐标系中、
//! 以世界原点为参考点，因此父子body之间的量可以直接相加，无需坐标变换。
//!
//! ## 空间向量格式
//!
//! ```text
//! motion = [ω ; v_O]     角速度 + 世界原点处的线速度
//! force  = [τ_O ; f]     关于世界原点的力矩 + 合力
//! ```

use bevy::math::Vec3;

/// 空间运动向量 (Spatial Motion Vector)
///
/// 表示6D运动: [角速度, 线速度]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMotion {
    /// 角速度分量 (ω)
    pub angular: Vec3,
    /// 世界原点处的线速度分量 (v)
    pub linear: Vec3,
}

impl SpatialMotion {
    pub const ZERO: Self = Self {
        angular: Vec3::ZERO,
        linear: Vec3::ZERO,
    };

    pub fn new(angular: Vec3, linear: Vec3) -> Self {
        Self { angular, linear }
    }

    /// 绕过 `anchor` 的轴 `axis` 的纯转动
    ///
    /// 原点处线速度为 `anchor × axis`
    pub fn rotation_about(axis: Vec3, anchor: Vec3) -> Self {
        Self::new(axis, anchor.cross(axis))
    }

    /// 沿 `axis` 的纯平动
    pub fn translation_along(axis: Vec3) -> Self {
        Self::new(Vec3::ZERO, axis)
    }

    /// 参考点 `point` 处的线速度
    pub fn velocity_at(&self, point: Vec3) -> Vec3 {
        self.linear + self.angular.cross(point)
    }

    /// 标量乘法
    pub fn scale(&self, s: f32) -> Self {
        Self {
            angular: self.angular * s,
            linear: self.linear * s,
        }
    }

    /// 加法
    pub fn add(&self, other: &Self) -> Self {
        Self {
            angular: self.angular + other.angular,
            linear: self.linear + other.linear,
        }
    }

    /// 运动与力的对偶积（功率）
    pub fn dot(&self, force: &SpatialForce) -> f32 {
        self.angular.dot(force.torque) + self.linear.dot(force.force)
    }
}

/// 空间力向量 (Spatial Force Vector)
///
/// 表示6D力: [力矩, 力]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialForce {
    /// 关于世界原点的力矩 (τ)
    pub torque: Vec3,
    /// 力分量 (f)
    pub force: Vec3,
}

impl SpatialForce {
    pub const ZERO: Self = Self {
        torque: Vec3::ZERO,
        force: Vec3::ZERO,
    };

    pub fn new(torque: Vec3, force: Vec3) -> Self {
        Self { torque, force }
    }

    /// 作用在 `point` 处的力和力矩，平移到世界原点
    pub fn applied_at(point: Vec3, torque: Vec3, force: Vec3) -> Self {
        Self::new(torque + point.cross(force), force)
    }

    /// 加法
    pub fn add(&self, other: &Self) -> Self {
        Self {
            torque: self.torque + other.torque,
            force: self.force + other.force,
        }
    }
}

impl std::ops::AddAssign for SpatialForce {
    fn add_assign(&mut self, other: Self) {
        self.torque += other.torque;
        self.force += other.force;
    }
}

impl std::ops::SubAssign for SpatialForce {
    fn sub_assign(&mut self, other: Self) {
        self.torque -= other.torque;
        self.force -= other.force;
    }
}

/// 空间运动叉积 (Motion Cross-Product)
///
/// ```text
/// vel × m = [ω × ω_m ; ω × v_m + v × ω_m]
/// ```
///
/// 用于计算运动子空间的时间导数 cdof_dot = cvel_parent × cdof
pub fn cross_motion(vel: &SpatialMotion, m: &SpatialMotion) -> SpatialMotion {
    SpatialMotion::new(
        vel.angular.cross(m.angular),
        vel.angular.cross(m.linear) + vel.linear.cross(m.angular),
    )
}

/// 空间力叉积 (Force Cross-Product)
///
/// ```text
/// vel ×* f = [ω × τ + v × f ; ω × f]
/// ```
///
/// 用于计算速度积项: cvel ×* (I * cvel)
pub fn cross_force(vel: &SpatialMotion, f: &SpatialForce) -> SpatialForce {
    SpatialForce::new(
        vel.angular.cross(f.torque) + vel.linear.cross(f.force),
        vel.angular.cross(f.force),
    )
}
