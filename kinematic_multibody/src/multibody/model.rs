//! # 多体模型数据结构
//!
//! 定义多体动力学系统的核心数据结构

use super::spatial_algebra::{SpatialForce, SpatialMotion};
use bevy::math::{Mat3, Quat, Vec3};

/// 空间惯性 (Spatial Inertia)
///
/// 表示刚体关于世界原点的惯性属性，用于 RNE 和 CRBA
///
/// ## 存储格式
/// - `mass`: 质量 m
/// - `mass_com`: 一阶矩 m·c（c 为世界坐标系下的质心）
/// - `inertia`: 关于世界原点的转动惯量 I_O = I_c + m(|c|²·1 - c·cᵀ)
///
/// 三个分量都是线性可加的，所以复合刚体惯性就是逐项求和。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialInertia {
    /// 质量 (kg)
    pub mass: f32,
    /// 质量乘质心位置 (kg·m)
    pub mass_com: Vec3,
    /// 关于世界原点的转动惯量张量 (kg·m²)
    pub inertia: Mat3,
}

impl SpatialInertia {
    /// 零惯性（用于初始化）
    pub const ZERO: Self = Self {
        mass: 0.0,
        mass_com: Vec3::ZERO,
        inertia: Mat3::ZERO,
    };

    /// 从刚体的当前位姿创建空间惯性
    pub fn from_body(body: &RigidBody) -> Self {
        let c = body.position;
        let m = body.mass;
        let outer = Mat3::from_cols(c * c.x, c * c.y, c * c.z);
        let parallel_axis = Mat3::from_diagonal(Vec3::splat(c.length_squared())) - outer;
        Self {
            mass: m,
            mass_com: c * m,
            inertia: body.world_inertia() + parallel_axis * m,
        }
    }

    /// 质心位置（质量为零时返回原点）
    pub fn center_of_mass(&self) -> Vec3 {
        if self.mass > 1e-10 {
            self.mass_com / self.mass
        } else {
            Vec3::ZERO
        }
    }

    /// 计算 f = I * v
    ///
    /// ```text
    /// τ = I_O·ω + (m·c) × v
    /// f = m·v + ω × (m·c)
    /// ```
    pub fn mul_motion(&self, v: &SpatialMotion) -> SpatialForce {
        SpatialForce::new(
            self.inertia * v.angular + self.mass_com.cross(v.linear),
            v.linear * self.mass + v.angular.cross(self.mass_com),
        )
    }

    /// 累加两个空间惯性（用于 CRBA 算法）
    pub fn add(&self, other: &SpatialInertia) -> SpatialInertia {
        SpatialInertia {
            mass: self.mass + other.mass,
            mass_com: self.mass_com + other.mass_com,
            inertia: self.inertia + other.inertia,
        }
    }
}

impl std::ops::AddAssign for SpatialInertia {
    fn add_assign(&mut self, other: Self) {
        *self = self.add(&other);
    }
}

/// 刚体 (Rigid Body)
///
/// 多体系统中的一个刚性物体（基座或连杆）。位置即质心位置。
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// 质量 (kg)
    pub mass: f32,
    /// 转动惯量张量，在体坐标系中 (kg·m²)
    pub inertia: Mat3,

    /// 质心位置（世界坐标系）
    pub position: Vec3,
    /// 姿态（四元数表示）
    pub orientation: Quat,

    /// 质心线速度（世界坐标系）
    pub velocity: Vec3,
    /// 角速度（世界坐标系）
    pub angular_velocity: Vec3,

    /// 6D 空间速度（世界原点处）
    pub spatial_velocity: SpatialMotion,
}

impl RigidBody {
    /// 创建新的刚体
    ///
    /// # 参数
    /// - `mass`: 质量 (kg)
    /// - `inertia`: 转动惯量张量 (kg·m²)
    pub fn new(mass: f32, inertia: Mat3) -> Self {
        Self {
            mass,
            inertia,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            spatial_velocity: SpatialMotion::ZERO,
        }
    }

    /// 世界坐标系下、关于质心的转动惯量 R·I·Rᵀ
    pub fn world_inertia(&self) -> Mat3 {
        let r = Mat3::from_quat(self.orientation);
        r * self.inertia * r.transpose()
    }
}

/// 连杆的动力学类型
///
/// `Kinematic` 连杆的关节位置和速度由外部直接给定，动力学求解时
/// 该自由度的加速度固定为零。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkDynamicType {
    #[default]
    Dynamic,
    Kinematic,
}

/// 铰链关节 (Hinge Joint)
///
/// 连接两个刚体的单自由度旋转关节
///
/// ## 拓扑结构
/// - 父体可以是另一个连杆或基座（parent_body = -1）
/// - 子体必须是系统中的一个连杆
#[derive(Debug, Clone)]
pub struct HingeJoint {
    /// 父体索引（-1 表示基座）
    pub parent_body: i32,
    /// 子体索引
    pub child_body: usize,

    /// 关节轴方向（在父体坐标系中，单位向量）
    pub axis: Vec3,

    /// 零位时子体质心相对父体质心的偏移（在父体坐标系中）
    pub body_offset: Vec3,
    /// 关节相对子体质心的偏移（在子体坐标系中）
    pub joint_offset: Vec3,

    /// 阻尼系数（模拟摩擦和能量耗散）
    pub damping: f32,
    /// 电机转子惯量（附加到关节的惯性）
    pub armature: f32,

    /// 子连杆的动力学类型
    pub dynamic_type: LinkDynamicType,

    /// 关节锚点（世界坐标系），由前向运动学更新
    pub xanchor: Vec3,
    /// 关节轴（世界坐标系），由前向运动学更新
    pub xaxis: Vec3,

    /// 运动子空间 (cdof)
    pub cdof: SpatialMotion,
    /// 运动子空间的时间导数 (cdof_dot)
    pub cdof_dot: SpatialMotion,
}

impl Default for HingeJoint {
    fn default() -> Self {
        Self {
            parent_body: -1,
            child_body: 0,
            axis: Vec3::X,
            body_offset: Vec3::ZERO,
            joint_offset: Vec3::ZERO,
            damping: 0.0,
            armature: 0.0,
            dynamic_type: LinkDynamicType::Dynamic,
            xanchor: Vec3::ZERO,
            xaxis: Vec3::X,
            cdof: SpatialMotion::ZERO,
            cdof_dot: SpatialMotion::ZERO,
        }
    }
}

/// 浮动基座的自由度数（3 平动 + 3 转动）
pub const FLOATING_BASE_DOFS: usize = 6;

/// 多体动力学模型
///
/// 包含整个多体系统的拓扑结构和物理属性
///
/// ## 系统假设
/// - 树状拓扑结构（无闭环），父连杆索引小于子连杆
/// - 使用广义坐标描述系统状态；浮动基座的 6 个速度自由度排在最前
#[derive(Debug, Clone)]
pub struct MultiBodyModel {
    /// 基座刚体
    pub base: RigidBody,
    /// 基座是否固定在世界中
    pub fixed_base: bool,
    /// 系统中的所有连杆
    pub bodies: Vec<RigidBody>,
    /// 系统中的所有铰链关节（joints[i].child_body == i）
    pub joints: Vec<HingeJoint>,
    /// 关节位置自由度数量（= 关节数量）
    pub nq: usize,

    /// 线阻尼系数
    pub linear_damping: f32,
    /// 角阻尼系数
    pub angular_damping: f32,
    /// 是否计算陀螺力矩 ω × Iω
    pub use_gyro: bool,

    /// 浮动基座的运动子空间 [vx, vy, vz, ωx, ωy, ωz]
    pub base_cdof: [SpatialMotion; FLOATING_BASE_DOFS],
    /// 浮动基座运动子空间的时间导数
    pub base_cdof_dot: [SpatialMotion; FLOATING_BASE_DOFS],
}

/// 仿真状态
///
/// ## 广义坐标说明
/// - `q`: 关节角度（长度 nq）
/// - `qvel`: 广义速度（长度 nv；浮动基座时前 6 项为基座线速度和角速度）
/// - `qacc`: 广义加速度（长度 nv）
/// - `qfrc`: 广义力（长度 nv）
/// - 基座位姿单独保存，避免在广义坐标中处理四元数
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// 关节角度（单位：弧度）
    pub q: Vec<f32>,
    /// 广义速度
    pub qvel: Vec<f32>,
    /// 广义加速度
    pub qacc: Vec<f32>,
    /// 广义力
    pub qfrc: Vec<f32>,
    /// 基座质心位置（世界坐标系）
    pub base_position: Vec3,
    /// 基座姿态
    pub base_orientation: Quat,
}

impl SimulationState {
    /// 创建新的仿真状态
    ///
    /// 所有状态变量初始化为零，基座位于原点
    pub fn new(nq: usize, nv: usize) -> Self {
        Self {
            q: vec![0.0; nq],
            qvel: vec![0.0; nv],
            qacc: vec![0.0; nv],
            qfrc: vec![0.0; nv],
            base_position: Vec3::ZERO,
            base_orientation: Quat::IDENTITY,
        }
    }
}

impl MultiBodyModel {
    /// 创建只有基座的多体模型
    pub fn new(base: RigidBody, fixed_base: bool) -> Self {
        Self {
            base,
            fixed_base,
            bodies: Vec::new(),
            joints: Vec::new(),
            nq: 0,
            linear_damping: 0.04,
            angular_damping: 0.04,
            use_gyro: true,
            base_cdof: [SpatialMotion::ZERO; FLOATING_BASE_DOFS],
            base_cdof_dot: [SpatialMotion::ZERO; FLOATING_BASE_DOFS],
        }
    }

    /// 添加刚体到模型
    ///
    /// # 返回
    /// 刚体的索引
    pub fn add_body(&mut self, body: RigidBody) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    /// 添加铰链关节到模型
    ///
    /// 每个关节增加一个自由度
    pub fn add_hinge_joint(&mut self, joint: HingeJoint) {
        self.joints.push(joint);
        self.nq += 1;
    }

    /// 基座占用的速度自由度数
    pub fn base_dofs(&self) -> usize {
        if self.fixed_base {
            0
        } else {
            FLOATING_BASE_DOFS
        }
    }

    /// 速度自由度总数
    pub fn nv(&self) -> usize {
        self.base_dofs() + self.nq
    }

    /// 父体（-1 为基座）
    pub fn parent_body(&self, parent: i32) -> &RigidBody {
        if parent >= 0 {
            &self.bodies[parent as usize]
        } else {
            &self.base
        }
    }

    /// 该速度自由度是否由动力学求解（不是运动学给定的）
    pub fn is_dynamic_dof(&self, dof: usize) -> bool {
        let base = self.base_dofs();
        dof < base || self.joints[dof - base].dynamic_type == LinkDynamicType::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spatial_inertia_point_mass() {
        // 位于 (0, -1, 0) 的 2kg 质点绕 X 轴转动
        let mut body = RigidBody::new(2.0, Mat3::ZERO);
        body.position = Vec3::new(0.0, -1.0, 0.0);
        let inertia = SpatialInertia::from_body(&body);

        // 平行轴定理：I_xx = m·r² = 2
        assert_relative_eq!(inertia.inertia.x_axis.x, 2.0);
        assert_relative_eq!(inertia.inertia.y_axis.y, 0.0);
        assert_relative_eq!(inertia.center_of_mass().y, -1.0);

        // 绕原点 X 轴以 1 rad/s 转动：动量 = m·(ω × c) = 2·(X × -Y) = (0,0,-2)
        let f = inertia.mul_motion(&SpatialMotion::rotation_about(Vec3::X, Vec3::ZERO));
        assert_relative_eq!(f.force.z, -2.0);
        assert_relative_eq!(f.torque.x, 2.0);
    }

    #[test]
    fn test_spatial_inertia_sum() {
        let mut a = RigidBody::new(1.0, Mat3::IDENTITY);
        a.position = Vec3::new(1.0, 0.0, 0.0);
        let mut b = RigidBody::new(3.0, Mat3::IDENTITY);
        b.position = Vec3::new(-1.0, 0.0, 0.0);

        let mut total = SpatialInertia::from_body(&a);
        total += SpatialInertia::from_body(&b);

        assert_relative_eq!(total.mass, 4.0);
        assert_relative_eq!(total.center_of_mass().x, -0.5);
    }

    #[test]
    fn test_world_inertia_rotates() {
        let mut body = RigidBody::new(1.0, Mat3::from_diagonal(Vec3::new(1.0, 2.0, 3.0)));
        body.orientation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let world = body.world_inertia();

        // 绕 Z 转 90°: 体 X 轴对齐世界 Y 轴
        assert_relative_eq!(world.x_axis.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(world.y_axis.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(world.z_axis.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_dof_layout() {
        let mut model = MultiBodyModel::new(RigidBody::new(1.0, Mat3::IDENTITY), false);
        let idx = model.add_body(RigidBody::new(1.0, Mat3::IDENTITY));
        model.add_hinge_joint(HingeJoint {
            child_body: idx,
            dynamic_type: LinkDynamicType::Kinematic,
            ..Default::default()
        });

        assert_eq!(model.nv(), 7);
        assert!(model.is_dynamic_dof(0));
        assert!(model.is_dynamic_dof(5));
        assert!(!model.is_dynamic_dof(6));
    }
}
