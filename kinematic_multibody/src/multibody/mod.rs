//! # Multibody Dynamics Framework
//!
//! 基于广义坐标的多体动力学框架：铰链连接的树形连杆，固定或浮动基座，
//! 连杆可以是动态的，也可以是按给定轨迹运动的运动学连杆。
//!
//! ## 核心概念
//!
//! - **广义坐标 (Generalized Coordinates)**: 基座 6 自由度（浮动时）+ 每个铰链 1 个
//! - **前向运动学 (Forward Kinematics)**: 从关节角度计算连杆位置和姿态
//! - **前向动力学 (Forward Dynamics)**: 从力/力矩计算加速度，运动学自由度加速度为零
//! - **时间积分 (Time Integration)**: 半隐式欧拉或 RK4
//!
//! ## 算法参考
//!
//! - **RNE (Recursive Newton-Euler)**: 计算广义力
//! - **CRBA (Composite Rigid Body Algorithm)**: 计算质量矩阵
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use kinematic_multibody::multibody::*;
//!
//! let mut mb = MultiBody::new(1, 1.0, Vec3::ONE, true, false);
//! mb.setup_revolute(0, 1.0, Vec3::ONE, -1, Vec3::Z, Vec3::NEG_Y, Vec3::NEG_Y)?;
//! mb.finalize()?;
//!
//! let mut world = MultiBodyWorld::new(ConstraintSolverKind::SequentialImpulse);
//! let id = world.add_multi_body(mb)?;
//! loop {
//!     world.step_simulation(frame_dt, 1, 1.0 / 240.0);
//! }
//! ```

pub mod articulation;
pub mod collision;
pub mod dynamics;
pub mod geometry;
pub mod integrator;
pub mod kinematics;
pub mod model;
pub mod rigid_body;
pub mod solver;
pub mod spatial_algebra;
pub mod subtree_com;
pub mod velocity;
pub mod world;

// Re-export commonly used types
pub use articulation::MultiBody;
pub use collision::{Collider, ColliderOwner, CollisionShape};
pub use geometry::box_inertia;
pub use integrator::Integrator;
pub use model::LinkDynamicType;
pub use rigid_body::FreeRigidBody;
pub use solver::{ConstraintSolverKind, SolverInfo};
pub use world::MultiBodyWorld;
