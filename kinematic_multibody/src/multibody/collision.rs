//! # 碰撞几何模块
//!
//! 碰撞形状、碰撞体和碰撞过滤。只维护几何数据和过滤规则，
//! 不做粗/细阶段检测和接触求解。

use super::geometry::box_inertia;
use bevy::math::{Mat3, Quat, Vec3};

/// 碰撞过滤组（位掩码）
pub mod filter {
    pub const DEFAULT: i32 = 1;
    pub const STATIC: i32 = 2;
    pub const ALL: i32 = -1;
}

/// 碰撞形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionShape {
    /// 以质心为中心的长方体
    Box { half_extents: Vec3 },
}

impl CollisionShape {
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Box { half_extents }
    }

    /// 给定质量时的主惯量对角
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Self::Box { half_extents } => box_inertia(half_extents, mass),
        }
    }

    /// 世界坐标系下的轴对齐包围盒
    pub fn aabb(&self, position: Vec3, rotation: Quat) -> Aabb {
        match *self {
            Self::Box { half_extents } => {
                // 旋转后的包围盒半径: |R| * h
                let r = Mat3::from_quat(rotation);
                let abs = Mat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs());
                let extent = abs * half_extents;
                Aabb {
                    min: position - extent,
                    max: position + extent,
                }
            }
        }
    }
}

/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

/// 碰撞体的归属
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderOwner {
    /// 世界中的独立刚体
    RigidBody(usize),
    /// 多体的连杆，`link == -1` 为基座
    MultiBodyLink { multibody: usize, link: i32 },
}

/// 碰撞体：形状 + 世界位姿 + 材料 + 过滤
#[derive(Debug, Clone)]
pub struct Collider {
    pub owner: ColliderOwner,
    pub shape: CollisionShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub friction: f32,
    /// 所属组
    pub group: i32,
    /// 可与哪些组碰撞
    pub mask: i32,
    /// 所属刚体质量为零
    pub static_object: bool,
    /// 所属连杆按给定轨迹运动
    pub kinematic: bool,
}

impl Collider {
    pub fn new(owner: ColliderOwner, shape: CollisionShape) -> Self {
        Self {
            owner,
            shape,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            friction: 0.5,
            group: filter::DEFAULT,
            mask: filter::ALL,
            static_object: false,
            kinematic: false,
        }
    }

    pub fn with_filter(mut self, group: i32, mask: i32) -> Self {
        self.group = group;
        self.mask = mask;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(self.position, self.rotation)
    }

    pub fn is_static_or_kinematic(&self) -> bool {
        self.static_object || self.kinematic
    }

    /// 双向的组/掩码检查
    pub fn filter_accepts(&self, other: &Collider) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_filter_is_symmetric() {
        let shape = CollisionShape::cuboid(Vec3::ONE);
        let ground = Collider::new(ColliderOwner::RigidBody(0), shape).with_filter(1, 1 + 2);
        let link = Collider::new(ColliderOwner::MultiBodyLink { multibody: 0, link: 0 }, shape).with_filter(2, 1 + 2);
        let debris = Collider::new(ColliderOwner::RigidBody(1), shape).with_filter(8, 8);

        assert!(ground.filter_accepts(&link));
        assert!(link.filter_accepts(&ground));
        assert!(!link.filter_accepts(&debris));
        assert!(!debris.filter_accepts(&ground));
    }

    #[test]
    fn test_rotated_box_aabb() {
        let shape = CollisionShape::cuboid(Vec3::new(0.05, 0.37, 0.1));
        let aabb = shape.aabb(Vec3::ZERO, Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));

        // 绕 X 转 90°: Y 与 Z 半径互换
        assert_relative_eq!(aabb.max.x, 0.05, epsilon = 1e-6);
        assert_relative_eq!(aabb.max.y, 0.1, epsilon = 1e-6);
        assert_relative_eq!(aabb.max.z, 0.37, epsilon = 1e-6);
    }

    #[test]
    fn test_aabb_overlap() {
        let shape = CollisionShape::cuboid(Vec3::splat(0.5));
        let a = shape.aabb(Vec3::ZERO, Quat::IDENTITY);
        let b = shape.aabb(Vec3::new(0.9, 0.0, 0.0), Quat::IDENTITY);
        let c = shape.aabb(Vec3::new(1.1, 0.0, 0.0), Quat::IDENTITY);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
