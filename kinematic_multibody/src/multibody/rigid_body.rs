//! # 独立刚体
//!
//! 不属于任何多体的单个刚体（地面、自由落体的箱子）。质量为零时为静态。

use super::collision::CollisionShape;
use bevy::math::{Quat, Vec3};

#[derive(Debug, Clone)]
pub struct FreeRigidBody {
    pub mass: f32,
    /// 主惯量对角
    pub local_inertia: Vec3,
    pub shape: CollisionShape,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub friction: f32,
}

impl FreeRigidBody {
    /// 惯量由形状和质量推出
    pub fn new(mass: f32, shape: CollisionShape, position: Vec3) -> Self {
        Self {
            mass,
            local_inertia: shape.local_inertia(mass),
            shape,
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            friction: 0.5,
        }
    }

    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    /// 半隐式欧拉：先速度后位置
    pub fn integrate(&mut self, gravity: Vec3, dt: f32) {
        if self.is_static() {
            return;
        }
        self.linear_velocity += gravity * dt;
        self.position += self.linear_velocity * dt;
        self.orientation = (Quat::from_scaled_axis(self.angular_velocity * dt) * self.orientation).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_static_body_does_not_move() {
        let mut ground = FreeRigidBody::new(0.0, CollisionShape::cuboid(Vec3::splat(50.0)), Vec3::new(0.0, -51.55, 0.0));
        ground.integrate(Vec3::new(0.0, -9.81, 0.0), 1.0);
        assert!(ground.is_static());
        assert_eq!(ground.position.y, -51.55);
        assert_eq!(ground.local_inertia, Vec3::ZERO);
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut body = FreeRigidBody::new(1.0, CollisionShape::cuboid(Vec3::splat(0.5)), Vec3::ZERO);
        body.integrate(Vec3::new(0.0, -10.0, 0.0), 0.5);
        assert_relative_eq!(body.linear_velocity.y, -5.0);
        assert_relative_eq!(body.position.y, -2.5);
    }
}
