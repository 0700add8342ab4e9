//! # 质心计算模块
//!
//! 整个多体（含基座）的质心，需要已经运行过 forward_kinematics

use super::model::MultiBodyModel;
use bevy::math::Vec3;

/// 整个多体（基座 + 所有连杆）的质心
pub fn total_center_of_mass(model: &MultiBodyModel) -> Vec3 {
    let (weighted, mass) = model
        .bodies
        .iter()
        .chain(std::iter::once(&model.base))
        .fold((Vec3::ZERO, 0.0), |(w, m), b| (w + b.position * b.mass, m + b.mass));

    if mass > 1e-10 {
        weighted / mass
    } else {
        model.base.position
    }
}
