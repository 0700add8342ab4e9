//! # 速度计算模块
//!
//! 计算空间速度和运动子空间的时间导数

use super::model::{MultiBodyModel, SimulationState, FLOATING_BASE_DOFS};
use super::spatial_algebra::{cross_motion, SpatialMotion};
use bevy::math::Vec3;

/// 计算空间速度和cdof_dot
///
/// 需要先调用 `forward_kinematics`（使用其中的锚点和轴）。
///
/// ## 算法
///
/// 1. 浮动基座: 平动自由度 `[0; e_k]`，转动自由度绕基座质心 `[e_k; p × e_k]`。
///    转动子空间随基座平移而变化，其导数为 `[0; v × e_k]`。
/// 2. 对每个连杆（从根到叶）：
///    - cdof = [axis, anchor × axis]
///    - cdof_dot = cvel_parent × cdof
///    - cvel = cvel_parent + cdof * qvel
pub fn compute_velocities(model: &mut MultiBodyModel, state: &SimulationState) {
    let base_dofs = model.base_dofs();

    let base_cvel = if base_dofs == FLOATING_BASE_DOFS {
        let p = model.base.position;
        let linear = Vec3::new(state.qvel[0], state.qvel[1], state.qvel[2]);
        let omega = Vec3::new(state.qvel[3], state.qvel[4], state.qvel[5]);

        let mut cvel = SpatialMotion::ZERO;
        for (k, e) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
            model.base_cdof[k] = SpatialMotion::translation_along(e);
            model.base_cdof_dot[k] = SpatialMotion::ZERO;
            model.base_cdof[3 + k] = SpatialMotion::rotation_about(e, p);
            model.base_cdof_dot[3 + k] = SpatialMotion::new(Vec3::ZERO, linear.cross(e));
        }
        for k in 0..FLOATING_BASE_DOFS {
            cvel = cvel.add(&model.base_cdof[k].scale(state.qvel[k]));
        }

        model.base.velocity = linear;
        model.base.angular_velocity = omega;
        cvel
    } else {
        model.base.velocity = Vec3::ZERO;
        model.base.angular_velocity = Vec3::ZERO;
        SpatialMotion::ZERO
    };
    model.base.spatial_velocity = base_cvel;

    for i in 0..model.joints.len() {
        let joint = &model.joints[i];
        let qvel = state.qvel[base_dofs + i];
        let parent_cvel = model.parent_body(joint.parent_body).spatial_velocity;

        let cdof = SpatialMotion::rotation_about(joint.xaxis, joint.xanchor);
        let cdof_dot = cross_motion(&parent_cvel, &cdof);
        let cvel = parent_cvel.add(&cdof.scale(qvel));
        let child = joint.child_body;

        model.joints[i].cdof = cdof;
        model.joints[i].cdof_dot = cdof_dot;

        // 同时更新质心处的3D速度（用于可视化和阻尼）
        let body = &mut model.bodies[child];
        body.spatial_velocity = cvel;
        body.angular_velocity = cvel.angular;
        body.velocity = cvel.velocity_at(body.position);
    }
}
