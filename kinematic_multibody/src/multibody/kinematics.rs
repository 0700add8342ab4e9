//! # 运动学模块
//!
//! 实现前向运动学算法，从广义坐标计算刚体的位置和姿态

use super::model::{MultiBodyModel, SimulationState};
use bevy::math::Quat;

/// 前向运动学：从广义坐标计算刚体位置和姿态
///
/// ## 算法流程
///
/// 基座位姿直接取自 `state`，然后从根到叶依次计算每个连杆：
///
/// 1. **零位变换**:
///    ```text
///    p0 = p_parent + R_parent * body_offset
///    ```
///
/// 2. **关节锚点和轴**（世界坐标系，在关节转动中保持不变）:
///    ```text
///    anchor = p0 + R_parent * joint_offset
///    axis_w = R_parent * axis
///    ```
///
/// 3. **连杆姿态**:
///    ```text
///    R_body = R_parent * AxisAngle(axis, θ)
///    ```
///
/// 4. **绕锚点的偏心转动修正**:
///    ```text
///    p_body = anchor - R_body * joint_offset
///    ```
///
/// ## 副作用
/// 更新 `model.base` 和 `model.bodies` 的 `position`, `orientation`，
/// 以及每个关节的 `xanchor`, `xaxis`
pub fn forward_kinematics(model: &mut MultiBodyModel, state: &SimulationState) {
    model.base.position = state.base_position;
    model.base.orientation = state.base_orientation.normalize();

    for i in 0..model.joints.len() {
        let joint = &model.joints[i];
        let angle = state.q[i];

        let parent = model.parent_body(joint.parent_body);
        let (parent_pos, parent_quat) = (parent.position, parent.orientation);

        let xpos0 = parent_pos + parent_quat * joint.body_offset;
        let xanchor = xpos0 + parent_quat * joint.joint_offset;
        let xaxis = parent_quat * joint.axis;

        // 规范化四元数，防止累积误差
        let xquat = (parent_quat * Quat::from_axis_angle(joint.axis, angle)).normalize();
        let xpos = xanchor - xquat * joint.joint_offset;

        let child = joint.child_body;
        model.joints[i].xanchor = xanchor;
        model.joints[i].xaxis = xaxis;

        let body = &mut model.bodies[child];
        body.position = xpos;
        body.orientation = xquat;
    }
}
