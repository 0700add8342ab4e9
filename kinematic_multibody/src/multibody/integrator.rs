//! # 时间积分模块
//!
//! 实现数值积分算法，用于推进多体系统的时间演化

use super::dynamics::{compute_acceleration, compute_generalized_forces};
use super::kinematics::forward_kinematics;
use super::model::{LinkDynamicType, MultiBodyModel, SimulationState, FLOATING_BASE_DOFS};
use super::velocity::compute_velocities;
use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// 积分器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Integrator {
    /// 半隐式欧拉（每步 1 次动力学计算）
    #[default]
    SemiImplicitEuler,
    /// 四阶龙格库塔（每步 4 次动力学计算）
    Rk4,
}

/// 位形快照：关节角度 + 基座位姿
#[derive(Debug, Clone)]
struct Configuration {
    q: Vec<f32>,
    base_position: Vec3,
    base_orientation: Quat,
}

impl Configuration {
    fn capture(state: &SimulationState) -> Self {
        Self {
            q: state.q.clone(),
            base_position: state.base_position,
            base_orientation: state.base_orientation,
        }
    }
}

/// 从位形 `origin` 出发，以广义速度 `qvel` 前进 `h` 秒，写入 `state`
///
/// 浮动基座的角速度在世界坐标系中，用指数映射更新姿态。
/// 运动学关节的位置由外部给定，保持不变；其速度只参与耦合项。
fn advance_positions(
    model: &MultiBodyModel,
    origin: &Configuration,
    qvel: &[f32],
    h: f32,
    state: &mut SimulationState,
) {
    let base_dofs = model.base_dofs();
    for (i, joint) in model.joints.iter().enumerate() {
        state.q[i] = match joint.dynamic_type {
            LinkDynamicType::Kinematic => origin.q[i],
            LinkDynamicType::Dynamic => origin.q[i] + h * qvel[base_dofs + i],
        };
    }

    if base_dofs == FLOATING_BASE_DOFS {
        let linear = Vec3::new(qvel[0], qvel[1], qvel[2]);
        let omega = Vec3::new(qvel[3], qvel[4], qvel[5]);
        state.base_position = origin.base_position + linear * h;
        state.base_orientation = (Quat::from_scaled_axis(omega * h) * origin.base_orientation).normalize();
    } else {
        state.base_position = origin.base_position;
        state.base_orientation = origin.base_orientation;
    }
}

/// 只更新位姿和速度（不求解动力学）
pub fn update_kinematics(model: &mut MultiBodyModel, state: &SimulationState) {
    forward_kinematics(model, state);
    compute_velocities(model, state);
}

/// 前向动力学：计算当前状态下的加速度
///
/// ## 算法流程
///
/// 1. **Forward Kinematics**: q → (位置, 姿态)
/// 2. **Velocities**: 空间速度和 cdof_dot
/// 3. **Compute Forces**: 计算广义力 τ (重力, 科里奥利, 阻尼)
/// 4. **Compute Acceleration**: 求解 q̈ = M^(-1) * τ（运动学自由度为零）
pub fn forward_dynamics(model: &mut MultiBodyModel, state: &mut SimulationState, gravity: Vec3) {
    update_kinematics(model, state);

    let mut qfrc = vec![0.0; model.nv()];
    compute_generalized_forces(model, state, gravity, false, &mut qfrc);
    state.qfrc = qfrc;

    compute_acceleration(model, state);
}

/// 半隐式欧拉积分器
///
/// ## 算法
///
/// ```text
/// q̇_{n+1} = q̇_n + h * q̈_n
/// q_{n+1} = q_n + h * q̇_{n+1}
/// ```
///
/// 先更新速度，再用新速度更新位置。运动学关节的 q̈ 为零，
/// 位置保持外部给定的值。
pub fn semi_implicit_euler_step(
    model: &mut MultiBodyModel,
    state: &mut SimulationState,
    gravity: Vec3,
    dt: f32,
) {
    forward_dynamics(model, state, gravity);

    for (v, a) in state.qvel.iter_mut().zip(&state.qacc) {
        *v += dt * a;
    }

    let origin = Configuration::capture(state);
    let qvel = state.qvel.clone();
    advance_positions(model, &origin, &qvel, dt, state);

    update_kinematics(model, state);
}

/// RK4 (Runge-Kutta 4阶) 时间积分器
///
/// ## 理论背景
///
/// 对于二阶系统 y = [q, q̇]，dy/dt = [q̇, q̈]：
/// ```text
/// k₁ = f(t, y)
/// k₂ = f(t + h/2, y + h/2*k₁)
/// k₃ = f(t + h/2, y + h/2*k₂)
/// k₄ = f(t + h, y + h*k₃)
/// y_{n+1} = y_n + h/6*(k₁ + 2k₂ + 2k₃ + k₄)
/// ```
///
/// RK4的局部截断误差为 O(h⁵)，全局误差为 O(h⁴)。
pub fn rk4_step(model: &mut MultiBodyModel, state: &mut SimulationState, gravity: Vec3, dt: f32) {
    let nv = model.nv();

    // 保存初始状态
    let origin = Configuration::capture(state);
    let qvel0 = state.qvel.clone();

    let weights = [1.0, 2.0, 2.0, 1.0];
    let stage_offsets = [0.0, 0.5 * dt, 0.5 * dt, dt];

    let mut sum_vel = vec![0.0; nv];
    let mut sum_acc = vec![0.0; nv];
    let mut prev_vel = vec![0.0; nv];
    let mut prev_acc = vec![0.0; nv];

    for (stage, (&weight, &h)) in weights.iter().zip(&stage_offsets).enumerate() {
        if stage > 0 {
            // y_stage = y0 + h * k_prev
            advance_positions(model, &origin, &prev_vel, h, state);
            for i in 0..nv {
                state.qvel[i] = qvel0[i] + h * prev_acc[i];
            }
        }

        forward_dynamics(model, state, gravity);
        prev_vel.copy_from_slice(&state.qvel);
        prev_acc.copy_from_slice(&state.qacc);

        for i in 0..nv {
            sum_vel[i] += weight * prev_vel[i];
            sum_acc[i] += weight * prev_acc[i];
        }
    }

    // y_next = y + h/6*(k1 + 2*k2 + 2*k3 + k4)
    advance_positions(model, &origin, &sum_vel, dt / 6.0, state);
    for i in 0..nv {
        state.qvel[i] = qvel0[i] + dt / 6.0 * sum_acc[i];
    }

    update_kinematics(model, state);
}

/// 按选定的积分器推进一步
pub fn integrate(
    integrator: Integrator,
    model: &mut MultiBodyModel,
    state: &mut SimulationState,
    gravity: Vec3,
    dt: f32,
) {
    match integrator {
        Integrator::SemiImplicitEuler => semi_implicit_euler_step(model, state, gravity, dt),
        Integrator::Rk4 => rk4_step(model, state, gravity, dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::model::{HingeJoint, LinkDynamicType, RigidBody};
    use approx::assert_relative_eq;
    use bevy::math::Mat3;

    const G: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    fn pendulum(fixed_base: bool) -> MultiBodyModel {
        let inertia = Mat3::from_diagonal(Vec3::splat(0.1));
        let mut model = MultiBodyModel::new(RigidBody::new(1.0, inertia), fixed_base);
        model.linear_damping = 0.0;
        model.angular_damping = 0.0;
        let idx = model.add_body(RigidBody::new(1.0, inertia));
        model.add_hinge_joint(HingeJoint {
            parent_body: -1,
            child_body: idx,
            axis: Vec3::X,
            body_offset: Vec3::new(0.0, -1.0, 0.0),
            joint_offset: Vec3::new(0.0, 0.5, 0.0),
            ..Default::default()
        });
        model
    }

    /// 单摆机械能：动能 + 势能
    fn energy(model: &MultiBodyModel, state: &SimulationState) -> f32 {
        let body = &model.bodies[0];
        let omega = state.qvel[0];
        let kinetic = 0.5 * (0.1 + 0.25) * omega * omega;
        kinetic + 9.81 * body.position.y
    }

    #[test]
    fn test_rk4_integration() {
        let mut model = pendulum(true);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q[0] = std::f32::consts::FRAC_PI_2;

        let dt = 0.001;
        for _ in 0..10 {
            rk4_step(&mut model, &mut state, G, dt);
        }

        // 单摆应该开始向下摆动（角度减小，速度为负）
        assert!(state.q[0] < std::f32::consts::FRAC_PI_2);
        assert!(state.qvel[0] < 0.0);
    }

    #[test]
    fn test_rk4_conserves_energy() {
        let mut model = pendulum(true);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q[0] = 1.0;
        update_kinematics(&mut model, &state);
        let e0 = energy(&model, &state);

        for _ in 0..500 {
            rk4_step(&mut model, &mut state, G, 1.0 / 240.0);
        }

        assert_relative_eq!(energy(&model, &state), e0, epsilon = 5e-3);
    }

    #[test]
    fn test_semi_implicit_euler_swings() {
        let mut model = pendulum(true);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q[0] = 1.0;

        semi_implicit_euler_step(&mut model, &mut state, G, 1.0 / 240.0);

        assert!(state.qvel[0] < 0.0);
        assert_relative_eq!(state.q[0], 1.0 + state.qvel[0] / 240.0, epsilon = 1e-6);
    }

    #[test]
    fn test_kinematic_joint_holds_prescribed_state() {
        let mut model = pendulum(true);
        model.joints[0].dynamic_type = LinkDynamicType::Kinematic;
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q[0] = 0.2;
        state.qvel[0] = 3.0;

        for integrator in [Integrator::SemiImplicitEuler, Integrator::Rk4] {
            let mut s = state.clone();
            integrate(integrator, &mut model, &mut s, G, 0.01);
            assert_relative_eq!(s.qvel[0], 3.0);
            assert_relative_eq!(s.q[0], 0.2);
        }
    }

    #[test]
    fn test_kinematic_parent_drives_dynamic_child() {
        let inertia = Mat3::from_diagonal(Vec3::splat(0.1));
        let mut model = pendulum(true);
        let idx = model.add_body(RigidBody::new(1.0, inertia));
        model.add_hinge_joint(HingeJoint {
            parent_body: 0,
            child_body: idx,
            axis: Vec3::X,
            body_offset: Vec3::new(0.0, -1.0, 0.0),
            joint_offset: Vec3::new(0.0, 0.5, 0.0),
            ..Default::default()
        });
        model.joints[0].dynamic_type = LinkDynamicType::Kinematic;

        let mut still = SimulationState::new(model.nq, model.nv());
        still.q[1] = 0.5;
        let mut spinning = still.clone();
        spinning.qvel[0] = 2.0;

        semi_implicit_euler_step(&mut model, &mut still, G, 0.01);
        semi_implicit_euler_step(&mut model, &mut spinning, G, 0.01);

        // 父关节位置不变，但其速度通过耦合项改变子关节的加速度
        assert_eq!(spinning.q[0], 0.0);
        assert!((spinning.qvel[1] - still.qvel[1]).abs() > 1e-3);
    }

    #[test]
    fn test_floating_base_falls() {
        let mut model = pendulum(false);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.base_position = Vec3::new(0.0, 2.0, 0.0);

        for _ in 0..240 {
            rk4_step(&mut model, &mut state, G, 1.0 / 240.0);
        }

        // 一秒自由落体: Δy = -g/2
        assert_relative_eq!(state.base_position.y, 2.0 - 0.5 * 9.81, epsilon = 1e-2);
        assert_relative_eq!(state.qvel[1], -9.81, epsilon = 1e-2);
        assert!(state.q[0].abs() < 1e-3);
    }
}
