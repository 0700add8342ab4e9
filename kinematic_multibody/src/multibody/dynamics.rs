//! # 动力学模块
//!
//! 实现多体动力学核心算法：
//! - RNE (Recursive Newton-Euler Algorithm): 计算广义力
//! - CRBA (Composite Rigid Body Algorithm): 计算质量矩阵

use super::model::{MultiBodyModel, RigidBody, SimulationState, SpatialInertia};
use super::spatial_algebra::{cross_force, SpatialForce, SpatialMotion};
use bevy::math::Vec3;

/// 单个刚体所需的空间力（惯性力减去外力）
///
/// ```text
/// f = I * cacc + cvel ×* (I * cvel) - f_damping
/// ```
///
/// - `use_gyro == false` 时去掉陀螺力矩 ω × (I_c ω)
/// - 阻尼随速度二次增长: `k * (1 + |v|) * v`
fn body_force(model: &MultiBodyModel, body: &RigidBody, cacc: &SpatialMotion) -> SpatialForce {
    let inertia = SpatialInertia::from_body(body);
    let cvel = body.spatial_velocity;

    let mut f = inertia.mul_motion(cacc);
    f += cross_force(&cvel, &inertia.mul_motion(&cvel));

    let omega = body.angular_velocity;
    let i_c = body.world_inertia();
    if !model.use_gyro {
        f -= SpatialForce::new(omega.cross(i_c * omega), Vec3::ZERO);
    }

    let v = body.velocity;
    let damping_force = -v * body.mass * model.linear_damping * (1.0 + v.length());
    let damping_torque = -(i_c * omega) * model.angular_damping * (1.0 + omega.length());
    f -= SpatialForce::applied_at(body.position, damping_torque, damping_force);

    f
}

/// 计算广义力
///
/// ## 理论背景
///
/// 递归牛顿-欧拉算法（RNE）计算广义力 τ，包括：
/// - 重力
/// - 科里奥利力和离心力
/// - 被动力（刚体阻尼、关节阻尼）
///
/// 运动方程写成 `M * qacc = qfrc`，这里直接返回 `qfrc = -qfrc_bias`。
/// 把世界加速度设为 `-gravity`，重力就自动包含在惯性力中。
///
/// ## 算法流程
///
/// ### 前向传递（计算加速度和力）
/// ```text
/// cacc = cacc_parent + cdof_dot * qvel [+ cdof * qacc]
/// cfrc = I * cacc + cvel ×* (I * cvel) - f_ext
/// ```
///
/// ### 后向传递（累积力）
/// ```text
/// cfrc[parent] += cfrc[child]
/// ```
///
/// ### 投影到关节空间
/// ```text
/// qfrc[i] = -cdof[i] · cfrc[i] - damping * qvel[i]
/// ```
///
/// ## 参数
/// - `model`: 多体模型（需要已计算 cvel, cdof, cdof_dot）
/// - `state`: 当前状态（需要 qvel；`flg_acc` 时还需要 qacc）
/// - `gravity`: 重力加速度
/// - `flg_acc`: 是否包含加速度项（true 时结果为逆动力学残差）
/// - `qfrc_out`: 输出的广义力数组（长度 nv）
pub fn compute_generalized_forces(
    model: &MultiBodyModel,
    state: &SimulationState,
    gravity: Vec3,
    flg_acc: bool,
    qfrc_out: &mut [f32],
) {
    qfrc_out.fill(0.0);

    let base_dofs = model.base_dofs();
    let nbody = model.bodies.len();

    // ===== 1. 基座加速度 =====
    let mut base_cacc = SpatialMotion::new(Vec3::ZERO, -gravity);
    for k in 0..base_dofs {
        base_cacc = base_cacc.add(&model.base_cdof_dot[k].scale(state.qvel[k]));
        if flg_acc {
            base_cacc = base_cacc.add(&model.base_cdof[k].scale(state.qacc[k]));
        }
    }

    // ===== 2. 前向传递：累积加速度，计算力 =====
    let mut cacc = vec![SpatialMotion::ZERO; nbody];
    let mut cfrc_body = vec![SpatialForce::ZERO; nbody];

    for (i, joint) in model.joints.iter().enumerate() {
        let dof = base_dofs + i;
        let parent_cacc = if joint.parent_body >= 0 {
            cacc[joint.parent_body as usize]
        } else {
            base_cacc
        };

        let mut child_cacc = parent_cacc.add(&joint.cdof_dot.scale(state.qvel[dof]));
        if flg_acc {
            child_cacc = child_cacc.add(&joint.cdof.scale(state.qacc[dof]));
        }

        cacc[joint.child_body] = child_cacc;
        cfrc_body[joint.child_body] = body_force(model, &model.bodies[joint.child_body], &child_cacc);
    }
    let mut cfrc_base = body_force(model, &model.base, &base_cacc);

    // ===== 3. 后向传递：累积子体力到父体 =====
    for joint in model.joints.iter().rev() {
        let child_force = cfrc_body[joint.child_body];
        if joint.parent_body >= 0 {
            cfrc_body[joint.parent_body as usize] += child_force;
        } else {
            cfrc_base += child_force;
        }
    }

    // ===== 4. 投影到关节空间 =====
    for (i, joint) in model.joints.iter().enumerate() {
        let dof = base_dofs + i;
        qfrc_out[dof] = -joint.cdof.dot(&cfrc_body[joint.child_body]);
        qfrc_out[dof] -= joint.damping * state.qvel[dof];
    }
    for k in 0..base_dofs {
        qfrc_out[k] = -model.base_cdof[k].dot(&cfrc_base);
    }
}

/// 计算质量矩阵（CRBA）
///
/// ## 算法步骤
///
/// 1. **初始化复合惯性**: crb[i] = 每个body的空间惯性（关于世界原点）
/// 2. **后向递推**: 从叶到根累积子树惯性 crb[parent] += crb[child]
/// 3. **投影**: 对每个dof i 及其每个祖先 j:
///    ```text
///    M[i,j] = M[j,i] = cdof[j] · (crb[i] * cdof[i])
///    ```
///
/// 因为所有惯性都表达在同一参考点，复合惯性可以直接相加。
///
/// ## 参数
/// - `model`: 多体模型（需要先调用 forward_kinematics 和 compute_velocities）
///
/// ## 返回值
/// 完整的质量矩阵 M (nv × nv)
pub fn compute_mass_matrix(model: &MultiBodyModel) -> Vec<Vec<f32>> {
    let nv = model.nv();
    let base_dofs = model.base_dofs();
    let mut mass_matrix = vec![vec![0.0; nv]; nv];

    // ===== 步骤 1: 初始化复合刚体惯性 =====
    let mut crb: Vec<SpatialInertia> = model.bodies.iter().map(SpatialInertia::from_body).collect();
    let mut crb_base = SpatialInertia::from_body(&model.base);

    // ===== 步骤 2: 后向递推 =====
    for joint in model.joints.iter().rev() {
        let child_crb = crb[joint.child_body];
        if joint.parent_body >= 0 {
            crb[joint.parent_body as usize] += child_crb;
        } else {
            crb_base += child_crb;
        }
    }

    // ===== 步骤 3: 连杆自由度 =====
    for (i, joint_i) in model.joints.iter().enumerate() {
        let dof_i = base_dofs + i;
        let f = crb[joint_i.child_body].mul_motion(&joint_i.cdof);

        // 沿祖先链向上（joints[k].child_body == k，所以父体索引就是父关节索引）
        let mut j = i as i32;
        while j >= 0 {
            let joint_j = &model.joints[j as usize];
            let dof_j = base_dofs + j as usize;
            let m_ij = joint_j.cdof.dot(&f);
            mass_matrix[dof_i][dof_j] = m_ij;
            mass_matrix[dof_j][dof_i] = m_ij;
            j = joint_j.parent_body;
        }

        for k in 0..base_dofs {
            let m_ik = model.base_cdof[k].dot(&f);
            mass_matrix[dof_i][k] = m_ik;
            mass_matrix[k][dof_i] = m_ik;
        }

        // 添加电机转子惯量到对角线
        mass_matrix[dof_i][dof_i] += joint_i.armature;
    }

    // ===== 步骤 4: 浮动基座自由度 =====
    for k in 0..base_dofs {
        let f = crb_base.mul_motion(&model.base_cdof[k]);
        for l in 0..base_dofs {
            mass_matrix[l][k] = model.base_cdof[l].dot(&f);
        }
    }

    mass_matrix
}

/// 求解线性系统 M * x = b（列主元高斯消元法）
///
/// ## 参数
/// - `m`: 系数矩阵 (n × n)
/// - `b`: 右端项
///
/// ## 返回值
/// 解向量 x；奇异主元对应的分量为零
fn solve_linear_system(m: &[Vec<f32>], b: &[f32]) -> Vec<f32> {
    let n = b.len();

    // 创建增广矩阵 [M | b]
    let mut aug: Vec<Vec<f32>> = m
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();

    // 前向消元
    for k in 0..n {
        // 找到主元
        let mut max_row = k;
        for i in (k + 1)..n {
            if aug[i][k].abs() > aug[max_row][k].abs() {
                max_row = i;
            }
        }
        if max_row != k {
            aug.swap(k, max_row);
        }

        if aug[k][k].abs() > 1e-10 {
            for i in (k + 1)..n {
                let factor = aug[i][k] / aug[k][k];
                for j in k..=n {
                    aug[i][j] -= factor * aug[k][j];
                }
            }
        }
    }

    // 回代
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = if aug[i][i].abs() > 1e-10 { sum / aug[i][i] } else { 0.0 };
    }

    x
}

/// 计算广义加速度：q̈ = M^(-1) * τ
///
/// 运动学（Kinematic）连杆的关节加速度固定为零，只对动力学自由度求解
/// 约化系统：
/// ```text
/// M_dd * q̈_d = τ_d        (q̈_k = 0)
/// ```
///
/// ## 参数
/// - `model`: 多体模型
/// - `state`: 仿真状态（输入 qfrc，输出 qacc）
pub fn compute_acceleration(model: &MultiBodyModel, state: &mut SimulationState) {
    let mass_matrix = compute_mass_matrix(model);

    let free: Vec<usize> = (0..model.nv()).filter(|&dof| model.is_dynamic_dof(dof)).collect();
    let reduced: Vec<Vec<f32>> = free
        .iter()
        .map(|&r| free.iter().map(|&c| mass_matrix[r][c]).collect())
        .collect();
    let rhs: Vec<f32> = free.iter().map(|&r| state.qfrc[r]).collect();

    let qacc = solve_linear_system(&reduced, &rhs);

    state.qacc.fill(0.0);
    for (k, &dof) in free.iter().enumerate() {
        state.qacc[dof] = qacc[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::{
        geometry::box_inertia,
        kinematics::forward_kinematics,
        model::{HingeJoint, LinkDynamicType},
        velocity::compute_velocities,
    };
    use approx::assert_relative_eq;
    use bevy::math::Mat3;

    const G: Vec3 = Vec3::new(0.0, -9.81, 0.0);
    const HALF: Vec3 = Vec3::new(0.05, 0.37, 0.1);

    /// 沿 -Y 方向悬挂的 n 节连杆链，无阻尼
    fn chain(num_links: usize, fixed_base: bool) -> MultiBodyModel {
        let inertia = Mat3::from_diagonal(box_inertia(HALF, 1.0));
        let mut model = MultiBodyModel::new(RigidBody::new(1.0, inertia), fixed_base);
        model.linear_damping = 0.0;
        model.angular_damping = 0.0;
        for i in 0..num_links {
            let idx = model.add_body(RigidBody::new(1.0, inertia));
            model.add_hinge_joint(HingeJoint {
                parent_body: i as i32 - 1,
                child_body: idx,
                axis: Vec3::X,
                body_offset: Vec3::new(0.0, -2.0 * HALF.y, 0.0),
                joint_offset: Vec3::new(0.0, HALF.y, 0.0),
                ..Default::default()
            });
        }
        model
    }

    fn prepare(model: &mut MultiBodyModel, state: &SimulationState) {
        forward_kinematics(model, state);
        compute_velocities(model, state);
    }

    #[test]
    fn test_gravity_torque_at_rest_is_zero() {
        let mut model = chain(1, true);
        let state = SimulationState::new(model.nq, model.nv());
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);

        // 垂直向下时，重力力矩应该为0
        assert!(qfrc[0].abs() < 1e-5);
    }

    #[test]
    fn test_pendulum_horizontal() {
        let mut model = chain(1, true);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q[0] = std::f32::consts::FRAC_PI_2;
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);
        state.qfrc = qfrc;

        // 质心距枢轴 h，水平时重力矩为 -m·g·h
        let h = HALF.y;
        assert_relative_eq!(state.qfrc[0], -9.81 * h, epsilon = 1e-4);

        // 质量矩阵 = I_xx + m·h²
        let ixx = box_inertia(HALF, 1.0).x;
        let m = compute_mass_matrix(&model);
        assert_relative_eq!(m[0][0], ixx + h * h, epsilon = 1e-5);

        compute_acceleration(&model, &mut state);
        assert_relative_eq!(state.qacc[0], -9.81 * h / (ixx + h * h), epsilon = 1e-3);
    }

    #[test]
    fn test_mass_matrix_symmetric_positive() {
        let mut model = chain(4, false);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q.copy_from_slice(&[0.3, -0.7, 1.1, 0.2]);
        prepare(&mut model, &state);

        let m = compute_mass_matrix(&model);
        for i in 0..model.nv() {
            assert!(m[i][i] > 0.0, "diagonal {i} must be positive");
            for j in 0..model.nv() {
                assert_relative_eq!(m[i][j], m[j][i], epsilon = 1e-5);
            }
        }
        // 基座平动块等于总质量
        assert_relative_eq!(m[0][0], 5.0, epsilon = 1e-5);
        assert_relative_eq!(m[1][1], 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_floating_chain_free_falls() {
        let mut model = chain(3, false);
        let mut state = SimulationState::new(model.nq, model.nv());
        state.base_position = Vec3::new(-0.4, 2.0, 0.0);
        state.q.copy_from_slice(&[0.8, -0.4, 0.3]);
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);
        state.qfrc = qfrc;
        compute_acceleration(&model, &mut state);

        // 静止状态下整体自由落体：基座加速度为 g，关节无相对运动
        assert_relative_eq!(state.qacc[1], -9.81, epsilon = 1e-3);
        assert!(state.qacc[0].abs() < 1e-3);
        for dof in 3..model.nv() {
            assert!(state.qacc[dof].abs() < 1e-3, "dof {dof}: {}", state.qacc[dof]);
        }
    }

    #[test]
    fn test_gyro_term_switch() {
        // 无连杆的浮动基座，惯量各向异性，绕 (1, 1, 0) 旋转
        let angular_acceleration = |use_gyro: bool| {
            let mut model = chain(0, false);
            model.use_gyro = use_gyro;
            let mut state = SimulationState::new(model.nq, model.nv());
            state.qvel[3..6].copy_from_slice(&[1.0, 1.0, 0.0]);
            prepare(&mut model, &state);

            let mut qfrc = vec![0.0; model.nv()];
            compute_generalized_forces(&model, &state, Vec3::ZERO, false, &mut qfrc);
            state.qfrc = qfrc;
            compute_acceleration(&model, &mut state);
            assert!(state.qacc[..3].iter().all(|a| a.abs() < 1e-5));
            Vec3::new(state.qacc[3], state.qacc[4], state.qacc[5])
        };

        assert_relative_eq!(angular_acceleration(false).length(), 0.0, epsilon = 1e-5);

        // 欧拉方程: I ω̇ = -ω × (I ω)，只有 z 分量
        let i = box_inertia(HALF, 1.0);
        let with_gyro = angular_acceleration(true);
        assert_relative_eq!(with_gyro.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(with_gyro.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(with_gyro.z, -(i.y - i.x) / i.z, epsilon = 1e-3);
        assert!(with_gyro.z.abs() > 0.1);
    }

    #[test]
    fn test_inverse_dynamics_residual_vanishes() {
        let mut model = chain(3, false);
        model.use_gyro = true;
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q.copy_from_slice(&[0.5, -0.9, 0.4]);
        state.qvel.copy_from_slice(&[0.1, -0.2, 0.05, 0.3, -0.1, 0.2, 1.5, -2.0, 0.7]);
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);
        state.qfrc = qfrc;
        compute_acceleration(&model, &mut state);

        // RNE 包含 qacc 时，结果应为零：M·q̈ + bias = 0
        let mut residual = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, true, &mut residual);
        for (dof, r) in residual.iter().enumerate() {
            assert!(r.abs() < 1e-2, "dof {dof} residual {r}");
        }
    }

    #[test]
    fn test_kinematic_dof_has_no_acceleration() {
        let mut model = chain(2, true);
        model.joints[0].dynamic_type = LinkDynamicType::Kinematic;
        let mut state = SimulationState::new(model.nq, model.nv());
        state.q.copy_from_slice(&[0.6, 0.6]);
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);
        state.qfrc = qfrc;
        compute_acceleration(&model, &mut state);

        assert_eq!(state.qacc[0], 0.0);
        // 第二节仍在重力下摆回
        assert!(state.qacc[1] < 0.0);
    }

    #[test]
    fn test_damping_opposes_motion() {
        let mut model = chain(1, true);
        model.linear_damping = 0.1;
        model.angular_damping = 0.9;
        let mut state = SimulationState::new(model.nq, model.nv());
        state.qvel[0] = 1.0;
        prepare(&mut model, &state);

        let mut qfrc = vec![0.0; model.nv()];
        compute_generalized_forces(&model, &state, G, false, &mut qfrc);

        assert!(qfrc[0] < 0.0);
    }
}
