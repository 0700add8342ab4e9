//! # 多体对象
//!
//! 在 [`MultiBodyModel`] + [`SimulationState`] 之上提供逐连杆构建、
//! 关节读写和睡眠管理的接口。

use super::integrator::{integrate, update_kinematics, Integrator};
use super::subtree_com::total_center_of_mass;
use super::model::{
    HingeJoint, LinkDynamicType, MultiBodyModel, RigidBody, SimulationState, FLOATING_BASE_DOFS,
};
use crate::error::MultiBodyError;
use bevy::log::debug;
use bevy::math::{Mat3, Quat, Vec3};

/// 广义速度平方和低于该值视为静止
const SLEEP_EPSILON: f32 = 0.05;
/// 持续静止多久后进入睡眠 (s)
const SLEEP_TIMEOUT: f32 = 2.0;

/// 由铰链连接的多体（树形连杆 + 固定或浮动基座）
#[derive(Debug, Clone)]
pub struct MultiBody {
    pub model: MultiBodyModel,
    pub state: SimulationState,
    num_links: usize,
    link_set_up: Vec<bool>,
    finalized: bool,
    can_sleep: bool,
    awake: bool,
    sleep_timer: f32,
    self_collision: bool,
}

impl MultiBody {
    /// 创建多体，预留 `num_links` 个连杆
    ///
    /// 连杆需要逐个通过 [`MultiBody::setup_revolute`] 定义，然后调用
    /// [`MultiBody::finalize`]。
    pub fn new(num_links: usize, base_mass: f32, base_inertia: Vec3, fixed_base: bool, can_sleep: bool) -> Self {
        let base = RigidBody::new(base_mass, Mat3::from_diagonal(base_inertia));
        let mut model = MultiBodyModel::new(base, fixed_base);
        for i in 0..num_links {
            model.add_body(RigidBody::new(0.0, Mat3::ZERO));
            model.add_hinge_joint(HingeJoint {
                child_body: i,
                ..Default::default()
            });
        }
        let state = SimulationState::new(model.nq, model.nv());

        Self {
            model,
            state,
            num_links,
            link_set_up: vec![false; num_links],
            finalized: false,
            can_sleep,
            awake: true,
            sleep_timer: 0.0,
            self_collision: false,
        }
    }

    fn check_link(&self, index: usize) -> Result<(), MultiBodyError> {
        if index < self.num_links {
            Ok(())
        } else {
            Err(MultiBodyError::LinkOutOfRange {
                index,
                num_links: self.num_links,
            })
        }
    }

    /// 定义一个铰链连杆
    ///
    /// ## 参数
    /// - `index`: 连杆索引
    /// - `mass`, `inertia`: 质量和主惯量对角
    /// - `parent`: 父连杆索引，-1 表示基座；必须小于 `index`
    /// - `joint_axis`: 关节轴（零位时父体与子体坐标系重合）
    /// - `parent_com_to_pivot`: 父体质心到枢轴的偏移（父体坐标系）
    /// - `pivot_to_com`: 枢轴到本连杆质心的偏移（本连杆坐标系）
    #[allow(clippy::too_many_arguments)]
    pub fn setup_revolute(
        &mut self,
        index: usize,
        mass: f32,
        inertia: Vec3,
        parent: i32,
        joint_axis: Vec3,
        parent_com_to_pivot: Vec3,
        pivot_to_com: Vec3,
    ) -> Result<(), MultiBodyError> {
        self.check_link(index)?;
        if parent < -1 || parent >= index as i32 {
            return Err(MultiBodyError::InvalidParent { link: index, parent });
        }

        self.model.bodies[index] = RigidBody::new(mass, Mat3::from_diagonal(inertia));
        let joint = &mut self.model.joints[index];
        joint.parent_body = parent;
        joint.axis = joint_axis.normalize();
        joint.body_offset = parent_com_to_pivot + pivot_to_com;
        joint.joint_offset = -pivot_to_com;
        self.link_set_up[index] = true;
        Ok(())
    }

    /// 检查所有连杆已定义并计算初始位姿
    pub fn finalize(&mut self) -> Result<(), MultiBodyError> {
        if let Some(missing) = self.link_set_up.iter().position(|set| !set) {
            return Err(MultiBodyError::LinkNotSetUp(missing));
        }
        self.finalized = true;
        update_kinematics(&mut self.model, &self.state);
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn num_links(&self) -> usize {
        self.num_links
    }

    pub fn has_fixed_base(&self) -> bool {
        self.model.fixed_base
    }

    /// 父连杆索引（-1 为基座）
    pub fn parent(&self, index: usize) -> Result<i32, MultiBodyError> {
        self.check_link(index)?;
        Ok(self.model.joints[index].parent_body)
    }

    pub fn set_base_pos(&mut self, position: Vec3) {
        self.state.base_position = position;
        update_kinematics(&mut self.model, &self.state);
    }

    pub fn base_pos(&self) -> Vec3 {
        self.state.base_position
    }

    pub fn set_base_orientation(&mut self, orientation: Quat) {
        self.state.base_orientation = orientation.normalize();
        update_kinematics(&mut self.model, &self.state);
    }

    pub fn base_orientation(&self) -> Quat {
        self.state.base_orientation
    }

    pub fn joint_pos(&self, index: usize) -> Result<f32, MultiBodyError> {
        self.check_link(index)?;
        Ok(self.state.q[index])
    }

    pub fn joint_vel(&self, index: usize) -> Result<f32, MultiBodyError> {
        self.check_link(index)?;
        Ok(self.state.qvel[self.model.base_dofs() + index])
    }

    /// 直接设置关节角度，并刷新连杆位姿
    pub fn set_joint_pos(&mut self, index: usize, position: f32) -> Result<(), MultiBodyError> {
        self.check_link(index)?;
        self.state.q[index] = position;
        update_kinematics(&mut self.model, &self.state);
        Ok(())
    }

    /// 直接设置关节速度；非零速度会唤醒多体
    pub fn set_joint_vel(&mut self, index: usize, velocity: f32) -> Result<(), MultiBodyError> {
        self.check_link(index)?;
        let dof = self.model.base_dofs() + index;
        self.state.qvel[dof] = velocity;
        if velocity != 0.0 {
            self.wake_up();
        }
        update_kinematics(&mut self.model, &self.state);
        Ok(())
    }

    pub fn link_dynamic_type(&self, index: usize) -> Result<LinkDynamicType, MultiBodyError> {
        self.check_link(index)?;
        Ok(self.model.joints[index].dynamic_type)
    }

    pub fn set_link_dynamic_type(&mut self, index: usize, dynamic_type: LinkDynamicType) -> Result<(), MultiBodyError> {
        self.check_link(index)?;
        self.model.joints[index].dynamic_type = dynamic_type;
        Ok(())
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.model.linear_damping = damping;
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.model.angular_damping = damping;
    }

    pub fn set_use_gyro_term(&mut self, use_gyro: bool) {
        self.model.use_gyro = use_gyro;
    }

    pub fn set_can_sleep(&mut self, can_sleep: bool) {
        self.can_sleep = can_sleep;
        if !can_sleep {
            self.wake_up();
        }
    }

    pub fn set_has_self_collision(&mut self, self_collision: bool) {
        self.self_collision = self_collision;
    }

    pub fn has_self_collision(&self) -> bool {
        self.self_collision
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn wake_up(&mut self) {
        self.awake = true;
        self.sleep_timer = 0.0;
    }

    /// 连杆（-1 为基座）的世界位姿
    pub fn link_transform(&self, link: i32) -> Result<(Vec3, Quat), MultiBodyError> {
        let body = if link < 0 {
            &self.model.base
        } else {
            self.check_link(link as usize)?;
            &self.model.bodies[link as usize]
        };
        Ok((body.position, body.orientation))
    }

    /// 推进一个固定时间步；睡眠中的多体不动
    pub fn step(&mut self, integrator: Integrator, gravity: Vec3, dt: f32) {
        if !self.awake {
            return;
        }
        integrate(integrator, &mut self.model, &mut self.state, gravity, dt);
        self.check_motion_and_sleep(dt);
    }

    /// 广义速度持续低于阈值 [`SLEEP_TIMEOUT`] 秒后进入睡眠
    fn check_motion_and_sleep(&mut self, dt: f32) {
        if !self.can_sleep {
            self.sleep_timer = 0.0;
            return;
        }

        let motion: f32 = self.state.qvel.iter().map(|v| v * v).sum();
        if motion < SLEEP_EPSILON {
            self.sleep_timer += dt;
            if self.sleep_timer > SLEEP_TIMEOUT {
                debug!("multibody going to sleep after {:.2}s at rest", self.sleep_timer);
                self.awake = false;
                self.state.qvel.fill(0.0);
                self.state.qacc.fill(0.0);
                update_kinematics(&mut self.model, &self.state);
            }
        } else {
            self.sleep_timer = 0.0;
        }
    }

    /// 整体质心（基座 + 连杆）
    pub fn center_of_mass(&self) -> Vec3 {
        total_center_of_mass(&self.model)
    }

    /// 基座线速度和角速度（固定基座为零）
    pub fn base_velocity(&self) -> (Vec3, Vec3) {
        if self.model.base_dofs() == FLOATING_BASE_DOFS {
            let v = &self.state.qvel;
            (Vec3::new(v[0], v[1], v[2]), Vec3::new(v[3], v[4], v[5]))
        } else {
            (Vec3::ZERO, Vec3::ZERO)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::geometry::box_inertia;
    use approx::assert_relative_eq;

    const G: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    fn two_link(fixed: bool, can_sleep: bool) -> MultiBody {
        let half = Vec3::new(0.05, 0.37, 0.1);
        let inertia = box_inertia(half, 1.0);
        let mut mb = MultiBody::new(2, 1.0, inertia, fixed, can_sleep);
        for i in 0..2 {
            mb.setup_revolute(
                i,
                1.0,
                inertia,
                i as i32 - 1,
                Vec3::X,
                Vec3::new(0.0, -half.y, 0.0),
                Vec3::new(0.0, -half.y, 0.0),
            )
            .unwrap();
        }
        mb.finalize().unwrap();
        mb
    }

    #[test]
    fn test_setup_revolute_offsets() {
        let mut mb = two_link(true, false);
        mb.set_base_pos(Vec3::new(-0.4, 2.0, 0.0));

        let (p0, _) = mb.link_transform(0).unwrap();
        let (p1, _) = mb.link_transform(1).unwrap();
        assert_relative_eq!(p0.y, 2.0 - 0.74, epsilon = 1e-5);
        assert_relative_eq!(p1.y, 2.0 - 1.48, epsilon = 1e-5);
        assert_eq!(mb.parent(1), Ok(0));
    }

    #[test]
    fn test_invalid_indices_are_rejected() {
        let mut mb = MultiBody::new(2, 1.0, Vec3::ONE, true, false);
        assert_eq!(
            mb.setup_revolute(1, 1.0, Vec3::ONE, 1, Vec3::X, Vec3::ZERO, Vec3::ZERO),
            Err(MultiBodyError::InvalidParent { link: 1, parent: 1 })
        );
        assert_eq!(mb.finalize(), Err(MultiBodyError::LinkNotSetUp(0)));
        assert_eq!(
            mb.set_joint_pos(5, 0.0),
            Err(MultiBodyError::LinkOutOfRange { index: 5, num_links: 2 })
        );
    }

    #[test]
    fn test_joint_setters() {
        let mut mb = two_link(false, false);
        mb.set_joint_pos(1, 0.25).unwrap();
        mb.set_joint_vel(1, -1.5).unwrap();

        assert_eq!(mb.joint_pos(1), Ok(0.25));
        assert_eq!(mb.joint_vel(1), Ok(-1.5));
        // 浮动基座的 6 个自由度排在前面
        assert_eq!(mb.state.qvel[FLOATING_BASE_DOFS + 1], -1.5);
    }

    #[test]
    fn test_floating_base_falls_freely() {
        let mut fixed = two_link(true, false);
        assert_eq!(fixed.base_velocity(), (Vec3::ZERO, Vec3::ZERO));

        let mut mb = two_link(false, false);
        mb.set_base_pos(Vec3::new(0.0, 2.0, 0.0));
        mb.set_linear_damping(0.0);
        mb.set_angular_damping(0.0);
        for _ in 0..240 {
            mb.step(Integrator::SemiImplicitEuler, G, 1.0 / 240.0);
            fixed.step(Integrator::SemiImplicitEuler, G, 1.0 / 240.0);
        }

        // 竖直悬挂的整条链整体自由落体 1 秒
        let (linear, angular) = mb.base_velocity();
        assert_relative_eq!(linear.y, -9.81, epsilon = 1e-2);
        assert_relative_eq!(angular.length(), 0.0, epsilon = 1e-3);
        assert!(mb.base_pos().y < 2.0 - 4.0);
        assert_eq!(fixed.base_pos(), Vec3::ZERO);
    }

    #[test]
    fn test_multibody_falls_asleep_at_rest() {
        let mut mb = two_link(true, true);

        // 竖直悬挂：没有运动，2 秒后进入睡眠
        for _ in 0..(3 * 240) {
            mb.step(Integrator::SemiImplicitEuler, G, 1.0 / 240.0);
        }
        assert!(!mb.is_awake());

        mb.set_joint_vel(0, 1.0).unwrap();
        assert!(mb.is_awake());
    }

    #[test]
    fn test_cannot_sleep_by_default() {
        let mut mb = two_link(true, false);
        for _ in 0..(3 * 240) {
            mb.step(Integrator::SemiImplicitEuler, G, 1.0 / 240.0);
        }
        assert!(mb.is_awake());
    }
}
