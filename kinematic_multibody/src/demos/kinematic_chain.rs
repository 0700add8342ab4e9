//! # Kinematic Chain Demo
//!
//! 铰链连接的长方体连杆链，前 `num_links - 2` 个关节按正弦轨迹运动学驱动，
//! 其余关节在重力下自由摆动。
//!
//! ## 场景
//!
//! - **多体**: 5 个 0.1 x 0.74 x 0.2 m 的连杆，1 kg，全部绕 X 轴铰接，
//!   基座在 (-0.4, 2, 0)，Y 轴向上
//! - **碰撞体**: 基座和每个连杆各一个长方体，组 2，掩码 1 + 2
//! - **地面**: 静态长方体，顶面在 y = -1.55
//! - **箱子**: 1 kg 的动态立方体，位于原点
//!
//! ## 求解器循环
//!
//! 每次（重新）初始化依次使用 SI、MLCP + PGS、MLCP + Dantzig、MLCP + Lemke；
//! 四种都用过之后回到 SI 并切换固定/浮动基座。

use crate::config::SceneConfig;
use crate::error::MultiBodyError;
use crate::multibody::{
    box_inertia, Collider, ColliderOwner, CollisionShape, ConstraintSolverKind, FreeRigidBody,
    LinkDynamicType, MultiBody, MultiBodyWorld,
};
use bevy::log::{debug, info};
use bevy::math::{Quat, Vec3};

/// 连杆碰撞体所属的组
pub const LINK_COLLISION_GROUP: i32 = 2;
/// 连杆和地面都与组 1、组 2 碰撞
pub const SCENE_COLLISION_MASK: i32 = 1 + 2;
/// 地面所属的组
pub const GROUND_COLLISION_GROUP: i32 = 1;

/// 轨道相机参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub distance: f32,
    /// 俯仰角 (°)
    pub pitch: f32,
    /// 偏航角 (°)
    pub yaw: f32,
    pub target: Vec3,
}

impl CameraParams {
    /// 复位视角
    pub const RESET: Self = Self {
        distance: 1.0,
        pitch: -35.0,
        yaw: 50.0,
        target: Vec3::new(-3.0, 2.8, -2.5),
    };
}

/// 求解器循环：SI → PGS → Dantzig → Lemke → (切换基座) SI → ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverCycle {
    counter: usize,
    floating_base: bool,
}

impl SolverCycle {
    pub fn new(first: ConstraintSolverKind, floating_base: bool) -> Self {
        Self {
            counter: first.index(),
            floating_base,
        }
    }

    /// 取下一个求解器和对应的基座类型
    pub fn advance(&mut self) -> (ConstraintSolverKind, bool) {
        if self.counter == ConstraintSolverKind::COUNT {
            self.counter = 0;
            self.floating_base = !self.floating_base;
        }
        let solver = ConstraintSolverKind::from_index(self.counter);
        self.counter += 1;
        (solver, self.floating_base)
    }
}

/// 创建连杆链
///
/// 所有连杆质量相同、绕 X 轴铰接，连杆 `i` 的父连杆是 `i - 1`。
/// 父质心到枢轴和枢轴到子质心的偏移都是 `(0, -h_y, 0)`，
/// 因此零位时链条沿 -Y 竖直下垂。基座使用与连杆相同的质量和惯量。
pub fn create_multi_body(
    num_links: usize,
    base_position: Vec3,
    half_extents: Vec3,
    link_mass: f32,
    floating: bool,
) -> Result<MultiBody, MultiBodyError> {
    let inertia = box_inertia(half_extents, link_mass);
    let mut multibody = MultiBody::new(num_links, link_mass, inertia, !floating, false);
    multibody.set_base_pos(base_position);
    multibody.set_base_orientation(Quat::IDENTITY);

    let hinge_axis = Vec3::X;
    let parent_com_to_current_com = Vec3::new(0.0, -half_extents.y * 2.0, 0.0);
    let pivot_to_com = Vec3::new(0.0, -half_extents.y, 0.0);
    let parent_com_to_pivot = parent_com_to_current_com - pivot_to_com;

    for i in 0..num_links {
        multibody.setup_revolute(
            i,
            link_mass,
            inertia,
            i as i32 - 1,
            hinge_axis,
            parent_com_to_pivot,
            pivot_to_com,
        )?;
    }
    multibody.finalize()?;
    Ok(multibody)
}

/// 为基座和每个连杆加一个长方体碰撞体
pub fn add_colliders(
    world: &mut MultiBodyWorld,
    multibody: usize,
    half_extents: Vec3,
    friction: f32,
) -> Result<(), MultiBodyError> {
    let num_links = world.multi_body(multibody)?.num_links();
    for link in -1..num_links as i32 {
        let collider = Collider::new(
            ColliderOwner::MultiBodyLink { multibody, link },
            CollisionShape::cuboid(half_extents),
        )
        .with_filter(LINK_COLLISION_GROUP, SCENE_COLLISION_MASK)
        .with_friction(friction);
        world.add_collision_object(collider)?;
    }
    Ok(())
}

/// 演示场景：世界、连杆链和运动学驱动
pub struct KinematicMultiBodyDemo {
    config: SceneConfig,
    cycle: SolverCycle,
    world: MultiBodyWorld,
    chain: usize,
    solver: ConstraintSolverKind,
    floating_base: bool,
    /// 运动学轨迹的时钟，重新初始化时不清零
    time: f32,
    camera: CameraParams,
    first_init: bool,
}

impl KinematicMultiBodyDemo {
    pub fn new(config: SceneConfig) -> Result<Self, MultiBodyError> {
        let cycle = SolverCycle::new(config.solver, config.floating_base);
        let mut demo = Self {
            world: MultiBodyWorld::new(config.solver),
            chain: 0,
            solver: config.solver,
            floating_base: config.floating_base,
            time: 0.0,
            camera: CameraParams::RESET,
            first_init: true,
            cycle,
            config,
        };
        demo.init_physics()?;
        Ok(demo)
    }

    /// 重新建立世界，使用循环中的下一个求解器
    pub fn init_physics(&mut self) -> Result<(), MultiBodyError> {
        if self.first_init {
            self.camera.distance = 10.0 * self.config.scaling;
            self.camera.pitch = 50.0;
            self.first_init = false;
        }

        let (solver, floating_base) = self.cycle.advance();
        let config = &self.config;
        let mut world = MultiBodyWorld::new(solver);
        info!("Constraint Solver: {}", world.solver_info().solver);
        if let Some(backend) = solver.mlcp_backend() {
            debug!("MLCP backend: {:?}", backend);
        }
        world.set_gravity(config.gravity());
        world.solver_info_mut().global_cfm = config.global_cfm;
        world.set_integrator(config.integrator);

        let half_extents = config.link_half_extents();
        let mut multibody = create_multi_body(
            config.num_links,
            config.base_position(),
            half_extents,
            config.link_mass,
            floating_base,
        )?;
        multibody.set_can_sleep(config.can_sleep);
        multibody.set_has_self_collision(config.self_collision);
        multibody.set_use_gyro_term(config.use_gyro);
        let (linear_damping, angular_damping) = config.effective_damping();
        multibody.set_linear_damping(linear_damping);
        multibody.set_angular_damping(angular_damping);
        if config.num_links > 0 {
            multibody.set_joint_pos(0, config.initial_joint_angle_deg.to_radians())?;
        }

        let chain = world.add_multi_body(multibody)?;
        add_colliders(&mut world, chain, half_extents, config.friction)?;

        if !config.multibody_only {
            let ground = FreeRigidBody::new(
                0.0,
                CollisionShape::cuboid(config.ground_half_extents()),
                Vec3::new(0.0, config.ground_height, 0.0),
            );
            world.add_rigid_body_filtered(ground, GROUND_COLLISION_GROUP, SCENE_COLLISION_MASK);

            let dynamic_box = FreeRigidBody::new(
                config.box_mass,
                CollisionShape::cuboid(config.box_half_extents()),
                config.box_position(),
            );
            world.add_rigid_body(dynamic_box);
        }

        debug!(
            "scene: {} links, {} base, {} colliders, {} collision pairs",
            config.num_links,
            if floating_base { "floating" } else { "fixed" },
            world.colliders().len(),
            world.collision_pairs().len()
        );

        self.world = world;
        self.chain = chain;
        self.solver = solver;
        self.floating_base = floating_base;
        Ok(())
    }

    pub fn reset_camera(&mut self) {
        self.camera = CameraParams::RESET;
    }

    /// 推进运动学轨迹：前 `num_links - 2` 个关节设为运动学，
    /// 位置取轨迹值，速度取与上一位置的差分
    pub fn animate(&mut self, delta_time: f32) -> Result<(), MultiBodyError> {
        self.time += delta_time;
        let target = self.config.animation.target(self.time);

        let num_kinematic = self.chain()?.num_links().saturating_sub(2);
        for link in 0..num_kinematic {
            let old_position = self.chain()?.joint_pos(link)?;
            let velocity = (target - old_position) / delta_time;
            self.world
                .set_link_dynamic_type(self.chain, link, LinkDynamicType::Kinematic)?;
            let multibody = self.world.multi_body_mut(self.chain)?;
            multibody.set_joint_pos(link, target)?;
            multibody.set_joint_vel(link, velocity)?;
        }
        Ok(())
    }

    /// 先按内部步长驱动运动学关节，再让世界推进至多一个内部步
    pub fn step_simulation(&mut self, delta_time: f32) -> Result<usize, MultiBodyError> {
        let internal_time_step = self.config.internal_time_step;
        self.animate(internal_time_step)?;
        Ok(self.world.step_simulation(delta_time, 1, internal_time_step))
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn world(&self) -> &MultiBodyWorld {
        &self.world
    }

    pub fn chain(&self) -> Result<&MultiBody, MultiBodyError> {
        self.world.multi_body(self.chain)
    }

    pub fn solver(&self) -> ConstraintSolverKind {
        self.solver
    }

    pub fn floating_base(&self) -> bool {
        self.floating_base
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn camera(&self) -> CameraParams {
        self.camera
    }
}
