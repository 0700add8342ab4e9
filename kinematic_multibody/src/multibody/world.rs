//! # 多体动力学世界
//!
//! 持有多体、独立刚体和碰撞体，按固定子步推进仿真。
//!
//! ## 时间步
//!
//! [`MultiBodyWorld::step_simulation`] 把帧时间累加到内部时钟，
//! 每满一个 `fixed_time_step` 就执行一个子步，最多 `max_sub_steps` 个，
//! 余下的时间留到下一帧。`max_sub_steps == 0` 时直接用帧时间走一步。

use super::articulation::MultiBody;
use super::collision::{filter, Collider, ColliderOwner};
use super::integrator::Integrator;
use super::model::LinkDynamicType;
use super::rigid_body::FreeRigidBody;
use super::solver::{ConstraintSolverKind, SolverInfo};
use crate::error::MultiBodyError;
use bevy::log::{debug, trace};
use bevy::math::Vec3;

/// 低于该帧时间时不推进
const MIN_TIME_STEP: f32 = f32::EPSILON;

pub struct MultiBodyWorld {
    gravity: Vec3,
    solver_info: SolverInfo,
    integrator: Integrator,
    multibodies: Vec<MultiBody>,
    rigid_bodies: Vec<FreeRigidBody>,
    colliders: Vec<Collider>,
    local_time: f32,
    simulation_time: f32,
}

impl MultiBodyWorld {
    pub fn new(solver: ConstraintSolverKind) -> Self {
        Self {
            gravity: Vec3::new(0.0, -10.0, 0.0),
            solver_info: SolverInfo::new(solver),
            integrator: Integrator::default(),
            multibodies: Vec::new(),
            rigid_bodies: Vec::new(),
            colliders: Vec::new(),
            local_time: 0.0,
            simulation_time: 0.0,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn solver_info(&self) -> &SolverInfo {
        &self.solver_info
    }

    pub fn solver_info_mut(&mut self) -> &mut SolverInfo {
        &mut self.solver_info
    }

    pub fn set_integrator(&mut self, integrator: Integrator) {
        self.integrator = integrator;
    }

    /// 已执行子步的累计仿真时间
    pub fn simulation_time(&self) -> f32 {
        self.simulation_time
    }

    /// 加入多体；必须先 [`MultiBody::finalize`]
    pub fn add_multi_body(&mut self, multibody: MultiBody) -> Result<usize, MultiBodyError> {
        if !multibody.is_finalized() {
            return Err(MultiBodyError::NotFinalized);
        }
        self.multibodies.push(multibody);
        Ok(self.multibodies.len() - 1)
    }

    pub fn multi_body(&self, index: usize) -> Result<&MultiBody, MultiBodyError> {
        self.multibodies.get(index).ok_or(MultiBodyError::UnknownMultiBody(index))
    }

    pub fn multi_body_mut(&mut self, index: usize) -> Result<&mut MultiBody, MultiBodyError> {
        self.multibodies.get_mut(index).ok_or(MultiBodyError::UnknownMultiBody(index))
    }

    /// 以默认过滤加入刚体：动态体属于默认组并与所有组碰撞，
    /// 静态体属于静态组且不与其它静态体碰撞
    pub fn add_rigid_body(&mut self, body: FreeRigidBody) -> usize {
        let (group, mask) = if body.is_static() {
            (filter::STATIC, filter::ALL ^ filter::STATIC)
        } else {
            (filter::DEFAULT, filter::ALL)
        };
        self.add_rigid_body_filtered(body, group, mask)
    }

    /// 以指定组/掩码加入刚体，同时生成其碰撞体
    pub fn add_rigid_body_filtered(&mut self, body: FreeRigidBody, group: i32, mask: i32) -> usize {
        let index = self.rigid_bodies.len();
        let mut collider = Collider::new(ColliderOwner::RigidBody(index), body.shape)
            .with_filter(group, mask)
            .with_friction(body.friction);
        collider.static_object = body.is_static();
        collider.position = body.position;
        collider.rotation = body.orientation;
        self.rigid_bodies.push(body);
        self.colliders.push(collider);
        index
    }

    pub fn rigid_bodies(&self) -> &[FreeRigidBody] {
        &self.rigid_bodies
    }

    pub fn rigid_body(&self, index: usize) -> Option<&FreeRigidBody> {
        self.rigid_bodies.get(index)
    }

    /// 加入多体连杆的碰撞体，位姿立即与连杆同步
    pub fn add_collision_object(&mut self, mut collider: Collider) -> Result<usize, MultiBodyError> {
        if let ColliderOwner::MultiBodyLink { multibody, link } = collider.owner {
            let body = self.multi_body(multibody)?;
            let (position, rotation) = body.link_transform(link)?;
            collider.position = position;
            collider.rotation = rotation;
            collider.kinematic = is_kinematic_link(body, link);
        }
        self.colliders.push(collider);
        Ok(self.colliders.len() - 1)
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// 设置连杆的动态类型，并同步其碰撞体的运动学标记
    pub fn set_link_dynamic_type(
        &mut self,
        multibody: usize,
        link: usize,
        dynamic_type: LinkDynamicType,
    ) -> Result<(), MultiBodyError> {
        self.multi_body_mut(multibody)?.set_link_dynamic_type(link, dynamic_type)?;
        let owner = ColliderOwner::MultiBodyLink {
            multibody,
            link: link as i32,
        };
        for collider in self.colliders.iter_mut().filter(|c| c.owner == owner) {
            collider.kinematic = dynamic_type == LinkDynamicType::Kinematic;
        }
        Ok(())
    }

    /// 两个碰撞体是否允许产生接触
    ///
    /// 组/掩码双向匹配；静态或运动学物体之间没有接触；
    /// 同一多体内需开启自碰撞，且相邻的父子连杆永不碰撞。
    pub fn needs_collision(&self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let (Some(ca), Some(cb)) = (self.colliders.get(a), self.colliders.get(b)) else {
            return false;
        };
        if !ca.filter_accepts(cb) {
            return false;
        }
        if ca.is_static_or_kinematic() && cb.is_static_or_kinematic() {
            return false;
        }

        match (ca.owner, cb.owner) {
            (
                ColliderOwner::MultiBodyLink { multibody: ma, link: la },
                ColliderOwner::MultiBodyLink { multibody: mb, link: lb },
            ) if ma == mb => {
                let Ok(body) = self.multi_body(ma) else {
                    return false;
                };
                if !body.has_self_collision() || la == lb {
                    return false;
                }
                let parent_of = |link: i32| {
                    if link < 0 {
                        None
                    } else {
                        body.parent(link as usize).ok()
                    }
                };
                parent_of(la) != Some(lb) && parent_of(lb) != Some(la)
            }
            _ => true,
        }
    }

    /// 所有允许产生接触的碰撞体对 `(a, b)`，`a < b`
    pub fn collision_pairs(&self) -> Vec<(usize, usize)> {
        let n = self.colliders.len();
        (0..n)
            .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
            .filter(|&(a, b)| self.needs_collision(a, b))
            .collect()
    }

    /// 按帧时间推进，返回实际执行的子步数
    pub fn step_simulation(&mut self, time_step: f32, max_sub_steps: usize, fixed_time_step: f32) -> usize {
        let (num_steps, step_size, max_steps) = if max_sub_steps > 0 {
            self.local_time += time_step;
            let mut n = 0;
            if self.local_time >= fixed_time_step {
                n = (self.local_time / fixed_time_step) as usize;
                self.local_time -= n as f32 * fixed_time_step;
            }
            (n, fixed_time_step, max_sub_steps)
        } else {
            self.local_time = time_step;
            if time_step < MIN_TIME_STEP {
                (0, time_step, 0)
            } else {
                (1, time_step, 1)
            }
        };

        let clamped = num_steps.min(max_steps);
        if clamped < num_steps {
            trace!("dropping {} sub-steps beyond max_sub_steps", num_steps - clamped);
        }
        for _ in 0..clamped {
            self.internal_single_step(step_size);
        }
        clamped
    }

    fn internal_single_step(&mut self, dt: f32) {
        for multibody in &mut self.multibodies {
            multibody.step(self.integrator, self.gravity, dt);
        }
        for body in &mut self.rigid_bodies {
            body.integrate(self.gravity, dt);
        }
        self.sync_colliders();
        self.simulation_time += dt;
    }

    /// 把碰撞体位姿同步到其所属的刚体/连杆
    fn sync_colliders(&mut self) {
        for collider in &mut self.colliders {
            match collider.owner {
                ColliderOwner::RigidBody(index) => {
                    if let Some(body) = self.rigid_bodies.get(index) {
                        collider.position = body.position;
                        collider.rotation = body.orientation;
                    }
                }
                ColliderOwner::MultiBodyLink { multibody, link } => {
                    let Some(body) = self.multibodies.get(multibody) else {
                        debug!("collider owner {:?} no longer exists", collider.owner);
                        continue;
                    };
                    match body.link_transform(link) {
                        Ok((position, rotation)) => {
                            collider.position = position;
                            collider.rotation = rotation;
                            collider.kinematic = is_kinematic_link(body, link);
                        }
                        Err(err) => debug!("collider owner {:?}: {}", collider.owner, err),
                    }
                }
            }
        }
    }
}

/// 基座（-1）不是运动学连杆
fn is_kinematic_link(body: &MultiBody, link: i32) -> bool {
    link >= 0 && body.link_dynamic_type(link as usize) == Ok(LinkDynamicType::Kinematic)
}
