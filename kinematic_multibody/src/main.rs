//! # Kinematic Multibody Simulation
//!
//! 多体动力学仿真演示程序
//!
//! 铰链连接的长方体连杆链，前几个关节按正弦轨迹运动学驱动，
//! 其余关节在重力下摆动。每次按 R 重新初始化场景，依次切换约束求解器。
//!
//! 本文件只负责命令行、Bevy渲染和主循环，物理部分见库 crate。

use bevy::prelude::*;
use clap::Parser;
use kinematic_multibody::config::SceneConfig;
use kinematic_multibody::demos::{CameraParams, KinematicMultiBodyDemo};
use kinematic_multibody::error::ConfigError;
use kinematic_multibody::multibody::{ColliderOwner, CollisionShape, ConstraintSolverKind};
use std::path::PathBuf;

/// 每隔多少仿真秒打印一次状态
const REPORT_INTERVAL: f32 = 1.0;

#[derive(Parser, Debug)]
#[command(version, about = "Hinge chain with kinematically driven joints")]
struct Cli {
    /// RON 场景配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 第一次初始化使用的约束求解器
    #[arg(long, value_enum)]
    solver: Option<ConstraintSolverKind>,

    /// 连杆数量
    #[arg(long)]
    links: Option<usize>,

    /// 从浮动基座开始
    #[arg(long)]
    floating_base: bool,
}

impl Cli {
    fn scene_config(&self) -> Result<SceneConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SceneConfig::load(path)?,
            None => SceneConfig::default(),
        };
        if let Some(solver) = self.solver {
            config.solver = solver;
        }
        if let Some(links) = self.links {
            config.num_links = links;
        }
        if self.floating_base {
            config.floating_base = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// 演示场景资源
#[derive(Resource)]
struct Demo {
    scene: KinematicMultiBodyDemo,
    last_report: f32,
}

/// 轨道相机（由键盘修改）
#[derive(Resource)]
struct OrbitCamera(CameraParams);

/// 碰撞体可视化组件
#[derive(Component)]
struct ColliderVisual {
    collider_index: usize,
}

fn main() -> AppExit {
    let cli = Cli::parse();
    let config = match cli.scene_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return AppExit::error();
        }
    };

    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Kinematic MultiBody - Multibody Dynamics Simulation".to_string(),
            resolution: (1280.0, 720.0).into(),
            ..default()
        }),
        ..default()
    }));

    // 日志插件就绪后再建立场景，求解器信息才会输出
    let scene = match KinematicMultiBodyDemo::new(config) {
        Ok(scene) => scene,
        Err(err) => {
            error!("failed to build scene: {err}");
            return AppExit::error();
        }
    };
    let camera = scene.camera();

    app.insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .insert_resource(Demo {
            scene,
            last_report: 0.0,
        })
        .insert_resource(OrbitCamera(camera))
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                reset_scene,
                physics_step,
                update_visuals,
                camera_controller,
                apply_camera,
            )
                .chain(),
        )
        .run()
}

/// 初始化渲染场景
fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    demo: Res<Demo>,
) {
    spawn_collider_visuals(&mut commands, &mut meshes, &mut materials, &demo.scene);

    // 添加光照
    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(3.0, 8.0, 3.0).looking_at(Vec3::ZERO, Dir3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 5000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-3.0, 8.0, -3.0).looking_at(Vec3::ZERO, Dir3::Y),
    ));

    commands.spawn((Camera3d::default(), Transform::default()));

    info!("=== Kinematic MultiBody Simulation Started ===");
    info!("Control:");
    info!("  R: Re-initialize with the next constraint solver");
    info!("  Left/Right: Orbit camera");
    info!("  Up/Down: Zoom in/out");
}

/// 为每个碰撞体生成一个长方体网格
fn spawn_collider_visuals(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    scene: &KinematicMultiBodyDemo,
) {
    let link_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.7, 0.5, 0.3),
        metallic: 0.3,
        perceptual_roughness: 0.5,
        ..default()
    });
    let static_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.35, 0.35, 0.4),
        perceptual_roughness: 0.9,
        ..default()
    });
    let dynamic_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.3, 0.5, 0.8),
        ..default()
    });

    let world = scene.world();
    for (index, collider) in world.colliders().iter().enumerate() {
        let CollisionShape::Box { half_extents } = collider.shape;
        let material = match collider.owner {
            ColliderOwner::MultiBodyLink { .. } => link_material.clone(),
            ColliderOwner::RigidBody(body) => match world.rigid_body(body) {
                Some(body) if body.is_static() => static_material.clone(),
                _ => dynamic_material.clone(),
            },
        };

        commands.spawn((
            Mesh3d(meshes.add(Cuboid::from_size(half_extents * 2.0))),
            MeshMaterial3d(material),
            Transform::from_translation(collider.position).with_rotation(collider.rotation),
            ColliderVisual {
                collider_index: index,
            },
        ));
    }
}

/// R 键：重新初始化场景并复位相机
fn reset_scene(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut demo: ResMut<Demo>,
    mut orbit: ResMut<OrbitCamera>,
    visuals: Query<Entity, With<ColliderVisual>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }

    if let Err(err) = demo.scene.init_physics() {
        error!("failed to re-initialize scene: {err}");
        return;
    }
    demo.scene.reset_camera();
    demo.last_report = 0.0;
    orbit.0 = demo.scene.camera();

    for entity in &visuals {
        commands.entity(entity).despawn();
    }
    spawn_collider_visuals(&mut commands, &mut meshes, &mut materials, &demo.scene);
}

/// 物理仿真步进
fn physics_step(time: Res<Time>, mut demo: ResMut<Demo>) {
    if let Err(err) = demo.scene.step_simulation(time.delta_secs()) {
        error!("simulation step failed: {err}");
        return;
    }

    // 定期打印调试信息
    let sim_time = demo.scene.world().simulation_time();
    if sim_time - demo.last_report >= REPORT_INTERVAL {
        demo.last_report = sim_time;
        if let Ok(chain) = demo.scene.chain() {
            let q0 = chain.joint_pos(0).unwrap_or_default();
            info!(
                "Time: {:.2}s | {} | {} base | q[0]: {:.3} rad ({:.1}°) | COM: {:.3}",
                sim_time,
                demo.scene.solver(),
                if demo.scene.floating_base() { "floating" } else { "fixed" },
                q0,
                q0.to_degrees(),
                chain.center_of_mass()
            );
            if demo.scene.floating_base() {
                let (linear, angular) = chain.base_velocity();
                info!(
                    "  base pos: {:.3} | v: {:.3} | ω: {:.3}",
                    chain.base_pos(),
                    linear,
                    angular
                );
            }
        }
    }
}

/// 从碰撞体同步可视化位姿
fn update_visuals(demo: Res<Demo>, mut query: Query<(&mut Transform, &ColliderVisual)>) {
    let colliders = demo.scene.world().colliders();
    for (mut transform, visual) in query.iter_mut() {
        if let Some(collider) = colliders.get(visual.collider_index) {
            transform.translation = collider.position;
            transform.rotation = collider.rotation;
        }
    }
}

/// 相机控制器
fn camera_controller(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut orbit: ResMut<OrbitCamera>,
) {
    let mut yaw_delta: f32 = 0.0;
    let mut zoom_delta: f32 = 0.0;

    if keyboard.pressed(KeyCode::ArrowLeft) {
        yaw_delta -= 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowRight) {
        yaw_delta += 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowUp) {
        zoom_delta -= 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowDown) {
        zoom_delta += 1.0;
    }

    let dt = time.delta_secs();
    orbit.0.yaw += yaw_delta * 60.0 * dt;
    orbit.0.distance = (orbit.0.distance + zoom_delta * 2.0 * dt).max(0.1);
}

/// 由偏航/俯仰/距离计算相机位姿（Y 轴向上）
fn apply_camera(orbit: Res<OrbitCamera>, mut query: Query<&mut Transform, With<Camera3d>>) {
    let CameraParams {
        distance,
        pitch,
        yaw,
        target,
    } = orbit.0;
    let (pitch, yaw) = (pitch.to_radians(), yaw.to_radians());
    let offset = Vec3::new(pitch.cos() * yaw.sin(), -pitch.sin(), pitch.cos() * yaw.cos()) * distance;

    for mut transform in query.iter_mut() {
        *transform = Transform::from_translation(target + offset).looking_at(target, Dir3::Y);
    }
}
