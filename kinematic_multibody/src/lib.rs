//! # Kinematic Multibody
//!
//! 基于广义坐标的多体动力学框架，以及一个运动学驱动的铰链链演示场景。
//!
//! - `multibody`: 通用的多体动力学框架（连杆、世界、碰撞体）
//! - `demos`: 示例场景（kinematic_chain）
//! - `config`: RON 场景配置
//! - `error`: 错误类型

pub mod config;
pub mod demos;
pub mod error;
pub mod multibody;
