//! # 演示程序模块
//!
//! 包含使用多体动力学框架的示例程序

pub mod kinematic_chain;

pub use kinematic_chain::{CameraParams, KinematicMultiBodyDemo};
