//! # 错误类型
//!
//! 配置加载和多体操作的错误定义

use std::path::PathBuf;
use thiserror::Error;

/// 场景配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("failed to read config {path}: {source}")]
    Io {
        /// 配置文件路径
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// RON 解析失败
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// 参数取值非法（负质量、零尺寸等）
    #[error("invalid config value `{field}`: {reason}")]
    InvalidValue {
        /// 字段名
        field: &'static str,
        /// 原因
        reason: String,
    },
}

/// 多体模型操作错误
#[derive(Debug, Error, PartialEq)]
pub enum MultiBodyError {
    /// 连杆索引越界
    #[error("link index {index} out of range (multibody has {num_links} links)")]
    LinkOutOfRange {
        /// 请求的索引
        index: usize,
        /// 连杆数量
        num_links: usize,
    },

    /// 父连杆必须先于子连杆定义
    #[error("link {link} has parent {parent}, parents must precede children")]
    InvalidParent {
        /// 子连杆
        link: usize,
        /// 父连杆索引
        parent: i32,
    },

    /// 连杆尚未通过 setup_revolute 定义
    #[error("link {0} was never set up")]
    LinkNotSetUp(usize),

    /// 多体在 finalize 之前被使用
    #[error("multibody has not been finalized")]
    NotFinalized,

    /// 多体索引越界
    #[error("multibody index {0} out of range")]
    UnknownMultiBody(usize),
}
