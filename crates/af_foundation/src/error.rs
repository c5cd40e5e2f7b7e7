// crates/af_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `AfError` 枚举和 `AfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分级
//!
//! 1. **致命错误**: 未实现的配置（壁面函数、未知 CHT 耦合方式）与
//!    Initiate/Complete 契约不匹配。继续运行会静默产生错误物理结果，
//!    必须集体上报并中止。
//! 2. **局部可恢复**: 非物理状态按点计数上报，退化几何赋零时间步，
//!    均不在错误类型层面体现（由调用方局部处理）。
//!
//! # 示例
//!
//! ```
//! use af_foundation::error::{AfError, AfResult};
//!
//! fn read_config() -> AfResult<()> {
//!     Err(AfError::config("CFL 必须为正"))
//! }
//! ```

use thiserror::Error;

/// 统一结果类型
pub type AfResult<T> = Result<T, AfError>;

/// AeroFVM 错误类型
///
/// 核心错误类型，用于整个项目。求解器内部的局部修正（状态裁剪、
/// 零时间步）不经过此类型。
#[derive(Error, Debug)]
pub enum AfError {
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 缺少配置项
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键名
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 功能未实现（致命：继续运行会产生错误物理结果）
    #[error("不支持的配置: {feature}")]
    Unsupported {
        /// 未实现的功能描述
        feature: String,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 通信契约违背（致命：Initiate/Complete 的类别或缓冲区不匹配）
    #[error("通信契约违背: 期望 {expected}, 实际 {actual}")]
    CommMismatch {
        /// 期望的类别/大小描述
        expected: String,
        /// 实际的类别/大小描述
        actual: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl AfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 缺少配置
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 功能未实现
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 通信契约违背
    pub fn comm_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::CommMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否为致命错误（必须中止整个分布式运行）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::CommMismatch { .. })
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl AfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> AfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> AfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> AfResult<()> {
        if value < min || value > max {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AfError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_unsupported_is_fatal() {
        let err = AfError::unsupported("壁面函数处理");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("壁面函数"));
    }

    #[test]
    fn test_comm_mismatch_is_fatal() {
        let err = AfError::comm_mismatch("Solution", "Volume");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_not_fatal() {
        assert!(!AfError::config("x").is_fatal());
        assert!(!AfError::size_mismatch("x", 1, 2).is_fatal());
    }

    #[test]
    fn test_check_size() {
        assert!(AfError::check_size("test", 10, 10).is_ok());
        assert!(AfError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(AfError::check_index("Point", 5, 10).is_ok());
        assert!(AfError::check_index("Point", 10, 10).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(AfError::check_range("cfl", 1.0, 0.0, 1e10).is_ok());
        assert!(AfError::check_range("cfl", -1.0, 0.0, 1e10).is_err());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> AfResult<()> {
            crate::ensure!(value > 0, AfError::config("value 必须为正"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }

    #[test]
    fn test_require_macro() {
        fn get_value(opt: Option<i32>) -> AfResult<i32> {
            let v = crate::require!(opt, AfError::missing_config("value"));
            Ok(v)
        }

        assert_eq!(get_value(Some(42)).unwrap(), 42);
        assert!(get_value(None).is_err());
    }
}
