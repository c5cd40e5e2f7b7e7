// crates/af_foundation/src/lib.rs

//! AeroFVM Foundation Layer
//!
//! 基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型（含致命/可恢复分类）
//! - [`scalar`]: 泛型标量 trait 与前向模式导数追踪标量 [`scalar::Dual`]
//! - [`index`]: 强类型索引系统
//! - [`arena`]: 按 (marker, vertex, component) 索引的扁平化存储
//!
//! # 设计原则
//!
//! 1. **最小依赖**: 仅依赖 serde、thiserror 与 num-traits
//! 2. **类型安全**: 编译期防止索引误用
//! 3. **泛型数值**: 装配代码写一次，按标量类型实例化（f32/f64/Dual）

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod error;
pub mod index;
pub mod scalar;

// 重导出常用类型
pub use arena::MarkerArena;
pub use error::{AfError, AfResult};
pub use index::{EdgeIndex, ElemIndex, MarkerIndex, PointIndex, VertexIndex, INVALID_INDEX};
pub use scalar::{Dual, Scalar};

/// 条件检查宏：条件不满足时提前返回错误
///
/// # 示例
///
/// ```
/// use af_foundation::{ensure, AfError, AfResult};
///
/// fn check(value: i32) -> AfResult<()> {
///     ensure!(value > 0, AfError::config("value 必须为正"));
///     Ok(())
/// }
/// assert!(check(-1).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

/// Option 解包宏：None 时提前返回错误
///
/// # 示例
///
/// ```
/// use af_foundation::{require, AfError, AfResult};
///
/// fn get(opt: Option<i32>) -> AfResult<i32> {
///     let v = require!(opt, AfError::config("缺少值"));
///     Ok(v)
/// }
/// assert_eq!(get(Some(3)).unwrap(), 3);
/// ```
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr) => {
        match $opt {
            Some(v) => v,
            None => return Err($err),
        }
    };
}

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::arena::MarkerArena;
    pub use crate::error::{AfError, AfResult};
    pub use crate::index::{
        EdgeIndex, ElemIndex, MarkerIndex, PointIndex, VertexIndex, INVALID_INDEX,
    };
    pub use crate::scalar::{Dual, Scalar};
    pub use crate::{ensure, require};
}
