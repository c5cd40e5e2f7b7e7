// crates/af_foundation/src/index.rs

//! 强类型索引系统
//!
//! 网格与求解器中存在多种语义不同的编号：全局点号、边号、标记号、
//! 标记内顶点号与单元号。全部用裸 `usize` 会让误用在编译期无法发现，
//! 这里为每一类编号定义独立的 newtype。
//!
//! # 示例
//!
//! ```
//! use af_foundation::index::{PointIndex, EdgeIndex};
//!
//! let p = PointIndex::new(5);
//! let e = EdgeIndex::new(5);
//! assert_eq!(p.get(), e.get());
//! // 但 p == e 无法编译：类型不同
//! ```

use serde::{Deserialize, Serialize};

/// 无效索引哨兵值
pub const INVALID_INDEX: usize = usize::MAX;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// 无效索引
            pub const INVALID: Self = Self(INVALID_INDEX);

            /// 创建新索引
            #[inline]
            pub const fn new(value: usize) -> Self {
                Self(value)
            }

            /// 获取底层值
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// 是否为有效索引
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_INDEX
            }

            /// 是否为无效索引
            #[inline]
            pub const fn is_invalid(self) -> bool {
                self.0 == INVALID_INDEX
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_invalid() {
                    write!(f, "{}(无效)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

define_index!(
    /// 对偶网格点索引（0..n_points，域内点在前、halo 点在后）
    PointIndex
);

define_index!(
    /// 对偶网格内部边索引
    EdgeIndex
);

define_index!(
    /// 边界标记索引
    MarkerIndex
);

define_index!(
    /// 标记内顶点索引（按标记局部编号）
    VertexIndex
);

define_index!(
    /// 原始单元索引
    ElemIndex
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_get() {
        let p = PointIndex::new(42);
        assert_eq!(p.get(), 42);
        assert!(p.is_valid());
    }

    #[test]
    fn test_invalid() {
        let p = PointIndex::INVALID;
        assert!(p.is_invalid());
        assert!(!p.is_valid());
        assert_eq!(p.get(), INVALID_INDEX);
    }

    #[test]
    fn test_ordering() {
        let a = EdgeIndex::new(1);
        let b = EdgeIndex::new(2);
        assert!(a < b);
        // 无效索引排在所有有效索引之后
        assert!(b < EdgeIndex::INVALID);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PointIndex::new(3)), "PointIndex(3)");
        assert_eq!(format!("{}", MarkerIndex::INVALID), "MarkerIndex(无效)");
    }

    #[test]
    fn test_from_usize() {
        let v: VertexIndex = 7usize.into();
        assert_eq!(v.get(), 7);
    }
}
