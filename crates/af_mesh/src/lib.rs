// crates/af_mesh/src/lib.rs

//! AeroFVM Mesh Layer
//!
//! 网格层，提供原始单元连接表与以点为中心的对偶网格数据模型。
//!
//! # 模块概览
//!
//! - [`element`]: 单元类型、面/邻居连接表与朝向翻转
//! - [`dual`]: 对偶网格（点、内部边、边界标记、周期配对）
//!
//! # 约定
//!
//! 1. 几何量始终以 `f64` 存储（`glam::DVec3`），二维网格第三分量为零
//! 2. 点编号域内点在前、halo 点在后
//! 3. 内部边两端点按编号小者在前存储

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dual;
pub mod element;

pub use dual::{
    BoundaryVertex, DualMesh, DualMeshBuilder, Edge, MarkerPatch, PeriodicPair, PointGeometry,
};
pub use element::{Element, ElementKind};
