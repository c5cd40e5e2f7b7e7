// crates/af_solver/src/lib.rs

//! AeroFVM Solver Layer
//!
//! 求解器层，在对偶网格上做基于边的残差/雅可比装配，并提供隐式
//! 求解所需的周边设施。
//!
//! # 模块概览
//!
//! - [`config`]: 求解器与标记配置（枚举分派，无字符串比较热路径）
//! - [`state`]: SoA 布局的点态解/原始变量/梯度存储
//! - [`sparse`]: 块稀疏雅可比矩阵与残差向量
//! - [`assembly`]: 基于边的残差/雅可比装配引擎
//! - [`timestep`]: CFL 局部时间步控制器
//! - [`boundary`]: 壁面边界条件（热流/等温/共轭传热）
//! - [`halo`]: 两阶段（发起/完成）halo 交换与集合归约
//! - [`linelet`]: 各向异性网格的线隐式预处理链构建
//!
//! # 泛型标量
//!
//! 装配路径对 [`af_foundation::Scalar`] 泛型：生产用 `f64`，灵敏度
//! 验证用 [`af_foundation::Dual`]。几何始终是 `f64`，表达式内用
//! `S::lift` 提升。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembly;
pub mod boundary;
pub mod config;
pub mod halo;
pub mod linelet;
pub mod sparse;
pub mod state;
pub mod timestep;

pub use assembly::{
    AssemblyReport, BoundaryFluxFunctor, BoundaryState, EdgeState, FluxContribution, FluxFunctor,
    ResidualAssembler,
};
pub use boundary::{BoundaryAssembler, ConjugateHeatStore};
pub use config::{
    ChtCouplingKind, MarkerConfig, ReferenceValues, SolverConfig, TimeMarching, TimeScheme,
    WallFunctionKind, WallKind,
};
pub use halo::{
    Collective, HaloChannel, HaloExchanger, HaloKind, HaloLink, HaloTicket, LocalCollective,
    LoopbackChannel,
};
pub use linelet::build_linelets;
pub use sparse::{ResidualVector, SparseBlockMatrix};
pub use state::{FluidModel, PointStore};
pub use timestep::{TimeStepController, TimeStepInfo};
