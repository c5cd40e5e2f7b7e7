// crates/af_solver/src/boundary.rs

//! 壁面边界条件
//!
//! 三类壁面共享同一骨架：速度强 Dirichlet（静壁为零、动壁为网格
//! 速度），能量方程按类型分派：
//!
//! - 给定热流：能量残差弱施加 `q·Area`
//! - 等温壁：单侧温度梯度的弱施加 + 隐式对角雅可比
//! - 共轭传热：壁温来自对侧求解器，强施加（残差行清零、解写入
//!   上一时间层、雅可比行删除）
//!
//! 壁面函数路径未实现，配置激活即致命错误。

use log::error;

use af_foundation::{ensure, require, AfError, AfResult, MarkerArena, MarkerIndex, Scalar};
use af_mesh::DualMesh;

use crate::config::{MarkerConfig, ReferenceValues, WallFunctionKind, WallKind};
use crate::sparse::{ResidualVector, SparseBlockMatrix};
use crate::state::PointStore;

// ========================================================================
// 共轭传热数据
// ========================================================================

/// 共轭传热分量：对侧温度
pub const CHT_TEMPERATURE: usize = 0;
/// 共轭传热分量：对侧热流
pub const CHT_HEAT_FLUX: usize = 1;
/// 共轭传热分量：对侧导热系数/距离（热导）
pub const CHT_CONDUCTANCE: usize = 2;
/// 共轭传热分量：Robin 回传的换热系数
pub const CHT_ROBIN_COEFFICIENT: usize = 3;
/// 每顶点共轭传热分量数
pub const CHT_N_COMPONENTS: usize = 4;

/// 共轭传热耦合数据存储
///
/// 按 (标记, 顶点, 分量) 存放对侧求解器传来的界面量，写入时按
/// 松弛因子与旧值混合，抑制耦合迭代震荡。
#[derive(Debug, Clone)]
pub struct ConjugateHeatStore {
    arena: MarkerArena<f64>,
    relaxation: f64,
}

impl ConjugateHeatStore {
    /// 按网格各标记顶点数创建
    pub fn new(mesh: &DualMesh, relaxation: f64) -> Self {
        let counts: Vec<usize> = mesh.markers().iter().map(|m| m.vertices.len()).collect();
        Self {
            arena: MarkerArena::new(&counts, CHT_N_COMPONENTS, 0.0),
            relaxation,
        }
    }

    /// 松弛写入：`new = α·value + (1-α)·old`
    pub fn set_relaxed(
        &mut self,
        marker: MarkerIndex,
        vertex: usize,
        comp: usize,
        value: f64,
    ) -> AfResult<()> {
        let old = self.arena.get(marker.get(), vertex, comp)?;
        let blended = self.relaxation * value + (1.0 - self.relaxation) * old;
        self.arena.set(marker.get(), vertex, comp, blended)
    }

    /// 读取分量
    pub fn get(&self, marker: MarkerIndex, vertex: usize, comp: usize) -> AfResult<f64> {
        self.arena.get(marker.get(), vertex, comp)
    }
}

// ========================================================================
// 壁面装配器
// ========================================================================

/// 壁面边界条件装配器
#[derive(Debug, Clone)]
pub struct BoundaryAssembler {
    n_dim: usize,
    n_var: usize,
    implicit: bool,
    energy: bool,
    reference: ReferenceValues,
}

impl BoundaryAssembler {
    /// 创建壁面装配器
    pub fn new(
        n_dim: usize,
        implicit: bool,
        energy: bool,
        reference: ReferenceValues,
    ) -> Self {
        Self {
            n_dim,
            n_var: n_dim + 2,
            implicit,
            energy,
            reference,
        }
    }

    /// 能量方程的变量下标
    #[inline]
    fn energy_var(&self) -> usize {
        self.n_dim + 1
    }

    /// 对一个标记施加壁面边界条件
    ///
    /// 共轭传热标记必须提供 `cht` 存储。壁面函数配置未实现，激活
    /// 即返回致命错误。
    pub fn apply_wall<S: Scalar>(
        &self,
        mesh: &DualMesh,
        marker: MarkerIndex,
        config: &MarkerConfig,
        state: &mut PointStore<S>,
        cht: Option<&ConjugateHeatStore>,
        residual: &mut ResidualVector<S>,
        mut jacobian: Option<&mut SparseBlockMatrix<S>>,
    ) -> AfResult<()> {
        if config.wall_function != WallFunctionKind::None {
            error!(
                "标记 {} 配置了壁面函数 {:?}，该路径未实现",
                config.name, config.wall_function
            );
            return Err(AfError::unsupported(format!(
                "壁面函数处理 ({:?})",
                config.wall_function
            )));
        }
        ensure!(
            self.implicit == jacobian.is_some(),
            AfError::config("雅可比矩阵与隐式标志不一致")
        );

        let e = self.energy_var();
        let patch = mesh.marker(marker);

        for (v, vertex) in patch.vertices.iter().enumerate() {
            let i = vertex.point;
            let geom = mesh.point(i);
            if !geom.is_domain {
                continue;
            }

            // 速度强 Dirichlet：静壁为零，动壁为网格速度
            let mut wall_vel = vec![S::ZERO; self.n_dim];
            if config.moving_wall {
                if let Some(gv) = geom.grid_velocity {
                    for (d, w) in wall_vel.iter_mut().enumerate() {
                        *w = S::lift(gv[d]);
                    }
                }
            }
            state.set_velocity_old(i, &wall_vel);
            for var in 1..=self.n_dim {
                residual.set_entry_zero(i, var);
            }
            if let Some(jac) = jacobian.as_deref_mut() {
                for var in 1..=self.n_dim {
                    jac.delete_vals_row(i, var);
                }
            }

            if !self.energy {
                continue;
            }

            let area = vertex.area();
            match config.wall {
                WallKind::HeatFlux { flux } => {
                    let mut res_visc = vec![S::ZERO; self.n_var];
                    res_visc[e] = S::lift(flux / self.reference.heat_flux * area);
                    residual.subtract_block(i, &res_visc);
                }
                WallKind::Isothermal { twall } => {
                    let nb = vertex.normal_neighbor;
                    let dist = mesh.distance(i, nb);
                    let twall = S::lift(twall / self.reference.temperature);
                    let kt = state.thermal_conductivity(i);

                    // 单侧梯度: dT/dn = -(T_nb - T_wall)/dist
                    let dtdn = -(state.temperature(nb) - twall) / S::lift(dist);
                    let mut res_visc = vec![S::ZERO; self.n_var];
                    res_visc[e] = kt * dtdn * S::lift(area);
                    residual.subtract_block(i, &res_visc);

                    if let Some(jac) = jacobian.as_deref_mut() {
                        let mut block = vec![S::ZERO; self.n_var * self.n_var];
                        block[e * self.n_var + e] = -kt * S::lift(area / dist);
                        jac.subtract_block_diag(i, &block);
                    }
                }
                WallKind::ConjugateHeat { coupling } => {
                    let store = require!(
                        cht,
                        AfError::missing_config(format!(
                            "标记 {} 的共轭传热耦合数据",
                            config.name
                        ))
                    );
                    let t_conj =
                        S::lift(store.get(marker, v, CHT_TEMPERATURE)? / self.reference.temperature);

                    let twall = if coupling.is_averaged() {
                        // 双侧热导加权的界面温度
                        let nb = vertex.normal_neighbor;
                        let dist = mesh.distance(i, nb);
                        let t_here = state.temperature(nb);
                        let hf_here = state.thermal_conductivity(i)
                            * S::lift(self.reference.viscosity / dist);
                        let hf_conj = S::lift(store.get(marker, v, CHT_CONDUCTANCE)?);
                        (t_here * hf_here + t_conj * hf_conj) / (hf_here + hf_conj)
                    } else {
                        t_conj
                    };

                    // 强施加：解写入上一时间层，残差行清零，雅可比行删除
                    state.set_solution_old(i, e, twall);
                    residual.set_entry_zero(i, e);
                    if let Some(jac) = jacobian.as_deref_mut() {
                        jac.delete_vals_row(i, e);
                    }
                }
            }
        }
        Ok(())
    }
}

// ========================================================================
// 测试
// ========================================================================
