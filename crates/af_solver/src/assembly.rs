// crates/af_solver/src/assembly.rs

//! 基于边的残差/雅可比装配引擎
//!
//! 装配器遍历每条内部边恰好一次，由通量算子计算界面通量（及隐式
//! 时的两侧雅可比），按约定散布到两端控制体：
//!
//! ```text
//! res[i] -= F,  res[j] += F        （粘性/扩散类通量）
//! ```
//!
//! halo 点不拥有方程，其残差/雅可比行不写入。通量算子通过
//! [`FluxFunctor`] 注入，装配器本身不含物理。

use glam::DVec3;

use af_foundation::{ensure, AfError, AfResult, MarkerIndex, PointIndex, Scalar};
use af_mesh::DualMesh;

use crate::sparse::{ResidualVector, SparseBlockMatrix};
use crate::state::{FluidModel, PointStore};

// ========================================================================
// 通量算子接口
// ========================================================================

/// 一条内部边的界面状态（两侧原始变量、梯度与几何）
#[derive(Debug)]
pub struct EdgeState<'a, S: Scalar> {
    /// i 侧原始变量
    pub prim_i: &'a [S],
    /// j 侧原始变量
    pub prim_j: &'a [S],
    /// i 侧梯度（`n_prim_grad × n_dim` 变量主序）
    pub grad_i: &'a [S],
    /// j 侧梯度
    pub grad_j: &'a [S],
    /// i 侧点坐标
    pub coord_i: DVec3,
    /// j 侧点坐标
    pub coord_j: DVec3,
    /// 面积加权法向（i 指向 j）
    pub normal: DVec3,
    /// 两侧湍动能（湍流模型激活时）
    pub turb_ke: Option<(S, S)>,
    /// 两侧网格速度（动网格时）
    pub grid_vel: Option<(DVec3, DVec3)>,
}

/// 一个边界顶点的界面状态
#[derive(Debug)]
pub struct BoundaryState<'a, S: Scalar> {
    /// 顶点所在点的原始变量
    pub prim: &'a [S],
    /// 顶点所在点的梯度
    pub grad: &'a [S],
    /// 点坐标
    pub coord: DVec3,
    /// 面积加权外法向
    pub normal: DVec3,
    /// 网格速度（动网格时）
    pub grid_vel: Option<DVec3>,
}

/// 通量算子的输出：通量块与隐式时的两侧雅可比块
#[derive(Debug, Clone)]
pub struct FluxContribution<S: Scalar> {
    /// 界面通量（长度 `n_var`）
    pub flux: Vec<S>,
    /// 对两侧守恒变量的雅可比（各 `n_var²`，行主序）
    pub jacobian: Option<(Vec<S>, Vec<S>)>,
}

impl<S: Scalar> FluxContribution<S> {
    /// 仅通量（显式）
    pub fn explicit(flux: Vec<S>) -> Self {
        Self {
            flux,
            jacobian: None,
        }
    }

    /// 通量与两侧雅可比（隐式）
    pub fn implicit(flux: Vec<S>, jac_i: Vec<S>, jac_j: Vec<S>) -> Self {
        Self {
            flux,
            jacobian: Some((jac_i, jac_j)),
        }
    }
}

/// 内部边通量算子
pub trait FluxFunctor<S: Scalar> {
    /// 通量块长度
    fn n_var(&self) -> usize;

    /// 计算一条边的界面通量
    fn compute(&self, edge: &EdgeState<'_, S>) -> AfResult<FluxContribution<S>>;
}

/// 边界顶点通量算子
pub trait BoundaryFluxFunctor<S: Scalar> {
    /// 通量块长度
    fn n_var(&self) -> usize;

    /// 计算一个边界顶点的通量
    fn compute(&self, vertex: &BoundaryState<'_, S>) -> AfResult<FluxContribution<S>>;
}

// ========================================================================
// 装配器
// ========================================================================

/// 一次装配扫描的统计
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyReport {
    /// 本次原始变量更新中状态非物理的点数（局部修正，不中止）
    pub non_physical_points: usize,
}

fn require_jacobian<S: Scalar>(c: &FluxContribution<S>) -> AfResult<(&[S], &[S])> {
    match &c.jacobian {
        Some((jac_i, jac_j)) => Ok((jac_i, jac_j)),
        None => Err(AfError::internal("隐式装配需要通量雅可比")),
    }
}

/// 残差/雅可比装配器
#[derive(Debug, Clone)]
pub struct ResidualAssembler {
    n_var: usize,
    implicit: bool,
}

impl ResidualAssembler {
    /// 创建装配器
    pub fn new(n_var: usize, implicit: bool) -> Self {
        Self { n_var, implicit }
    }

    /// 是否隐式
    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// 装配前处理：清零累加器并更新原始变量
    ///
    /// 非物理点按计数上报，由调用方跨进程归约后决定是否告警。
    pub fn preprocess<S: Scalar>(
        &self,
        state: &mut PointStore<S>,
        model: &dyn FluidModel<S>,
        residual: &mut ResidualVector<S>,
        jacobian: Option<&mut SparseBlockMatrix<S>>,
    ) -> AfResult<AssemblyReport> {
        AfError::check_size("残差向量", state.n_point() * self.n_var, residual.n_var() * residual.n_point())?;
        residual.set_zero();
        if let Some(jac) = jacobian {
            ensure!(
                self.implicit,
                AfError::config("显式装配不应传入雅可比矩阵")
            );
            jac.set_zero();
        }
        let non_physical_points = state.set_primitive_variables(model);
        Ok(AssemblyReport {
            non_physical_points,
        })
    }

    /// 内部边扫描
    ///
    /// 每条边恰好评估一次通量；两端按 `res[i] -= F`、`res[j] += F`
    /// 散布，halo 端跳过。隐式时雅可比按
    /// [`SparseBlockMatrix::update_blocks_sub`] 散布（halo 行同样
    /// 写入，求解前由行删除统一处理）。
    pub fn assemble_interior<S: Scalar>(
        &self,
        mesh: &DualMesh,
        state: &PointStore<S>,
        turb_ke: Option<&[S]>,
        functor: &dyn FluxFunctor<S>,
        residual: &mut ResidualVector<S>,
        mut jacobian: Option<&mut SparseBlockMatrix<S>>,
    ) -> AfResult<()> {
        AfError::check_size("通量块", self.n_var, functor.n_var())?;
        if let Some(tke) = turb_ke {
            AfError::check_size("湍动能数组", state.n_point(), tke.len())?;
        }

        for (e, edge) in mesh.edges().iter().enumerate() {
            let (i, j) = edge.points;
            let geom_i = mesh.point(i);
            let geom_j = mesh.point(j);

            let edge_state = EdgeState {
                prim_i: state.primitive(i),
                prim_j: state.primitive(j),
                grad_i: state.gradient_slice(i),
                grad_j: state.gradient_slice(j),
                coord_i: geom_i.coord,
                coord_j: geom_j.coord,
                normal: edge.normal,
                turb_ke: turb_ke.map(|t| (t[i.get()], t[j.get()])),
                grid_vel: match (geom_i.grid_velocity, geom_j.grid_velocity) {
                    (Some(vi), Some(vj)) => Some((vi, vj)),
                    _ => None,
                },
            };

            let contribution = functor.compute(&edge_state)?;
            AfError::check_size("通量块", self.n_var, contribution.flux.len())?;

            if geom_i.is_domain {
                residual.subtract_block(i, &contribution.flux);
            }
            if geom_j.is_domain {
                residual.add_block(j, &contribution.flux);
            }

            if self.implicit {
                if let Some(jac) = jacobian.as_deref_mut() {
                    let (jac_i, jac_j) = require_jacobian(&contribution)?;
                    AfError::check_size("雅可比块", self.n_var * self.n_var, jac_i.len())?;
                    AfError::check_size("雅可比块", self.n_var * self.n_var, jac_j.len())?;
                    jac.update_blocks_sub(af_foundation::EdgeIndex::new(e), jac_i, jac_j);
                }
            }
        }
        Ok(())
    }

    /// 边界标记扫描
    ///
    /// 逐顶点评估通量，`res -= F`，隐式时雅可比减入对角块。
    /// halo 顶点跳过。
    pub fn assemble_boundary<S: Scalar>(
        &self,
        mesh: &DualMesh,
        marker: MarkerIndex,
        state: &PointStore<S>,
        functor: &dyn BoundaryFluxFunctor<S>,
        residual: &mut ResidualVector<S>,
        mut jacobian: Option<&mut SparseBlockMatrix<S>>,
    ) -> AfResult<()> {
        AfError::check_size("通量块", self.n_var, functor.n_var())?;

        for vertex in &mesh.marker(marker).vertices {
            let i: PointIndex = vertex.point;
            let geom = mesh.point(i);
            if !geom.is_domain {
                continue;
            }

            let vertex_state = BoundaryState {
                prim: state.primitive(i),
                grad: state.gradient_slice(i),
                coord: geom.coord,
                normal: vertex.normal,
                grid_vel: geom.grid_velocity,
            };

            let contribution = functor.compute(&vertex_state)?;
            AfError::check_size("通量块", self.n_var, contribution.flux.len())?;
            residual.subtract_block(i, &contribution.flux);

            if self.implicit {
                if let Some(jac) = jacobian.as_deref_mut() {
                    let (jac_i, _) = require_jacobian(&contribution)?;
                    AfError::check_size("雅可比块", self.n_var * self.n_var, jac_i.len())?;
                    jac.subtract_block_diag(i, jac_i);
                }
            }
        }
        Ok(())
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use af_mesh::{BoundaryVertex, DualMeshBuilder, PointGeometry};

    struct UnitModel;

    impl<S: Scalar> FluidModel<S> for UnitModel {
        fn update_primitives(&self, n_dim: usize, solution: &[S], primitive: &mut [S]) -> bool {
            primitive[0] = solution[0];
            for d in 0..n_dim {
                primitive[1 + d] = solution[1 + d];
            }
            primitive[n_dim + 1] = solution[n_dim + 1];
            primitive[n_dim + 2] = S::ONE;
            primitive[n_dim + 3] = S::ONE;
            true
        }
    }

    /// 温度差驱动的标量扩散通量
    struct DiffusionFlux {
        n_var: usize,
        n_dim: usize,
    }

    impl FluxFunctor<f64> for DiffusionFlux {
        fn n_var(&self) -> usize {
            self.n_var
        }

        fn compute(&self, edge: &EdgeState<'_, f64>) -> AfResult<FluxContribution<f64>> {
            let dist = (edge.coord_j - edge.coord_i).length();
            let area = edge.normal.length();
            let t_i = edge.prim_i[self.n_dim + 1];
            let t_j = edge.prim_j[self.n_dim + 1];
            let mut flux = vec![0.0; self.n_var];
            let coeff = area / dist;
            flux[self.n_var - 1] = coeff * (t_j - t_i);

            let nv = self.n_var;
            let mut jac_i = vec![0.0; nv * nv];
            let mut jac_j = vec![0.0; nv * nv];
            jac_i[(nv - 1) * nv + (nv - 1)] = -coeff;
            jac_j[(nv - 1) * nv + (nv - 1)] = coeff;
            Ok(FluxContribution::implicit(flux, jac_i, jac_j))
        }
    }

    fn two_point_mesh() -> DualMesh {
        let mut b = DualMeshBuilder::new(2);
        b.add_point(PointGeometry::interior(DVec3::ZERO, 1.0));
        b.add_point(PointGeometry::interior(DVec3::new(1.0, 0.0, 0.0), 1.0));
        b.add_edge(
            PointIndex::new(0),
            PointIndex::new(1),
            DVec3::X,
            DVec3::new(0.5, 0.0, 0.0),
        );
        b.add_marker(
            "wall",
            vec![BoundaryVertex {
                point: PointIndex::new(0),
                normal: DVec3::new(-1.0, 0.0, 0.0),
                normal_neighbor: PointIndex::new(1),
            }],
        );
        b.build().unwrap()
    }

    #[test]
    fn test_interior_antisymmetric_scatter() {
        let mesh = two_point_mesh();
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        state.solution_mut(PointIndex::new(0))[3] = 300.0;
        state.solution_mut(PointIndex::new(1))[3] = 310.0;

        let assembler = ResidualAssembler::new(4, true);
        let mut res = ResidualVector::new(2, 4);
        let mut jac = SparseBlockMatrix::from_mesh(&mesh, 4).unwrap();
        assembler
            .preprocess(&mut state, &UnitModel, &mut res, Some(&mut jac))
            .unwrap();

        let flux = DiffusionFlux { n_var: 4, n_dim: 2 };
        assembler
            .assemble_interior(&mesh, &state, None, &flux, &mut res, Some(&mut jac))
            .unwrap();

        // res[0] = -F, res[1] = +F：和为零（守恒）
        let f = 10.0; // area/dist·(t_j - t_i) = 1·10
        assert!((res.entry(PointIndex::new(0), 3) + f).abs() < 1e-12);
        assert!((res.entry(PointIndex::new(1), 3) - f).abs() < 1e-12);

        // 雅可比按 update_blocks_sub 散布
        let diag0 = jac.block(PointIndex::new(0), PointIndex::new(0)).unwrap();
        assert_eq!(diag0[3 * 4 + 3], 1.0); // -(-coeff)
    }

    #[test]
    fn test_halo_rows_not_written() {
        let mut b = DualMeshBuilder::new(2);
        b.add_point(PointGeometry::interior(DVec3::ZERO, 1.0));
        b.add_point(PointGeometry::halo(DVec3::new(1.0, 0.0, 0.0), 1.0));
        b.add_edge(
            PointIndex::new(0),
            PointIndex::new(1),
            DVec3::X,
            DVec3::new(0.5, 0.0, 0.0),
        );
        let mesh = b.build().unwrap();

        let mut state: PointStore<f64> = PointStore::new(2, 1, 2, 1.0);
        state.solution_mut(PointIndex::new(1))[3] = 10.0;
        let assembler = ResidualAssembler::new(4, false);
        let mut res = ResidualVector::new(2, 4);
        assembler
            .preprocess(&mut state, &UnitModel, &mut res, None)
            .unwrap();
        let flux = DiffusionFlux { n_var: 4, n_dim: 2 };
        assembler
            .assemble_interior(&mesh, &state, None, &flux, &mut res, None)
            .unwrap();

        // 域内端收到通量，halo 端残差保持零
        assert!(res.entry(PointIndex::new(0), 3).abs() > 0.0);
        assert_eq!(res.entry(PointIndex::new(1), 3), 0.0);
    }

    struct ConstBoundaryFlux {
        n_var: usize,
    }

    impl BoundaryFluxFunctor<f64> for ConstBoundaryFlux {
        fn n_var(&self) -> usize {
            self.n_var
        }

        fn compute(&self, vertex: &BoundaryState<'_, f64>) -> AfResult<FluxContribution<f64>> {
            let mut flux = vec![0.0; self.n_var];
            flux[self.n_var - 1] = vertex.normal.length();
            Ok(FluxContribution::implicit(
                flux,
                vec![0.0; self.n_var * self.n_var],
                vec![0.0; self.n_var * self.n_var],
            ))
        }
    }

    #[test]
    fn test_boundary_scatter() {
        let mesh = two_point_mesh();
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        let assembler = ResidualAssembler::new(4, true);
        let mut res = ResidualVector::new(2, 4);
        let mut jac = SparseBlockMatrix::from_mesh(&mesh, 4).unwrap();
        assembler
            .preprocess(&mut state, &UnitModel, &mut res, Some(&mut jac))
            .unwrap();

        let marker = mesh.marker_by_name("wall").unwrap();
        let flux = ConstBoundaryFlux { n_var: 4 };
        assembler
            .assemble_boundary(&mesh, marker, &state, &flux, &mut res, Some(&mut jac))
            .unwrap();

        assert_eq!(res.entry(PointIndex::new(0), 3), -1.0);
        assert_eq!(res.entry(PointIndex::new(1), 3), 0.0);
    }

    #[test]
    fn test_flux_size_mismatch_rejected() {
        let mesh = two_point_mesh();
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        let assembler = ResidualAssembler::new(3, false);
        let mut res = ResidualVector::new(2, 3);
        assembler
            .preprocess(&mut state, &UnitModel, &mut res, None)
            .unwrap();
        let flux = DiffusionFlux { n_var: 4, n_dim: 2 };
        let err = assembler.assemble_interior(&mesh, &state, None, &flux, &mut res, None);
        assert!(err.is_err());
    }
}
