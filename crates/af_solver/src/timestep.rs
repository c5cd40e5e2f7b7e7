// crates/af_solver/src/timestep.rs

//! CFL 局部时间步控制器
//!
//! 每轮迭代重算各控制体的局部时间步：先沿内部边与边界顶点累加
//! 对流/粘性谱半径，再按局部 CFL 折算时间步并按推进模式收尾
//! （定常局部步、全局时间步广播、双时间步伪时间钳制）。
//!
//! 谱半径与时间步是装配的冻结参数，全程 `f64`。

use log::debug;

use af_foundation::{AfResult, PointIndex, Scalar};
use af_mesh::DualMesh;

use crate::config::{SolverConfig, TimeMarching};
use crate::halo::Collective;
use crate::state::PointStore;

/// 粘性时间步稳定性系数
const K_V: f64 = 0.25;

/// 一轮时间步计算的全局信息
#[derive(Debug, Clone, Copy)]
pub struct TimeStepInfo {
    /// 全局最小局部时间步
    pub min_dt: f64,
    /// 全局最大局部时间步
    pub max_dt: f64,
    /// 全局时间步（TimeStepping 模式下广播的值，其余模式为最小步）
    pub global_dt: f64,
    /// 当前物理时间步（双时间步外层）
    pub physical_dt: f64,
}

/// CFL 局部时间步控制器
#[derive(Debug, Clone)]
pub struct TimeStepController {
    time_marching: TimeMarching,
    implicit: bool,
    energy: bool,
    unsteady_cfl: f64,
    max_dt: f64,
    physical_dt: f64,
}

impl TimeStepController {
    /// 由求解器配置创建
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            time_marching: config.time_marching,
            implicit: config.is_implicit(),
            energy: config.energy,
            unsteady_cfl: config.unsteady_cfl,
            max_dt: config.max_dt,
            physical_dt: config.physical_dt,
        }
    }

    /// 当前物理时间步
    #[inline]
    pub fn physical_dt(&self) -> f64 {
        self.physical_dt
    }

    /// 重算全部局部时间步
    ///
    /// `iteration` 为内迭代号：双时间步模式在每个物理时间层的第 0
    /// 次内迭代且 `unsteady_cfl != 0` 时由当前谱半径重算物理时间步。
    pub fn compute<S: Scalar, C: Collective>(
        &mut self,
        mesh: &DualMesh,
        state: &mut PointStore<S>,
        comm: &C,
        iteration: usize,
    ) -> AfResult<TimeStepInfo> {
        state.reset_lambdas();

        // 内部边扫描：两侧均值谱半径，散布到两端域内点
        for edge in mesh.edges() {
            let (i, j) = edge.points;
            let area = edge.area();

            let mut proj_vel = 0.5
                * (state.projected_velocity(i, edge.normal).lower()
                    + state.projected_velocity(j, edge.normal).lower());
            if let (Some(gi), Some(gj)) =
                (mesh.point(i).grid_velocity, mesh.point(j).grid_velocity)
            {
                proj_vel -= 0.5 * (gi + gj).dot(edge.normal);
            }
            let mean_beta =
                0.5 * (state.beta_inc2(i).lower() + state.beta_inc2(j).lower());
            let lambda_conv = proj_vel.abs() + mean_beta.sqrt() * area;

            let lambda_visc = self.viscous_lambda_mean(state, i, j, area);

            if mesh.point(i).is_domain {
                state.add_lambda_inv(i, lambda_conv);
                state.add_lambda_visc(i, lambda_visc);
            }
            if mesh.point(j).is_domain {
                state.add_lambda_inv(j, lambda_conv);
                state.add_lambda_visc(j, lambda_visc);
            }
        }

        // 边界顶点扫描：单侧值
        for patch in mesh.markers() {
            for vertex in &patch.vertices {
                let i = vertex.point;
                if !mesh.point(i).is_domain {
                    continue;
                }
                let area = vertex.area();
                let mut proj_vel = state.projected_velocity(i, vertex.normal).lower();
                if let Some(gv) = mesh.point(i).grid_velocity {
                    proj_vel -= gv.dot(vertex.normal);
                }
                let lambda_conv =
                    proj_vel.abs() + state.beta_inc2(i).lower().sqrt() * area;
                let lambda_visc = self.viscous_lambda_point(state, i, area);
                state.add_lambda_inv(i, lambda_conv);
                state.add_lambda_visc(i, lambda_visc);
            }
        }

        // 逐点折算时间步
        let mut min_dt = f64::INFINITY;
        let mut max_dt: f64 = 0.0;
        let mut n_degenerate = 0usize;
        for idx in 0..state.n_point_domain() {
            let i = PointIndex::new(idx);
            let volume = mesh.point(i).volume;
            if volume <= 0.0 {
                state.set_dt(i, 0.0);
                n_degenerate += 1;
                continue;
            }
            let cfl = state.local_cfl(i);
            let mut dt = if state.lambda_inv(i) > 0.0 {
                cfl * volume / state.lambda_inv(i)
            } else {
                self.max_dt
            };
            if state.lambda_visc(i) > 0.0 {
                let dt_visc = cfl * K_V * volume * volume / state.lambda_visc(i);
                dt = dt.min(dt_visc);
            }
            dt = dt.min(self.max_dt);
            state.set_dt(i, dt);
            min_dt = min_dt.min(dt);
            max_dt = max_dt.max(dt);
        }
        if n_degenerate > 0 {
            debug!("退化控制体 {n_degenerate} 个，时间步置零");
        }

        let min_dt = comm.reduce_min(min_dt);
        let max_dt = comm.reduce_max(max_dt);
        let mut global_dt = min_dt;

        match self.time_marching {
            TimeMarching::Steady => {}
            TimeMarching::TimeStepping => {
                // 全局步：unsteady_cfl=0 时直接用配置的物理时间步
                if self.unsteady_cfl == 0.0 {
                    global_dt = self.physical_dt;
                }
                self.physical_dt = global_dt;
                for idx in 0..state.n_point_domain() {
                    state.set_dt(PointIndex::new(idx), global_dt);
                }
            }
            TimeMarching::DualTime => {
                if iteration == 0 && self.unsteady_cfl != 0.0 {
                    // 由当前谱半径重算物理时间步
                    let mut local = f64::INFINITY;
                    for idx in 0..state.n_point_domain() {
                        let i = PointIndex::new(idx);
                        let cfl = state.local_cfl(i);
                        if cfl > 0.0 && state.dt(i) > 0.0 {
                            local = local.min(self.unsteady_cfl * state.dt(i) / cfl);
                        }
                    }
                    self.physical_dt = comm.reduce_min(local);
                }
                if !self.implicit {
                    // 显式内迭代的伪时间步不得超过物理步的 2/3
                    let cap = (2.0 / 3.0) * self.physical_dt;
                    for idx in 0..state.n_point_domain() {
                        let i = PointIndex::new(idx);
                        let dt = state.dt(i).min(cap);
                        state.set_dt(i, dt);
                    }
                }
            }
        }

        Ok(TimeStepInfo {
            min_dt,
            max_dt,
            global_dt,
            physical_dt: self.physical_dt,
        })
    }

    /// 两侧均值的粘性谱半径
    fn viscous_lambda_mean<S: Scalar>(
        &self,
        state: &PointStore<S>,
        i: PointIndex,
        j: PointIndex,
        area: f64,
    ) -> f64 {
        let mu = 0.5
            * (state.laminar_viscosity(i).lower() + state.laminar_viscosity(j).lower());
        let mu_t =
            0.5 * (state.eddy_viscosity(i).lower() + state.eddy_viscosity(j).lower());
        let density = 0.5 * (state.density(i).lower() + state.density(j).lower());
        let mut lambda = (4.0 / 3.0) * (mu + mu_t);
        if self.energy {
            let kt = 0.5
                * (state.thermal_conductivity(i).lower()
                    + state.thermal_conductivity(j).lower());
            let cv =
                0.5 * (state.specific_heat_cv(i).lower() + state.specific_heat_cv(j).lower());
            if cv > 0.0 {
                lambda += kt / cv;
            }
        }
        if density > 0.0 {
            lambda * area * area / density
        } else {
            0.0
        }
    }

    /// 单侧的粘性谱半径
    fn viscous_lambda_point<S: Scalar>(
        &self,
        state: &PointStore<S>,
        i: PointIndex,
        area: f64,
    ) -> f64 {
        let mu = state.laminar_viscosity(i).lower();
        let mu_t = state.eddy_viscosity(i).lower();
        let density = state.density(i).lower();
        let mut lambda = (4.0 / 3.0) * (mu + mu_t);
        if self.energy {
            let kt = state.thermal_conductivity(i).lower();
            let cv = state.specific_heat_cv(i).lower();
            if cv > 0.0 {
                lambda += kt / cv;
            }
        }
        if density > 0.0 {
            lambda * area * area / density
        } else {
            0.0
        }
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeScheme;
    use crate::halo::LocalCollective;
    use af_mesh::{DualMeshBuilder, PointGeometry};
    use glam::DVec3;

    fn two_point_mesh(vol0: f64, vol1: f64) -> DualMesh {
        let mut b = DualMeshBuilder::new(2);
        b.add_point(PointGeometry::interior(DVec3::ZERO, vol0));
        b.add_point(PointGeometry::interior(DVec3::new(1.0, 0.0, 0.0), vol1));
        b.add_edge(
            PointIndex::new(0),
            PointIndex::new(1),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(0.5, 0.0, 0.0),
        );
        b.build().unwrap()
    }

    /// 设置无粘的均匀原始变量：速度 u、β²，其余为零
    fn set_inviscid_state(state: &mut PointStore<f64>, u: f64, beta2: f64) {
        for idx in 0..state.n_point() {
            let i = PointIndex::new(idx);
            let n_dim = state.n_dim();
            let prim = state.primitive_mut(i);
            prim[1] = u;
            prim[n_dim + 2] = 1.0; // 密度
            prim[n_dim + 3] = beta2;
        }
    }

    fn steady_config(cfl: f64) -> SolverConfig {
        SolverConfig {
            cfl,
            energy: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_steady_inviscid_dt() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 2.0);
        set_inviscid_state(&mut state, 3.0, 4.0);

        let mut ctrl = TimeStepController::from_config(&steady_config(2.0));
        let info = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 0)
            .unwrap();

        // 法向 (2,0,0)，面积 2：projvel = 3·2 = 6，λ = 6 + √4·2 = 10
        // dt = CFL·Vol/λ = 2·1/10 = 0.2
        assert!((state.dt(PointIndex::new(0)) - 0.2).abs() < 1e-12);
        assert!((info.min_dt - 0.2).abs() < 1e-12);
        assert!((info.max_dt - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_viscous_limit() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        // 无流动，高粘性：粘性步起限制作用
        for idx in 0..2 {
            let i = PointIndex::new(idx);
            let n_dim = state.n_dim();
            let prim = state.primitive_mut(i);
            prim[n_dim + 2] = 1.0; // 密度
            prim[n_dim + 3] = 1.0; // β²
            prim[n_dim + 4] = 10.0; // μ
        }

        let mut ctrl = TimeStepController::from_config(&steady_config(1.0));
        ctrl.compute(&mesh, &mut state, &LocalCollective, 0).unwrap();

        // λ_inv = √1·2 = 2 → dt_inv = 0.5
        // λ_visc = (4/3)·10·4/1 = 160/3 → dt_visc = 0.25·1/(160/3) = 3/640
        let expect = 0.25 * 3.0 / 160.0;
        assert!((state.dt(PointIndex::new(0)) - expect).abs() < 1e-12);
    }

    #[test]
    fn test_dt_monotone_in_spectral_radii() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut ctrl = TimeStepController::from_config(&SolverConfig {
            cfl: 1.0,
            ..Default::default()
        });
        let comm = LocalCollective;

        // 流速增大 → 对流谱半径增大 → dt 单调减小
        let mut prev = f64::INFINITY;
        for u in [1.0, 2.0, 4.0] {
            let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
            set_inviscid_state(&mut state, u, 1.0);
            let info = ctrl.compute(&mesh, &mut state, &comm, 0).unwrap();
            assert!(info.min_dt < prev);
            prev = info.min_dt;
        }

        // 粘性增大 → 粘性谱半径增大 → dt 单调减小
        prev = f64::INFINITY;
        for mu in [1.0, 10.0, 100.0] {
            let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
            set_inviscid_state(&mut state, 0.0, 1.0);
            for idx in 0..2 {
                let n_dim = 2;
                state.primitive_mut(PointIndex::new(idx))[n_dim + 4] = mu;
            }
            let info = ctrl.compute(&mesh, &mut state, &comm, 0).unwrap();
            assert!(info.min_dt < prev);
            prev = info.min_dt;
        }
    }

    #[test]
    fn test_zero_volume_gets_zero_dt() {
        let mesh = two_point_mesh(0.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        set_inviscid_state(&mut state, 1.0, 1.0);

        let mut ctrl = TimeStepController::from_config(&steady_config(1.0));
        let info = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 0)
            .unwrap();
        assert_eq!(state.dt(PointIndex::new(0)), 0.0);
        // 最小步只统计非退化点
        assert!(info.min_dt > 0.0);
    }

    #[test]
    fn test_max_dt_clip() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1e6);
        set_inviscid_state(&mut state, 1.0, 1.0);

        let config = SolverConfig {
            cfl: 1e6,
            max_dt: 1e-2,
            energy: false,
            ..Default::default()
        };
        let mut ctrl = TimeStepController::from_config(&config);
        ctrl.compute(&mesh, &mut state, &LocalCollective, 0).unwrap();
        assert_eq!(state.dt(PointIndex::new(0)), 1e-2);
    }

    #[test]
    fn test_time_stepping_broadcast() {
        let mesh = two_point_mesh(1.0, 4.0); // 两点体积不同
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        set_inviscid_state(&mut state, 1.0, 1.0);

        let config = SolverConfig {
            time_marching: TimeMarching::TimeStepping,
            unsteady_cfl: 1.0,
            physical_dt: 1.0,
            energy: false,
            ..Default::default()
        };
        let mut ctrl = TimeStepController::from_config(&config);
        let info = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 0)
            .unwrap();
        // 全点取全局最小步
        assert_eq!(state.dt(PointIndex::new(0)), info.global_dt);
        assert_eq!(state.dt(PointIndex::new(1)), info.global_dt);
        assert_eq!(info.global_dt, info.min_dt);
    }

    #[test]
    fn test_time_stepping_fixed_dt() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 1.0);
        set_inviscid_state(&mut state, 1.0, 1.0);

        let config = SolverConfig {
            time_marching: TimeMarching::TimeStepping,
            unsteady_cfl: 0.0,
            physical_dt: 5e-3,
            energy: false,
            ..Default::default()
        };
        let mut ctrl = TimeStepController::from_config(&config);
        let info = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 0)
            .unwrap();
        assert_eq!(info.global_dt, 5e-3);
        assert_eq!(state.dt(PointIndex::new(1)), 5e-3);
    }

    #[test]
    fn test_dual_time_explicit_clip() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 100.0);
        set_inviscid_state(&mut state, 1.0, 1.0);

        let config = SolverConfig {
            time_scheme: TimeScheme::EulerExplicit,
            time_marching: TimeMarching::DualTime,
            unsteady_cfl: 0.0,
            physical_dt: 1e-3,
            cfl: 100.0,
            energy: false,
            ..Default::default()
        };
        let mut ctrl = TimeStepController::from_config(&config);
        ctrl.compute(&mesh, &mut state, &LocalCollective, 1).unwrap();
        let cap = (2.0 / 3.0) * 1e-3;
        assert!(state.dt(PointIndex::new(0)) <= cap + 1e-15);
    }

    #[test]
    fn test_dual_time_recomputes_physical_dt() {
        let mesh = two_point_mesh(1.0, 1.0);
        let mut state: PointStore<f64> = PointStore::new(2, 2, 2, 2.0);
        set_inviscid_state(&mut state, 3.0, 4.0);

        let config = SolverConfig {
            time_marching: TimeMarching::DualTime,
            unsteady_cfl: 4.0,
            physical_dt: 0.0,
            cfl: 2.0,
            energy: false,
            ..Default::default()
        };
        let mut ctrl = TimeStepController::from_config(&config);
        let info = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 0)
            .unwrap();
        // dt = 0.2（见 steady 测试），physical = unsteady_cfl·dt/cfl = 4·0.2/2
        assert!((info.physical_dt - 0.4).abs() < 1e-12);

        // 后续内迭代不再重算
        set_inviscid_state(&mut state, 30.0, 4.0);
        let info2 = ctrl
            .compute(&mesh, &mut state, &LocalCollective, 1)
            .unwrap();
        assert!((info2.physical_dt - 0.4).abs() < 1e-12);
    }
}
