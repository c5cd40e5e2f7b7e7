// crates/af_solver/src/state.rs

//! 点态解与原始变量存储
//!
//! 全部点态量按 SoA 布局连续存放，点内分量交错。守恒变量与原始
//! 变量对标量类型 `S` 泛型，时间步/谱半径/局部 CFL 是装配的冻结
//! 参数，始终为 `f64`。
//!
//! # 原始变量布局
//!
//! 每点 `n_dim + 9` 个分量，偏移如下（`d = n_dim`）：
//!
//! | 偏移       | 含义           |
//! |-----------|----------------|
//! | 0         | 压力           |
//! | 1..=d     | 速度分量       |
//! | d+1       | 温度           |
//! | d+2       | 密度           |
//! | d+3       | 人工压缩性 β²  |
//! | d+4       | 层流粘性       |
//! | d+5       | 湍流涡粘       |
//! | d+6       | 导热系数       |
//! | d+7       | 定压比热 cp    |
//! | d+8       | 定容比热 cv    |
//!
//! 梯度只对前 `n_dim + 4` 个分量（压力、速度、温度、密度、β²）重构。

use glam::DVec3;
use rayon::prelude::*;

use af_foundation::{PointIndex, Scalar};

// ========================================================================
// 流体模型
// ========================================================================

/// 由守恒变量更新单点原始变量的流体模型
///
/// 返回 `false` 表示该点状态非物理（如负密度/负温度），调用方按点
/// 计数上报，不中止装配。
pub trait FluidModel<S: Scalar>: Send + Sync {
    /// 更新单点原始变量，返回该点状态是否物理
    fn update_primitives(&self, n_dim: usize, solution: &[S], primitive: &mut [S]) -> bool;
}

// ========================================================================
// 点态存储
// ========================================================================

/// SoA 布局的点态解存储
#[derive(Debug, Clone)]
pub struct PointStore<S: Scalar> {
    n_point: usize,
    n_point_domain: usize,
    n_dim: usize,
    n_var: usize,
    n_prim: usize,
    n_prim_grad: usize,

    /// 守恒变量（当前迭代）
    solution: Vec<S>,
    /// 守恒变量（上一时间层，强 Dirichlet 也写在这里）
    solution_old: Vec<S>,
    /// 原始变量
    primitive: Vec<S>,
    /// 原始变量梯度，布局 `[point][prim_grad_var][dim]`
    gradient: Vec<S>,
    /// 梯度限制器
    limiter: Vec<S>,

    /// 对流谱半径累加器
    lambda_inv: Vec<f64>,
    /// 粘性谱半径累加器
    lambda_visc: Vec<f64>,
    /// 局部时间步
    dt: Vec<f64>,
    /// 局部 CFL
    local_cfl: Vec<f64>,
}

impl<S: Scalar> PointStore<S> {
    /// 创建并零初始化
    pub fn new(n_point: usize, n_point_domain: usize, n_dim: usize, initial_cfl: f64) -> Self {
        let n_var = n_dim + 2;
        let n_prim = n_dim + 9;
        let n_prim_grad = n_dim + 4;
        Self {
            n_point,
            n_point_domain,
            n_dim,
            n_var,
            n_prim,
            n_prim_grad,
            solution: vec![S::ZERO; n_point * n_var],
            solution_old: vec![S::ZERO; n_point * n_var],
            primitive: vec![S::ZERO; n_point * n_prim],
            gradient: vec![S::ZERO; n_point * n_prim_grad * n_dim],
            limiter: vec![S::ONE; n_point * n_prim_grad],
            lambda_inv: vec![0.0; n_point],
            lambda_visc: vec![0.0; n_point],
            dt: vec![0.0; n_point],
            local_cfl: vec![initial_cfl; n_point],
        }
    }

    // --------------------------------------------------------------------
    // 维度信息
    // --------------------------------------------------------------------

    /// 总点数（含 halo）
    #[inline]
    pub fn n_point(&self) -> usize {
        self.n_point
    }

    /// 域内点数
    #[inline]
    pub fn n_point_domain(&self) -> usize {
        self.n_point_domain
    }

    /// 空间维数
    #[inline]
    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    /// 守恒变量数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 原始变量数
    #[inline]
    pub fn n_prim(&self) -> usize {
        self.n_prim
    }

    /// 参与梯度重构的原始变量数
    #[inline]
    pub fn n_prim_grad(&self) -> usize {
        self.n_prim_grad
    }

    // --------------------------------------------------------------------
    // 守恒变量
    // --------------------------------------------------------------------

    /// 单点守恒变量切片
    #[inline]
    pub fn solution(&self, i: PointIndex) -> &[S] {
        let o = i.get() * self.n_var;
        &self.solution[o..o + self.n_var]
    }

    /// 单点守恒变量可变切片
    #[inline]
    pub fn solution_mut(&mut self, i: PointIndex) -> &mut [S] {
        let o = i.get() * self.n_var;
        &mut self.solution[o..o + self.n_var]
    }

    /// 单点上一时间层守恒变量切片
    #[inline]
    pub fn solution_old(&self, i: PointIndex) -> &[S] {
        let o = i.get() * self.n_var;
        &self.solution_old[o..o + self.n_var]
    }

    /// 写上一时间层的单个分量（强 Dirichlet 值也写在这里）
    #[inline]
    pub fn set_solution_old(&mut self, i: PointIndex, var: usize, value: S) {
        debug_assert!(var < self.n_var);
        self.solution_old[i.get() * self.n_var + var] = value;
    }

    /// 将当前解整体拷贝为上一时间层
    pub fn push_solution_old(&mut self) {
        self.solution_old.copy_from_slice(&self.solution);
    }

    /// 写速度强约束：当前解与上一时间层同时置为给定速度
    pub fn set_velocity_old(&mut self, i: PointIndex, velocity: &[S]) {
        debug_assert_eq!(velocity.len(), self.n_dim);
        let o = i.get() * self.n_var;
        for (d, &v) in velocity.iter().enumerate() {
            self.solution[o + 1 + d] = v;
            self.solution_old[o + 1 + d] = v;
        }
    }

    // --------------------------------------------------------------------
    // 原始变量
    // --------------------------------------------------------------------

    /// 单点原始变量切片
    #[inline]
    pub fn primitive(&self, i: PointIndex) -> &[S] {
        let o = i.get() * self.n_prim;
        &self.primitive[o..o + self.n_prim]
    }

    /// 单点原始变量可变切片
    #[inline]
    pub fn primitive_mut(&mut self, i: PointIndex) -> &mut [S] {
        let o = i.get() * self.n_prim;
        &mut self.primitive[o..o + self.n_prim]
    }

    /// 压力
    #[inline]
    pub fn pressure(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim]
    }

    /// 速度分量
    #[inline]
    pub fn velocity(&self, i: PointIndex, dim: usize) -> S {
        debug_assert!(dim < self.n_dim);
        self.primitive[i.get() * self.n_prim + 1 + dim]
    }

    /// 温度
    #[inline]
    pub fn temperature(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 1]
    }

    /// 密度
    #[inline]
    pub fn density(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 2]
    }

    /// 人工压缩性 β²
    #[inline]
    pub fn beta_inc2(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 3]
    }

    /// 层流粘性
    #[inline]
    pub fn laminar_viscosity(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 4]
    }

    /// 湍流涡粘
    #[inline]
    pub fn eddy_viscosity(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 5]
    }

    /// 导热系数
    #[inline]
    pub fn thermal_conductivity(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 6]
    }

    /// 定压比热
    #[inline]
    pub fn specific_heat_cp(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 7]
    }

    /// 定容比热
    #[inline]
    pub fn specific_heat_cv(&self, i: PointIndex) -> S {
        self.primitive[i.get() * self.n_prim + self.n_dim + 8]
    }

    /// 速度在给定（面积加权）法向上的投影 `v·n`
    pub fn projected_velocity(&self, i: PointIndex, normal: DVec3) -> S {
        let o = i.get() * self.n_prim + 1;
        let mut p = S::ZERO;
        for d in 0..self.n_dim {
            p += self.primitive[o + d] * S::lift(normal[d]);
        }
        p
    }

    /// 由流体模型并行更新全部点的原始变量，返回非物理点数
    pub fn set_primitive_variables(&mut self, model: &dyn FluidModel<S>) -> usize {
        let n_dim = self.n_dim;
        self.primitive
            .par_chunks_mut(self.n_prim)
            .zip(self.solution.par_chunks(self.n_var))
            .map(|(prim, sol)| usize::from(!model.update_primitives(n_dim, sol, prim)))
            .sum()
    }

    // --------------------------------------------------------------------
    // 梯度与限制器
    // --------------------------------------------------------------------

    /// 原始变量梯度分量
    #[inline]
    pub fn gradient(&self, i: PointIndex, var: usize, dim: usize) -> S {
        debug_assert!(var < self.n_prim_grad && dim < self.n_dim);
        self.gradient[(i.get() * self.n_prim_grad + var) * self.n_dim + dim]
    }

    /// 写梯度分量
    #[inline]
    pub fn set_gradient(&mut self, i: PointIndex, var: usize, dim: usize, value: S) {
        debug_assert!(var < self.n_prim_grad && dim < self.n_dim);
        self.gradient[(i.get() * self.n_prim_grad + var) * self.n_dim + dim] = value;
    }

    /// 单点梯度切片（`n_prim_grad × n_dim`，按变量主序）
    #[inline]
    pub fn gradient_slice(&self, i: PointIndex) -> &[S] {
        let stride = self.n_prim_grad * self.n_dim;
        let o = i.get() * stride;
        &self.gradient[o..o + stride]
    }

    /// 限制器分量
    #[inline]
    pub fn limiter(&self, i: PointIndex, var: usize) -> S {
        debug_assert!(var < self.n_prim_grad);
        self.limiter[i.get() * self.n_prim_grad + var]
    }

    // --------------------------------------------------------------------
    // 谱半径与时间步
    // --------------------------------------------------------------------

    /// 将两类谱半径累加器清零
    pub fn reset_lambdas(&mut self) {
        self.lambda_inv.fill(0.0);
        self.lambda_visc.fill(0.0);
    }

    /// 累加对流谱半径
    #[inline]
    pub fn add_lambda_inv(&mut self, i: PointIndex, value: f64) {
        self.lambda_inv[i.get()] += value;
    }

    /// 累加粘性谱半径
    #[inline]
    pub fn add_lambda_visc(&mut self, i: PointIndex, value: f64) {
        self.lambda_visc[i.get()] += value;
    }

    /// 覆盖对流谱半径（halo 解包用）
    #[inline]
    pub fn set_lambda_inv(&mut self, i: PointIndex, value: f64) {
        self.lambda_inv[i.get()] = value;
    }

    /// 覆盖粘性谱半径（halo 解包用）
    #[inline]
    pub fn set_lambda_visc(&mut self, i: PointIndex, value: f64) {
        self.lambda_visc[i.get()] = value;
    }

    /// 对流谱半径
    #[inline]
    pub fn lambda_inv(&self, i: PointIndex) -> f64 {
        self.lambda_inv[i.get()]
    }

    /// 粘性谱半径
    #[inline]
    pub fn lambda_visc(&self, i: PointIndex) -> f64 {
        self.lambda_visc[i.get()]
    }

    /// 局部时间步
    #[inline]
    pub fn dt(&self, i: PointIndex) -> f64 {
        self.dt[i.get()]
    }

    /// 写局部时间步
    #[inline]
    pub fn set_dt(&mut self, i: PointIndex, value: f64) {
        self.dt[i.get()] = value;
    }

    /// 局部 CFL
    #[inline]
    pub fn local_cfl(&self, i: PointIndex) -> f64 {
        self.local_cfl[i.get()]
    }

    /// 写局部 CFL
    #[inline]
    pub fn set_local_cfl(&mut self, i: PointIndex, value: f64) {
        self.local_cfl[i.get()] = value;
    }
}

// ========================================================================
// 测试
// ========================================================================
