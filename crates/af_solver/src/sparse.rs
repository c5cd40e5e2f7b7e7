// crates/af_solver/src/sparse.rs

//! 块稀疏雅可比矩阵与残差向量
//!
//! 雅可比按块 CSR 存储：每个非零块是 `n_var × n_var` 的行主序稠密
//! 小块，稀疏模式由对偶网格的点-点邻接决定（对角块 + 每条内部边
//! 的两个非对角块）。边到块槽位的映射在构建期缓存，装配热路径不做
//! 查找。

use af_foundation::{AfError, AfResult, EdgeIndex, PointIndex, Scalar};
use af_mesh::DualMesh;

// ========================================================================
// 残差向量
// ========================================================================

/// 按点分块的残差向量
#[derive(Debug, Clone)]
pub struct ResidualVector<S: Scalar> {
    n_var: usize,
    data: Vec<S>,
}

impl<S: Scalar> ResidualVector<S> {
    /// 创建并零初始化
    pub fn new(n_point: usize, n_var: usize) -> Self {
        Self {
            n_var,
            data: vec![S::ZERO; n_point * n_var],
        }
    }

    /// 每点变量数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 点数
    #[inline]
    pub fn n_point(&self) -> usize {
        self.data.len() / self.n_var
    }

    /// 全部清零
    pub fn set_zero(&mut self) {
        self.data.fill(S::ZERO);
    }

    /// 单点残差块
    #[inline]
    pub fn block(&self, i: PointIndex) -> &[S] {
        let o = i.get() * self.n_var;
        &self.data[o..o + self.n_var]
    }

    /// 块累加
    #[inline]
    pub fn add_block(&mut self, i: PointIndex, values: &[S]) {
        let o = i.get() * self.n_var;
        for (dst, &v) in self.data[o..o + self.n_var].iter_mut().zip(values) {
            *dst += v;
        }
    }

    /// 块累减
    #[inline]
    pub fn subtract_block(&mut self, i: PointIndex, values: &[S]) {
        let o = i.get() * self.n_var;
        for (dst, &v) in self.data[o..o + self.n_var].iter_mut().zip(values) {
            *dst -= v;
        }
    }

    /// 单点块清零
    #[inline]
    pub fn set_block_zero(&mut self, i: PointIndex) {
        let o = i.get() * self.n_var;
        self.data[o..o + self.n_var].fill(S::ZERO);
    }

    /// 单个分量清零
    #[inline]
    pub fn set_entry_zero(&mut self, i: PointIndex, var: usize) {
        debug_assert!(var < self.n_var);
        self.data[i.get() * self.n_var + var] = S::ZERO;
    }

    /// 读单个分量
    #[inline]
    pub fn entry(&self, i: PointIndex, var: usize) -> S {
        self.data[i.get() * self.n_var + var]
    }
}

// ========================================================================
// 块稀疏矩阵
// ========================================================================

/// 块 CSR 稀疏矩阵
#[derive(Debug, Clone)]
pub struct SparseBlockMatrix<S: Scalar> {
    n_point: usize,
    n_var: usize,
    /// 块大小（`n_var²`）
    block_len: usize,
    /// 行前缀（单位：块）
    row_ptr: Vec<usize>,
    /// 列号（按行内升序）
    col_ind: Vec<usize>,
    /// 块数据，行主序小块连续存放
    values: Vec<S>,
    /// 每行对角块槽位
    diag_pos: Vec<usize>,
    /// 每条内部边的 (i,j) 与 (j,i) 块槽位
    edge_pos: Vec<(usize, usize)>,
}

impl<S: Scalar> SparseBlockMatrix<S> {
    /// 由对偶网格邻接构建稀疏模式
    pub fn from_mesh(mesh: &DualMesh, n_var: usize) -> AfResult<Self> {
        let n_point = mesh.n_points();
        let mut adjacency: Vec<Vec<usize>> = (0..n_point).map(|i| vec![i]).collect();
        for edge in mesh.edges() {
            let (i, j) = edge.points;
            adjacency[i.get()].push(j.get());
            adjacency[j.get()].push(i.get());
        }

        let mut row_ptr = Vec::with_capacity(n_point + 1);
        let mut col_ind = Vec::new();
        row_ptr.push(0);
        for row in adjacency.iter_mut() {
            row.sort_unstable();
            row.dedup();
            col_ind.extend_from_slice(row);
            row_ptr.push(col_ind.len());
        }

        let block_len = n_var * n_var;
        let values = vec![S::ZERO; col_ind.len() * block_len];

        let find = |row: usize, col: usize| -> AfResult<usize> {
            let range = &col_ind[row_ptr[row]..row_ptr[row + 1]];
            match range.binary_search(&col) {
                Ok(k) => Ok(row_ptr[row] + k),
                Err(_) => Err(AfError::internal(format!(
                    "稀疏模式缺少块 ({row}, {col})"
                ))),
            }
        };

        let mut diag_pos = Vec::with_capacity(n_point);
        for i in 0..n_point {
            diag_pos.push(find(i, i)?);
        }

        let mut edge_pos = Vec::with_capacity(mesh.n_edges());
        for edge in mesh.edges() {
            let (i, j) = (edge.points.0.get(), edge.points.1.get());
            edge_pos.push((find(i, j)?, find(j, i)?));
        }

        Ok(Self {
            n_point,
            n_var,
            block_len,
            row_ptr,
            col_ind,
            values,
            diag_pos,
            edge_pos,
        })
    }

    /// 每点变量数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 点数
    #[inline]
    pub fn n_point(&self) -> usize {
        self.n_point
    }

    /// 全部块清零
    pub fn set_zero(&mut self) {
        self.values.fill(S::ZERO);
    }

    #[inline]
    fn block_mut_at(&mut self, pos: usize) -> &mut [S] {
        let o = pos * self.block_len;
        &mut self.values[o..o + self.block_len]
    }

    /// 按槽位读块
    #[inline]
    fn block_at(&self, pos: usize) -> &[S] {
        let o = pos * self.block_len;
        &self.values[o..o + self.block_len]
    }

    /// 查找 (row, col) 块槽位
    fn find(&self, row: usize, col: usize) -> Option<usize> {
        let range = &self.col_ind[self.row_ptr[row]..self.row_ptr[row + 1]];
        range
            .binary_search(&col)
            .ok()
            .map(|k| self.row_ptr[row] + k)
    }

    /// 读 (row, col) 块（稀疏模式外返回 None）
    pub fn block(&self, row: PointIndex, col: PointIndex) -> Option<&[S]> {
        self.find(row.get(), col.get()).map(|pos| self.block_at(pos))
    }

    fn add_at(&mut self, pos: usize, block: &[S]) {
        for (dst, &v) in self.block_mut_at(pos).iter_mut().zip(block) {
            *dst += v;
        }
    }

    fn sub_at(&mut self, pos: usize, block: &[S]) {
        for (dst, &v) in self.block_mut_at(pos).iter_mut().zip(block) {
            *dst -= v;
        }
    }

    /// 对角块累加
    #[inline]
    pub fn add_block_diag(&mut self, i: PointIndex, block: &[S]) {
        let pos = self.diag_pos[i.get()];
        self.add_at(pos, block);
    }

    /// 对角块累减
    #[inline]
    pub fn subtract_block_diag(&mut self, i: PointIndex, block: &[S]) {
        let pos = self.diag_pos[i.get()];
        self.sub_at(pos, block);
    }

    /// 对流通量的边散布：`A(i,i) += Ji`，`A(i,j) += Jj`，
    /// `A(j,i) -= Ji`，`A(j,j) -= Jj`
    pub fn update_blocks(&mut self, edge: EdgeIndex, jac_i: &[S], jac_j: &[S]) {
        let (pos_ij, pos_ji) = self.edge_pos[edge.get()];
        let row_i = self.col_ind[pos_ji]; // (j,i) 块的列号即 i
        let row_j = self.col_ind[pos_ij];
        let diag_i = self.diag_pos[row_i];
        let diag_j = self.diag_pos[row_j];
        self.add_at(diag_i, jac_i);
        self.add_at(pos_ij, jac_j);
        self.sub_at(pos_ji, jac_i);
        self.sub_at(diag_j, jac_j);
    }

    /// 粘性通量的边散布（符号相反）：`A(i,i) -= Ji`，`A(i,j) -= Jj`，
    /// `A(j,i) += Ji`，`A(j,j) += Jj`
    pub fn update_blocks_sub(&mut self, edge: EdgeIndex, jac_i: &[S], jac_j: &[S]) {
        let (pos_ij, pos_ji) = self.edge_pos[edge.get()];
        let row_i = self.col_ind[pos_ji];
        let row_j = self.col_ind[pos_ij];
        let diag_i = self.diag_pos[row_i];
        let diag_j = self.diag_pos[row_j];
        self.sub_at(diag_i, jac_i);
        self.sub_at(pos_ij, jac_j);
        self.add_at(pos_ji, jac_i);
        self.add_at(diag_j, jac_j);
    }

    /// 删除一个标量方程行：该点第 `var` 行在本行全部块中清零，
    /// 对角块的对角元置一。用于强 Dirichlet 约束。
    pub fn delete_vals_row(&mut self, i: PointIndex, var: usize) {
        debug_assert!(var < self.n_var);
        let row = i.get();
        let n_var = self.n_var;
        for pos in self.row_ptr[row]..self.row_ptr[row + 1] {
            let o = pos * self.block_len + var * n_var;
            self.values[o..o + n_var].fill(S::ZERO);
        }
        let diag = self.diag_pos[row];
        self.values[diag * self.block_len + var * n_var + var] = S::ONE;
    }

    /// 矩阵-向量乘 `y = A·x`（Krylov 迭代与测试用）
    pub fn multiply(&self, x: &[S], y: &mut [S]) -> AfResult<()> {
        let n = self.n_point * self.n_var;
        AfError::check_size("乘法输入向量", n, x.len())?;
        AfError::check_size("乘法输出向量", n, y.len())?;
        let n_var = self.n_var;
        for row in 0..self.n_point {
            let yo = row * n_var;
            y[yo..yo + n_var].fill(S::ZERO);
            for pos in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_ind[pos];
                let block = self.block_at(pos);
                let xo = col * n_var;
                for r in 0..n_var {
                    let mut acc = S::ZERO;
                    for c in 0..n_var {
                        acc += block[r * n_var + c] * x[xo + c];
                    }
                    y[yo + r] += acc;
                }
            }
        }
        Ok(())
    }
}

// ========================================================================
// 测试
// ========================================================================
