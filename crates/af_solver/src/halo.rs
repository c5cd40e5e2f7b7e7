// crates/af_solver/src/halo.rs

//! 两阶段 halo 交换与集合归约
//!
//! 分区边界的 halo 点由拥有进程更新后传播。交换分两个阶段：
//! [`HaloExchanger::initiate`] 打包发送缓冲并投递，返回票据；
//! 对应的 `complete_*` 以票据等待、校验并解包到接收点。发起与
//! 完成之间可以穿插本地计算以隐藏通信延迟。
//!
//! 传输层抽象为 [`HaloChannel`]，单进程/测试用 [`LoopbackChannel`]。
//! 票据的类别或缓冲区大小与完成端不一致是致命错误
//! （[`af_foundation::AfError::CommMismatch`]）。
//!
//! 跨周期边界的矢量分量在解包时按链路旋转矩阵旋转。

use glam::{DMat3, DVec3};

use af_foundation::{ensure, AfError, AfResult, PointIndex, Scalar};

use crate::state::PointStore;

// ========================================================================
// 交换类别
// ========================================================================

/// halo 交换的数据类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloKind {
    /// 守恒变量
    Solution,
    /// 原始变量
    Primitive,
    /// 控制体体积
    Volume,
    /// 点邻居数
    NeighborCount,
    /// 谱半径（对流 + 粘性）
    SpectralRadius,
}

impl HaloKind {
    /// 每点分量数
    pub fn n_components(self, n_dim: usize) -> usize {
        match self {
            Self::Solution => n_dim + 2,
            Self::Primitive => n_dim + 9,
            Self::Volume | Self::NeighborCount => 1,
            Self::SpectralRadius => 2,
        }
    }
}

impl std::fmt::Display for HaloKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Solution => "Solution",
            Self::Primitive => "Primitive",
            Self::Volume => "Volume",
            Self::NeighborCount => "NeighborCount",
            Self::SpectralRadius => "SpectralRadius",
        };
        write!(f, "{name}")
    }
}

// ========================================================================
// 链路与传输层
// ========================================================================

/// 一条 halo 链路：发送点列表、接收点列表与可选旋转
///
/// 发送第 k 个点的数据写入接收第 k 个点，两列表等长。
#[derive(Debug, Clone)]
pub struct HaloLink {
    /// 发送点（本进程域内点）
    pub send_points: Vec<PointIndex>,
    /// 接收点（本进程 halo 点）
    pub recv_points: Vec<PointIndex>,
    /// 周期旋转（矢量分量解包时应用；None 表示恒等）
    pub rotation: Option<DMat3>,
}

/// 一次已发起交换的票据
///
/// 不可克隆：一次发起恰好对应一次完成。
#[derive(Debug)]
pub struct HaloTicket {
    kind: HaloKind,
    n_comp: usize,
    id: u64,
}

impl HaloTicket {
    /// 交换类别
    #[inline]
    pub fn kind(&self) -> HaloKind {
        self.kind
    }
}

/// halo 传输层
///
/// `post` 投递打包好的发送缓冲（外层按链路），`wait` 阻塞到对应
/// 接收缓冲可用。实现负责票据与缓冲的配对。
pub trait HaloChannel {
    /// 投递发送缓冲，返回票据
    fn post(&mut self, kind: HaloKind, n_comp: usize, payload: Vec<Vec<f64>>)
        -> AfResult<HaloTicket>;

    /// 等待票据对应的接收缓冲
    fn wait(&mut self, ticket: &HaloTicket) -> AfResult<Vec<Vec<f64>>>;
}

/// 单进程回环传输：发送缓冲原样作为接收缓冲返回
///
/// 周期边界自耦合与测试场景用。
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    next_id: u64,
    pending: Vec<(u64, HaloKind, Vec<Vec<f64>>)>,
}

impl LoopbackChannel {
    /// 创建空回环通道
    pub fn new() -> Self {
        Self::default()
    }
}

impl HaloChannel for LoopbackChannel {
    fn post(
        &mut self,
        kind: HaloKind,
        n_comp: usize,
        payload: Vec<Vec<f64>>,
    ) -> AfResult<HaloTicket> {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push((id, kind, payload));
        Ok(HaloTicket { kind, n_comp, id })
    }

    fn wait(&mut self, ticket: &HaloTicket) -> AfResult<Vec<Vec<f64>>> {
        let pos = self
            .pending
            .iter()
            .position(|(id, _, _)| *id == ticket.id)
            .ok_or_else(|| {
                AfError::comm_mismatch(format!("待完成交换 {}", ticket.kind), "无对应投递")
            })?;
        let (_, kind, payload) = self.pending.swap_remove(pos);
        ensure!(
            kind == ticket.kind,
            AfError::comm_mismatch(ticket.kind.to_string(), kind.to_string())
        );
        Ok(payload)
    }
}

// ========================================================================
// 交换器
// ========================================================================

/// halo 交换器：按链路打包/解包点态数据
#[derive(Debug, Clone)]
pub struct HaloExchanger {
    links: Vec<HaloLink>,
    n_dim: usize,
}

impl HaloExchanger {
    /// 创建交换器，校验链路自洽
    pub fn new(n_dim: usize, links: Vec<HaloLink>) -> AfResult<Self> {
        for (k, link) in links.iter().enumerate() {
            ensure!(
                link.send_points.len() == link.recv_points.len(),
                AfError::invalid_mesh(format!(
                    "链路 {k} 收发点数不等: {} != {}",
                    link.send_points.len(),
                    link.recv_points.len()
                ))
            );
        }
        Ok(Self { links, n_dim })
    }

    /// 链路数
    #[inline]
    pub fn n_links(&self) -> usize {
        self.links.len()
    }

    /// 发起点态状态交换（Solution/Primitive/SpectralRadius）
    ///
    /// 发送缓冲以 `f64` 打包（[`Scalar::lower`]，导数分量不传输）。
    pub fn initiate<S: Scalar>(
        &self,
        kind: HaloKind,
        state: &PointStore<S>,
        channel: &mut dyn HaloChannel,
    ) -> AfResult<HaloTicket> {
        let n_comp = kind.n_components(self.n_dim);
        let mut payload = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let mut buf = Vec::with_capacity(link.send_points.len() * n_comp);
            for &p in &link.send_points {
                match kind {
                    HaloKind::Solution => {
                        buf.extend(state.solution(p).iter().map(|v| v.lower()));
                    }
                    HaloKind::Primitive => {
                        buf.extend(state.primitive(p).iter().map(|v| v.lower()));
                    }
                    HaloKind::SpectralRadius => {
                        buf.push(state.lambda_inv(p));
                        buf.push(state.lambda_visc(p));
                    }
                    HaloKind::Volume | HaloKind::NeighborCount => {
                        return Err(AfError::comm_mismatch(
                            "点态状态类别",
                            kind.to_string(),
                        ));
                    }
                }
            }
            payload.push(buf);
        }
        channel.post(kind, n_comp, payload)
    }

    /// 发起标量场交换（Volume/NeighborCount，每点一个 `f64`）
    pub fn initiate_raw(
        &self,
        kind: HaloKind,
        values: &[f64],
        channel: &mut dyn HaloChannel,
    ) -> AfResult<HaloTicket> {
        let n_comp = kind.n_components(self.n_dim);
        ensure!(
            n_comp == 1,
            AfError::comm_mismatch("标量类别", kind.to_string())
        );
        let mut payload = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let buf: Vec<f64> = link.send_points.iter().map(|p| values[p.get()]).collect();
            payload.push(buf);
        }
        channel.post(kind, n_comp, payload)
    }

    /// 完成点态状态交换，解包到接收点
    ///
    /// 周期链路的速度分量按旋转矩阵旋转；票据类别与期望不符或
    /// 缓冲区大小不匹配是致命错误。
    pub fn complete_into_state<S: Scalar>(
        &self,
        expected: HaloKind,
        ticket: HaloTicket,
        state: &mut PointStore<S>,
        channel: &mut dyn HaloChannel,
    ) -> AfResult<()> {
        ensure!(
            ticket.kind == expected,
            AfError::comm_mismatch(expected.to_string(), ticket.kind.to_string())
        );
        let n_comp = ticket.n_comp;
        let payload = channel.wait(&ticket)?;
        AfError::check_size("halo 链路缓冲", self.links.len(), payload.len())?;

        for (link, buf) in self.links.iter().zip(&payload) {
            AfError::check_size(
                "halo 接收缓冲",
                link.recv_points.len() * n_comp,
                buf.len(),
            )?;
            for (k, &p) in link.recv_points.iter().enumerate() {
                let src = &buf[k * n_comp..(k + 1) * n_comp];
                match expected {
                    HaloKind::Solution => {
                        let sol = state.solution_mut(p);
                        for (dst, &v) in sol.iter_mut().zip(src) {
                            *dst = S::lift(v);
                        }
                        if let Some(rot) = link.rotation {
                            rotate_components(state.solution_mut(p), 1, self.n_dim, rot);
                        }
                    }
                    HaloKind::Primitive => {
                        let prim = state.primitive_mut(p);
                        for (dst, &v) in prim.iter_mut().zip(src) {
                            *dst = S::lift(v);
                        }
                        if let Some(rot) = link.rotation {
                            rotate_components(state.primitive_mut(p), 1, self.n_dim, rot);
                        }
                    }
                    HaloKind::SpectralRadius => {
                        // 累加器直接覆盖为拥有进程的值
                        state.set_lambda_inv(p, src[0]);
                        state.set_lambda_visc(p, src[1]);
                    }
                    HaloKind::Volume | HaloKind::NeighborCount => {
                        return Err(AfError::comm_mismatch(
                            "点态状态类别",
                            expected.to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// 完成标量场交换，解包到 `values` 的接收点槽位
    pub fn complete_into_raw(
        &self,
        expected: HaloKind,
        ticket: HaloTicket,
        values: &mut [f64],
        channel: &mut dyn HaloChannel,
    ) -> AfResult<()> {
        ensure!(
            ticket.kind == expected,
            AfError::comm_mismatch(expected.to_string(), ticket.kind.to_string())
        );
        let payload = channel.wait(&ticket)?;
        AfError::check_size("halo 链路缓冲", self.links.len(), payload.len())?;
        for (link, buf) in self.links.iter().zip(&payload) {
            AfError::check_size("halo 接收缓冲", link.recv_points.len(), buf.len())?;
            for (&p, &v) in link.recv_points.iter().zip(buf) {
                values[p.get()] = v;
            }
        }
        Ok(())
    }
}

/// 将切片中 `[offset, offset + n_dim)` 的矢量分量按矩阵旋转
fn rotate_components<S: Scalar>(data: &mut [S], offset: usize, n_dim: usize, rot: DMat3) {
    let mut v = DVec3::ZERO;
    for d in 0..n_dim {
        v[d] = data[offset + d].lower();
    }
    let r = rot * v;
    for d in 0..n_dim {
        data[offset + d] = S::lift(r[d]);
    }
}

// ========================================================================
// 集合归约
// ========================================================================

/// 跨进程集合归约
///
/// 时间步控制等全局判据通过该 trait 归约，单进程实现为恒等。
pub trait Collective {
    /// 全局最小
    fn reduce_min(&self, value: f64) -> f64;
    /// 全局最大
    fn reduce_max(&self, value: f64) -> f64;
    /// 全局求和
    fn reduce_sum(&self, value: f64) -> f64;
    /// 全局整数求和
    fn reduce_sum_usize(&self, value: usize) -> usize;
}

/// 单进程集合归约（恒等）
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCollective;

impl Collective for LocalCollective {
    #[inline]
    fn reduce_min(&self, value: f64) -> f64 {
        value
    }

    #[inline]
    fn reduce_max(&self, value: f64) -> f64 {
        value
    }

    #[inline]
    fn reduce_sum(&self, value: f64) -> f64 {
        value
    }

    #[inline]
    fn reduce_sum_usize(&self, value: usize) -> usize {
        value
    }
}

// ========================================================================
// 测试
// ========================================================================
