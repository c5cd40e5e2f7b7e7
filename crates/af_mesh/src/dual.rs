// crates/af_mesh/src/dual.rs

//! 以点为中心的对偶网格
//!
//! 装配引擎工作在对偶（中值）网格上：每个原始网格点对应一个对偶
//! 控制体，相邻点之间的对偶界面聚合为一条内部边。边界由标记分组，
//! 每个标记顶点携带面积加权外法向与壁面法向邻点。
//!
//! # 不变量
//!
//! 1. 点编号 `0..n_points_domain` 为域内点，其后为 halo 点
//! 2. 每条内部边只存一次，两端点按编号小者在前
//! 3. 边法向为面积加权方向，由小编号端指向大编号端
//! 4. 边界顶点法向指向计算域外

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use af_foundation::{ensure, AfError, AfResult, MarkerIndex, PointIndex};

// ========================================================================
// 几何实体
// ========================================================================

/// 对偶控制体几何
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGeometry {
    /// 点坐标（二维网格 z 分量为零）
    pub coord: DVec3,
    /// 控制体体积（二维为面积）
    pub volume: f64,
    /// 是否为本进程拥有的域内点（false 表示 halo 点）
    pub is_domain: bool,
    /// 动网格下的网格速度
    pub grid_velocity: Option<DVec3>,
}

impl PointGeometry {
    /// 静止网格域内点
    pub fn interior(coord: DVec3, volume: f64) -> Self {
        Self {
            coord,
            volume,
            is_domain: true,
            grid_velocity: None,
        }
    }

    /// halo 点
    pub fn halo(coord: DVec3, volume: f64) -> Self {
        Self {
            coord,
            volume,
            is_domain: false,
            grid_velocity: None,
        }
    }
}

/// 内部对偶边
///
/// 两个相邻控制体之间全部对偶界面的聚合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// 端点（编号小者在前）
    pub points: (PointIndex, PointIndex),
    /// 面积加权法向，由 `points.0` 指向 `points.1`，模长为界面面积
    pub normal: DVec3,
    /// 界面形心
    pub centroid: DVec3,
}

impl Edge {
    /// 界面面积
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal.length()
    }

    /// 单位法向
    #[inline]
    pub fn unit_normal(&self) -> DVec3 {
        self.normal / self.normal.length()
    }
}

/// 边界标记顶点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryVertex {
    /// 所在对偶点
    pub point: PointIndex,
    /// 面积加权外法向（指向域外），模长为边界面面积
    pub normal: DVec3,
    /// 壁面法向方向上的最近内部邻点（用于单侧梯度）
    pub normal_neighbor: PointIndex,
}

impl BoundaryVertex {
    /// 边界面面积
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal.length()
    }
}

/// 边界标记：命名的边界顶点组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerPatch {
    /// 标记名（与配置中的标记配置对应）
    pub name: String,
    /// 该标记的全部顶点
    pub vertices: Vec<BoundaryVertex>,
}

/// 周期边界配对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicPair {
    /// 施主标记
    pub donor: MarkerIndex,
    /// 受主标记
    pub receiver: MarkerIndex,
    /// 施主到受主的旋转矩阵（平移周期为单位阵）
    pub rotation: DMat3,
}

// ========================================================================
// 对偶网格
// ========================================================================

/// 分布式对偶网格的本进程分块
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualMesh {
    n_dim: usize,
    n_points_domain: usize,
    points: Vec<PointGeometry>,
    edges: Vec<Edge>,
    markers: Vec<MarkerPatch>,
    periodic_pairs: Vec<PeriodicPair>,
}

impl DualMesh {
    /// 空间维数（2 或 3）
    #[inline]
    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    /// 总点数（含 halo）
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// 域内点数
    #[inline]
    pub fn n_points_domain(&self) -> usize {
        self.n_points_domain
    }

    /// 内部边数
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// 标记数
    #[inline]
    pub fn n_markers(&self) -> usize {
        self.markers.len()
    }

    /// 点几何
    #[inline]
    pub fn point(&self, i: PointIndex) -> &PointGeometry {
        &self.points[i.get()]
    }

    /// 点几何（可变）
    #[inline]
    pub fn point_mut(&mut self, i: PointIndex) -> &mut PointGeometry {
        &mut self.points[i.get()]
    }

    /// 内部边
    #[inline]
    pub fn edge(&self, e: af_foundation::EdgeIndex) -> &Edge {
        &self.edges[e.get()]
    }

    /// 全部内部边
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// 全部点几何
    #[inline]
    pub fn points(&self) -> &[PointGeometry] {
        &self.points
    }

    /// 标记
    #[inline]
    pub fn marker(&self, m: MarkerIndex) -> &MarkerPatch {
        &self.markers[m.get()]
    }

    /// 全部标记
    #[inline]
    pub fn markers(&self) -> &[MarkerPatch] {
        &self.markers
    }

    /// 按名称查找标记
    pub fn marker_by_name(&self, name: &str) -> Option<MarkerIndex> {
        self.markers
            .iter()
            .position(|m| m.name == name)
            .map(MarkerIndex::new)
    }

    /// 周期配对
    #[inline]
    pub fn periodic_pairs(&self) -> &[PeriodicPair] {
        &self.periodic_pairs
    }

    /// 两点间距离
    #[inline]
    pub fn distance(&self, i: PointIndex, j: PointIndex) -> f64 {
        (self.points[j.get()].coord - self.points[i.get()].coord).length()
    }
}

// ========================================================================
// 构建器
// ========================================================================

/// 对偶网格构建器
///
/// 逐项添加后由 [`DualMeshBuilder::build`] 校验拓扑不变量。
#[derive(Debug)]
pub struct DualMeshBuilder {
    n_dim: usize,
    points: Vec<PointGeometry>,
    edges: Vec<Edge>,
    markers: Vec<MarkerPatch>,
    periodic_pairs: Vec<PeriodicPair>,
}

impl DualMeshBuilder {
    /// 创建指定维数的构建器
    pub fn new(n_dim: usize) -> Self {
        Self {
            n_dim,
            points: Vec::new(),
            edges: Vec::new(),
            markers: Vec::new(),
            periodic_pairs: Vec::new(),
        }
    }

    /// 添加点，返回其索引
    pub fn add_point(&mut self, geometry: PointGeometry) -> PointIndex {
        let idx = PointIndex::new(self.points.len());
        self.points.push(geometry);
        idx
    }

    /// 添加内部边（端点自动归一为小编号在前，法向随之取反）
    pub fn add_edge(&mut self, i: PointIndex, j: PointIndex, normal: DVec3, centroid: DVec3) {
        let (points, normal) = if i.get() <= j.get() {
            ((i, j), normal)
        } else {
            ((j, i), -normal)
        };
        self.edges.push(Edge {
            points,
            normal,
            centroid,
        });
    }

    /// 添加边界标记，返回其索引
    pub fn add_marker(&mut self, name: impl Into<String>, vertices: Vec<BoundaryVertex>) -> MarkerIndex {
        let idx = MarkerIndex::new(self.markers.len());
        self.markers.push(MarkerPatch {
            name: name.into(),
            vertices,
        });
        idx
    }

    /// 添加周期配对
    pub fn add_periodic_pair(&mut self, donor: MarkerIndex, receiver: MarkerIndex, rotation: DMat3) {
        self.periodic_pairs.push(PeriodicPair {
            donor,
            receiver,
            rotation,
        });
    }

    /// 校验并产出对偶网格
    ///
    /// 检查：维数合法，halo 点排在域内点之后，边端点互异且在界内、
    /// 小编号在前，标记顶点与法向邻点在界内，周期配对引用合法标记。
    pub fn build(self) -> AfResult<DualMesh> {
        ensure!(
            self.n_dim == 2 || self.n_dim == 3,
            AfError::invalid_mesh(format!("不支持的空间维数 {}", self.n_dim))
        );

        let n_points = self.points.len();
        let n_points_domain = self.points.iter().take_while(|p| p.is_domain).count();
        for (i, p) in self.points.iter().enumerate().skip(n_points_domain) {
            ensure!(
                !p.is_domain,
                AfError::invalid_mesh(format!("域内点 {i} 排在 halo 点之后"))
            );
        }

        for (e, edge) in self.edges.iter().enumerate() {
            let (i, j) = edge.points;
            ensure!(
                i.get() < j.get(),
                AfError::invalid_mesh(format!("边 {e} 端点顺序非法: {i} !< {j}"))
            );
            AfError::check_index("点", j.get(), n_points)?;
        }

        for patch in &self.markers {
            for v in &patch.vertices {
                AfError::check_index("点", v.point.get(), n_points)?;
                AfError::check_index("点", v.normal_neighbor.get(), n_points)?;
                ensure!(
                    v.point != v.normal_neighbor,
                    AfError::invalid_mesh(format!(
                        "标记 {} 顶点 {} 的法向邻点指向自身",
                        patch.name, v.point
                    ))
                );
            }
        }

        for pair in &self.periodic_pairs {
            AfError::check_index("标记", pair.donor.get(), self.markers.len())?;
            AfError::check_index("标记", pair.receiver.get(), self.markers.len())?;
        }

        Ok(DualMesh {
            n_dim: self.n_dim,
            n_points_domain,
            points: self.points,
            edges: self.edges,
            markers: self.markers,
            periodic_pairs: self.periodic_pairs,
        })
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn two_point_mesh() -> DualMeshBuilder {
        let mut b = DualMeshBuilder::new(2);
        b.add_point(PointGeometry::interior(DVec3::ZERO, 1.0));
        b.add_point(PointGeometry::interior(DVec3::new(1.0, 0.0, 0.0), 1.0));
        b
    }

    #[test]
    fn test_edge_normalization() {
        let mut b = two_point_mesh();
        // 反序添加：应自动翻转
        b.add_edge(
            PointIndex::new(1),
            PointIndex::new(0),
            DVec3::new(-2.0, 0.0, 0.0),
            DVec3::new(0.5, 0.0, 0.0),
        );
        let mesh = b.build().unwrap();
        let edge = &mesh.edges()[0];
        assert_eq!(edge.points.0.get(), 0);
        assert_eq!(edge.points.1.get(), 1);
        assert_eq!(edge.normal.x, 2.0);
        assert_eq!(edge.area(), 2.0);
    }

    #[test]
    fn test_domain_before_halo() {
        let mut b = DualMeshBuilder::new(2);
        b.add_point(PointGeometry::halo(DVec3::ZERO, 1.0));
        b.add_point(PointGeometry::interior(DVec3::ONE, 1.0));
        assert!(b.build().is_err());
    }

    #[test]
    fn test_halo_counting() {
        let mut b = two_point_mesh();
        b.add_point(PointGeometry::halo(DVec3::new(2.0, 0.0, 0.0), 1.0));
        let mesh = b.build().unwrap();
        assert_eq!(mesh.n_points(), 3);
        assert_eq!(mesh.n_points_domain(), 2);
    }

    #[test]
    fn test_edge_out_of_bounds() {
        let mut b = two_point_mesh();
        b.add_edge(
            PointIndex::new(0),
            PointIndex::new(5),
            DVec3::X,
            DVec3::ZERO,
        );
        assert!(b.build().is_err());
    }

    #[test]
    fn test_marker_lookup() {
        let mut b = two_point_mesh();
        let m = b.add_marker(
            "wall",
            vec![BoundaryVertex {
                point: PointIndex::new(0),
                normal: DVec3::new(0.0, -1.0, 0.0),
                normal_neighbor: PointIndex::new(1),
            }],
        );
        let mesh = b.build().unwrap();
        assert_eq!(mesh.marker_by_name("wall"), Some(m));
        assert_eq!(mesh.marker_by_name("inlet"), None);
        assert_eq!(mesh.marker(m).vertices.len(), 1);
    }

    #[test]
    fn test_normal_neighbor_self_rejected() {
        let mut b = two_point_mesh();
        b.add_marker(
            "wall",
            vec![BoundaryVertex {
                point: PointIndex::new(0),
                normal: DVec3::Y,
                normal_neighbor: PointIndex::new(0),
            }],
        );
        assert!(b.build().is_err());
    }

    #[test]
    fn test_invalid_dim() {
        assert!(DualMeshBuilder::new(4).build().is_err());
    }

    #[test]
    fn test_distance() {
        let b = two_point_mesh();
        let mesh = b.build().unwrap();
        assert_eq!(mesh.distance(PointIndex::new(0), PointIndex::new(1)), 1.0);
    }
}
