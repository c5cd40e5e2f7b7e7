// crates/af_mesh/src/element.rs

//! 原始单元类型与连接表
//!
//! 每种单元类型携带编译期确定的面表（面→局部节点，外法向按
//! 右手定则指向单元外）与节点邻接表（节点→共棱节点）。
//! [`Element::change_orientation`] 翻转节点顺序使雅可比行列式变号，
//! 用于修复读入网格中手性错误的单元。

use serde::{Deserialize, Serialize};

use af_foundation::{ensure, AfError, AfResult};

// ========================================================================
// 单元类型
// ========================================================================

/// 原始单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// 二节点线单元（二维网格的边界面）
    Line,
    /// 三节点三角形
    Triangle,
    /// 四节点四边形
    Quadrilateral,
    /// 四节点四面体
    Tetrahedron,
    /// 五节点金字塔
    Pyramid,
    /// 六节点三棱柱
    Prism,
    /// 八节点六面体
    Hexahedron,
}

impl ElementKind {
    /// 节点数
    pub const fn n_nodes(self) -> usize {
        match self {
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
            Self::Tetrahedron => 4,
            Self::Pyramid => 5,
            Self::Prism => 6,
            Self::Hexahedron => 8,
        }
    }

    /// 面数
    pub const fn n_faces(self) -> usize {
        match self {
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
            Self::Tetrahedron => 4,
            Self::Pyramid => 5,
            Self::Prism => 5,
            Self::Hexahedron => 6,
        }
    }

    /// 空间维数
    pub const fn n_dim(self) -> usize {
        match self {
            Self::Line => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            _ => 3,
        }
    }

    /// 面→局部节点表
    ///
    /// 三维单元各面的节点按外法向右手定则排列。
    pub const fn faces(self) -> &'static [&'static [usize]] {
        match self {
            Self::Line => &[&[0], &[1]],
            Self::Triangle => &[&[0, 1], &[1, 2], &[2, 0]],
            Self::Quadrilateral => &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]],
            Self::Tetrahedron => &[&[0, 2, 1], &[0, 1, 3], &[0, 3, 2], &[1, 2, 3]],
            Self::Pyramid => &[
                &[0, 3, 2, 1],
                &[4, 3, 0],
                &[4, 0, 1],
                &[2, 3, 4],
                &[1, 2, 4],
            ],
            Self::Prism => &[
                &[3, 4, 1, 0],
                &[5, 2, 1, 4],
                &[2, 5, 3, 0],
                &[0, 1, 2],
                &[5, 4, 3],
            ],
            Self::Hexahedron => &[
                &[0, 1, 5, 4],
                &[1, 2, 6, 5],
                &[2, 3, 7, 6],
                &[3, 0, 4, 7],
                &[0, 3, 2, 1],
                &[4, 5, 6, 7],
            ],
        }
    }

    /// 节点→共棱邻居节点表
    ///
    /// 对偶网格构建时由此枚举每条棱，生成以棱中点为界面的内部边。
    pub const fn neighbors(self) -> &'static [&'static [usize]] {
        match self {
            Self::Line => &[&[1], &[0]],
            Self::Triangle => &[&[1, 2], &[2, 0], &[0, 1]],
            Self::Quadrilateral => &[&[1, 3], &[2, 0], &[3, 1], &[0, 2]],
            Self::Tetrahedron => &[&[1, 2, 3], &[0, 2, 3], &[0, 1, 3], &[0, 1, 2]],
            Self::Pyramid => &[
                &[1, 3, 4],
                &[0, 2, 4],
                &[1, 3, 4],
                &[0, 2, 4],
                &[0, 1, 2, 3],
            ],
            Self::Prism => &[
                &[1, 2, 3],
                &[0, 2, 4],
                &[0, 1, 5],
                &[0, 4, 5],
                &[1, 3, 5],
                &[2, 3, 4],
            ],
            Self::Hexahedron => &[
                &[1, 3, 4],
                &[0, 2, 5],
                &[1, 3, 6],
                &[0, 2, 7],
                &[0, 5, 7],
                &[1, 4, 6],
                &[2, 5, 7],
                &[3, 4, 6],
            ],
        }
    }

    /// 朝向翻转时交换的局部节点对
    ///
    /// 每对交换等价于一次奇置换，使单元雅可比行列式变号而节点
    /// 集合不变。
    pub const fn orientation_swaps(self) -> &'static [(usize, usize)] {
        match self {
            Self::Line => &[(0, 1)],
            Self::Triangle => &[(0, 2)],
            Self::Quadrilateral => &[(1, 3)],
            Self::Tetrahedron => &[(0, 1)],
            Self::Pyramid => &[(1, 3)],
            Self::Prism => &[(0, 1), (3, 4)],
            Self::Hexahedron => &[(1, 3), (5, 7)],
        }
    }
}

// ========================================================================
// 单元
// ========================================================================

/// 原始单元：类型 + 全局点号列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// 单元类型
    pub kind: ElementKind,
    /// 全局点号（按类型的标准局部编号排列）
    pub nodes: Vec<usize>,
}

impl Element {
    /// 创建单元，校验节点数与节点互异性
    pub fn new(kind: ElementKind, nodes: Vec<usize>) -> AfResult<Self> {
        ensure!(
            nodes.len() == kind.n_nodes(),
            AfError::invalid_mesh(format!(
                "{kind:?} 单元需要 {} 个节点，实际 {}",
                kind.n_nodes(),
                nodes.len()
            ))
        );
        for (a, &na) in nodes.iter().enumerate() {
            for &nb in nodes.iter().skip(a + 1) {
                ensure!(
                    na != nb,
                    AfError::invalid_mesh(format!("{kind:?} 单元含重复节点 {na}"))
                );
            }
        }
        Ok(Self { kind, nodes })
    }

    /// 节点数
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// 翻转单元朝向
    ///
    /// 对局部节点做奇置换，使雅可比行列式变号。两次翻转恢复原状。
    pub fn change_orientation(&mut self) {
        for &(a, b) in self.kind.orientation_swaps() {
            self.nodes.swap(a, b);
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
