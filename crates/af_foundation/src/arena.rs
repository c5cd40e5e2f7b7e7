// crates/af_foundation/src/arena.rs

//! 按 (标记, 顶点, 分量) 索引的扁平化存储
//!
//! 边界耦合数据（如共轭传热的温度/热流/导热系数）按标记分组、按
//! 顶点排列、按分量交错，用单块连续内存持有，偏移表定位。避免
//! 逐标记逐顶点的嵌套 `Vec` 带来的碎片化分配。

use crate::error::{AfError, AfResult};

/// 扁平化的按标记分组存储
///
/// 逻辑形状为 `[marker][vertex][component]`，物理上是一个 `Vec<T>`
/// 加标记前缀偏移表。各标记的顶点数可以不同，分量数全局一致。
#[derive(Debug, Clone)]
pub struct MarkerArena<T: Copy> {
    /// 标记前缀偏移（长度 n_marker+1，单位：元素个数）
    offsets: Vec<usize>,
    /// 各标记的顶点数
    vertex_counts: Vec<usize>,
    /// 每顶点分量数
    n_comp: usize,
    /// 连续数据块
    data: Vec<T>,
}

impl<T: Copy> MarkerArena<T> {
    /// 创建并以 `fill` 初始化
    pub fn new(vertex_counts: &[usize], n_comp: usize, fill: T) -> Self {
        let mut offsets = Vec::with_capacity(vertex_counts.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &nv in vertex_counts {
            total += nv * n_comp;
            offsets.push(total);
        }
        Self {
            offsets,
            vertex_counts: vertex_counts.to_vec(),
            n_comp,
            data: vec![fill; total],
        }
    }

    /// 标记数
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.vertex_counts.len()
    }

    /// 指定标记的顶点数
    #[inline]
    pub fn vertex_count(&self, marker: usize) -> usize {
        self.vertex_counts.get(marker).copied().unwrap_or(0)
    }

    /// 每顶点分量数
    #[inline]
    pub fn component_count(&self) -> usize {
        self.n_comp
    }

    /// 计算扁平偏移（带边界检查）
    fn idx(&self, marker: usize, vertex: usize, comp: usize) -> AfResult<usize> {
        AfError::check_index("标记", marker, self.vertex_counts.len())?;
        AfError::check_index("顶点", vertex, self.vertex_counts[marker])?;
        AfError::check_index("分量", comp, self.n_comp)?;
        Ok(self.offsets[marker] + vertex * self.n_comp + comp)
    }

    /// 读取一个分量
    pub fn get(&self, marker: usize, vertex: usize, comp: usize) -> AfResult<T> {
        let i = self.idx(marker, vertex, comp)?;
        Ok(self.data[i])
    }

    /// 写入一个分量
    pub fn set(&mut self, marker: usize, vertex: usize, comp: usize, value: T) -> AfResult<()> {
        let i = self.idx(marker, vertex, comp)?;
        self.data[i] = value;
        Ok(())
    }

    /// 全部填充为同一值
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let arena = MarkerArena::new(&[3, 0, 2], 4, 0.0f64);
        assert_eq!(arena.marker_count(), 3);
        assert_eq!(arena.vertex_count(0), 3);
        assert_eq!(arena.vertex_count(1), 0);
        assert_eq!(arena.vertex_count(2), 2);
        assert_eq!(arena.component_count(), 4);
    }

    #[test]
    fn test_get_set() {
        let mut arena = MarkerArena::new(&[2, 3], 2, 0.0f64);
        arena.set(1, 2, 1, 7.5).unwrap();
        assert_eq!(arena.get(1, 2, 1).unwrap(), 7.5);
        assert_eq!(arena.get(0, 0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_bounds() {
        let mut arena = MarkerArena::new(&[2], 3, 0i32);
        assert!(arena.get(1, 0, 0).is_err());
        assert!(arena.get(0, 2, 0).is_err());
        assert!(arena.get(0, 0, 3).is_err());
        assert!(arena.set(0, 1, 2, 1).is_ok());
    }

    #[test]
    fn test_fill() {
        let mut arena = MarkerArena::new(&[1, 1], 1, 0.0f64);
        arena.fill(3.0);
        assert_eq!(arena.get(0, 0, 0).unwrap(), 3.0);
        assert_eq!(arena.get(1, 0, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_empty_marker_skipped_in_offsets() {
        let arena = MarkerArena::new(&[0, 4], 2, 1u8);
        assert!(arena.get(0, 0, 0).is_err());
        assert_eq!(arena.get(1, 3, 1).unwrap(), 1);
    }
}
