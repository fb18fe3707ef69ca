// crates/da_adjoint/src/mesh/ldu_addressing.rs

//! LDU 寻址
//!
//! 只描述内部面的连接关系：第 `f` 个内部面连接下三角单元
//! `lower_addr[f]`（owner）与上三角单元 `upper_addr[f]`（neighbour），
//! 且 `lower_addr[f] < upper_addr[f]`。
//!
//! 内部面按上三角顺序存储（owner 非降序，同一 owner 内 neighbour 升序），
//! DILU 分解依赖这一顺序。
//!
//! 附带两张派生表：
//! - `owner_start`: 每个单元作为 owner 的面区间起点（CSR 风格，长度 n_cells + 1）
//! - `losort`: 按 neighbour 排序的面索引，用于按行访问下三角系数

use da_foundation::{DaError, DaResult};
use std::hash::{Hash, Hasher};

/// 寻址指纹
///
/// 伪系统记录构造时的指纹，寻址变化后据此判定过期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressingId {
    /// 单元数
    pub n_cells: usize,
    /// 内部面数
    pub n_faces: usize,
    /// 连接关系散列值
    pub checksum: u64,
}

/// LDU 寻址
#[derive(Debug, Clone, PartialEq)]
pub struct LduAddressing {
    n_cells: usize,
    lower_addr: Vec<usize>,
    upper_addr: Vec<usize>,
    owner_start: Vec<usize>,
    losort: Vec<usize>,
    losort_start: Vec<usize>,
    id: AddressingId,
}

impl LduAddressing {
    /// 由 owner/neighbour 列表创建寻址
    ///
    /// # 错误
    ///
    /// - 两个列表长度不一致
    /// - 单元索引越界
    /// - 存在 `lower >= upper` 的面
    /// - 面不是上三角顺序
    pub fn new(n_cells: usize, lower_addr: Vec<usize>, upper_addr: Vec<usize>) -> DaResult<Self> {
        DaError::check_size("upper_addr", lower_addr.len(), upper_addr.len())?;

        let n_faces = lower_addr.len();
        for f in 0..n_faces {
            let (l, u) = (lower_addr[f], upper_addr[f]);
            DaError::check_index("Cell", l, n_cells)?;
            DaError::check_index("Cell", u, n_cells)?;
            if l >= u {
                return Err(DaError::invalid_mesh(format!(
                    "内部面 {f}: owner {l} 必须小于 neighbour {u}"
                )));
            }
            if f > 0 {
                let prev = (lower_addr[f - 1], upper_addr[f - 1]);
                if prev >= (l, u) {
                    return Err(DaError::invalid_mesh(format!(
                        "内部面 {f} 不满足上三角顺序: ({}, {}) 之后为 ({l}, {u})",
                        prev.0, prev.1
                    )));
                }
            }
        }

        let mut owner_start = vec![0usize; n_cells + 1];
        for &l in &lower_addr {
            owner_start[l + 1] += 1;
        }
        for i in 0..n_cells {
            owner_start[i + 1] += owner_start[i];
        }

        // 计数排序，保持同一 neighbour 内的面顺序
        let mut losort_start = vec![0usize; n_cells + 1];
        for &u in &upper_addr {
            losort_start[u + 1] += 1;
        }
        for i in 0..n_cells {
            losort_start[i + 1] += losort_start[i];
        }
        let mut cursor = losort_start.clone();
        let mut losort = vec![0usize; n_faces];
        for (f, &u) in upper_addr.iter().enumerate() {
            losort[cursor[u]] = f;
            cursor[u] += 1;
        }

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        n_cells.hash(&mut hasher);
        lower_addr.hash(&mut hasher);
        upper_addr.hash(&mut hasher);
        let id = AddressingId {
            n_cells,
            n_faces,
            checksum: hasher.finish(),
        };

        Ok(Self {
            n_cells,
            lower_addr,
            upper_addr,
            owner_start,
            losort,
            losort_start,
            id,
        })
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 内部面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.lower_addr.len()
    }

    /// owner 列表
    #[inline]
    pub fn lower_addr(&self) -> &[usize] {
        &self.lower_addr
    }

    /// neighbour 列表
    #[inline]
    pub fn upper_addr(&self) -> &[usize] {
        &self.upper_addr
    }

    /// owner 面区间起点
    #[inline]
    pub fn owner_start(&self) -> &[usize] {
        &self.owner_start
    }

    /// 按 neighbour 排序的面索引
    #[inline]
    pub fn losort(&self) -> &[usize] {
        &self.losort
    }

    /// losort 区间起点
    #[inline]
    pub fn losort_start(&self) -> &[usize] {
        &self.losort_start
    }

    /// 寻址指纹
    #[inline]
    pub fn id(&self) -> AddressingId {
        self.id
    }

    /// 单元 `cell` 的全部面邻居
    pub fn cell_neighbours(&self, cell: usize) -> Vec<usize> {
        let mut result: Vec<usize> = (self.owner_start[cell]..self.owner_start[cell + 1])
            .map(|f| self.upper_addr[f])
            .collect();
        result.extend(
            self.losort[self.losort_start[cell]..self.losort_start[cell + 1]]
                .iter()
                .map(|&f| self.lower_addr[f]),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> LduAddressing {
        let lower: Vec<usize> = (0..n - 1).collect();
        let upper: Vec<usize> = (1..n).collect();
        LduAddressing::new(n, lower, upper).unwrap()
    }

    #[test]
    fn test_chain_addressing() {
        let addr = chain(4);
        assert_eq!(addr.n_cells(), 4);
        assert_eq!(addr.n_faces(), 3);
        assert_eq!(addr.owner_start(), &[0, 1, 2, 3, 3]);
        assert_eq!(addr.losort(), &[0, 1, 2]);
        assert_eq!(addr.cell_neighbours(1), vec![2, 0]);
    }

    #[test]
    fn test_losort_groups_by_neighbour() {
        // 0-1, 0-2, 1-2
        let addr = LduAddressing::new(3, vec![0, 0, 1], vec![1, 2, 2]).unwrap();
        assert_eq!(addr.losort(), &[0, 1, 2]);
        assert_eq!(addr.losort_start(), &[0, 0, 1, 3]);
        let mut n2 = addr.cell_neighbours(2);
        n2.sort_unstable();
        assert_eq!(n2, vec![0, 1]);
    }

    #[test]
    fn test_rejects_lower_triangular_face() {
        assert!(LduAddressing::new(2, vec![1], vec![0]).is_err());
    }

    #[test]
    fn test_rejects_unsorted_faces() {
        assert!(LduAddressing::new(3, vec![1, 0], vec![2, 1]).is_err());
    }

    #[test]
    fn test_id_tracks_connectivity() {
        let a = chain(4);
        let b = chain(4);
        let c = LduAddressing::new(4, vec![0, 0, 2], vec![1, 2, 3]).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}
