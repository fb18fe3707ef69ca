// crates/da_adjoint/src/adjoint/state_info.rs

//! 残差-状态连接关系
//!
//! 每个残差对应若干层状态名列表：第 0 层为本单元，第 1 层为面相邻单元，
//! 依此类推。伴随求解器据此为偏导矩阵预留稀疏结构。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 残差名 -> 分层状态名
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDependencyGraph {
    connections: BTreeMap<String, Vec<Vec<String>>>,
}

impl StateDependencyGraph {
    /// 创建空图
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记残差的分层依赖，已存在时覆盖
    pub fn insert(&mut self, residual: impl Into<String>, levels: Vec<Vec<String>>) {
        self.connections.insert(residual.into(), levels);
    }

    /// 读取残差的分层依赖
    pub fn get(&self, residual: &str) -> Option<&[Vec<String>]> {
        self.connections.get(residual).map(Vec::as_slice)
    }

    /// 是否登记了该残差
    pub fn contains(&self, residual: &str) -> bool {
        self.connections.contains_key(residual)
    }

    /// 残差名（有序）
    pub fn residual_names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// 残差数目
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 依赖层数
    pub fn max_level(&self, residual: &str) -> usize {
        self.get(residual).map_or(0, |levels| levels.len())
    }

    /// 残差依赖的全部状态，按首次出现顺序去重
    pub fn flattened(&self, residual: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.get(residual).into_iter().flatten().flatten() {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    /// 状态 `state` 出现的最深层级
    pub fn deepest_level(&self, residual: &str, state: &str) -> Option<usize> {
        self.get(residual)?
            .iter()
            .rposition(|level| level.iter().any(|s| s == state))
    }
}

/// 字符串列表的便捷构造
pub(crate) fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
