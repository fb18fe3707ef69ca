// crates/da_adjoint/src/parallel/mod.rs

//! 并行支撑
//!
//! - [`comm`]: 分区间归约（串行、进程内线程组）
//! - [`decompose`]: 按单元分配表分解网格并生成分区寻址
//! - [`reconstruct`]: 把分区场重构回全局网格

pub mod comm;
pub mod decompose;
pub mod reconstruct;

pub use comm::{Communicator, SerialCommunicator, ThreadCommunicator, ThreadGroup};
pub use decompose::{decompose, simple_x_split, ProcAddressing, ProcessorMesh};
pub use reconstruct::{FieldReconstructor, ProcFieldSet, ReconstructPar, ReconstructedFields};
