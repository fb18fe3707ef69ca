// crates/da_adjoint/src/parallel/comm.rs

//! 分区间归约
//!
//! - [`SerialCommunicator`]: 单分区，归约为恒等
//! - [`ThreadGroup`]: 进程内多线程分区，阻塞式集合通信，
//!   按 rank 顺序求和保证结果与线程调度无关

use std::sync::Arc;

use da_foundation::{DaError, DaResult};
use parking_lot::{Condvar, Mutex};

/// 分区通信接口
pub trait Communicator: Send + Sync {
    /// 本分区编号
    fn rank(&self) -> usize;

    /// 分区总数
    fn n_procs(&self) -> usize;

    /// 全局求和
    fn sum_reduce(&self, value: f64) -> DaResult<f64>;

    /// 全局最大值
    fn max_reduce(&self, value: f64) -> DaResult<f64>;

    /// 是否为主分区
    fn is_master(&self) -> bool {
        self.rank() == 0
    }
}

/// 单分区通信器
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn n_procs(&self) -> usize {
        1
    }

    fn sum_reduce(&self, value: f64) -> DaResult<f64> {
        Ok(value)
    }

    fn max_reduce(&self, value: f64) -> DaResult<f64> {
        Ok(value)
    }
}

#[derive(Debug)]
struct Round {
    slots: Vec<Option<f64>>,
    arrived: usize,
    gathered: Vec<f64>,
    readers_left: usize,
    generation: u64,
}

#[derive(Debug)]
struct Shared {
    n_procs: usize,
    round: Mutex<Round>,
    cv: Condvar,
}

/// 线程组中的一个分区
#[derive(Debug, Clone)]
pub struct ThreadCommunicator {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadCommunicator {
    /// 每个分区提供一个值，返回按 rank 排列的全部值
    ///
    /// 所有分区都必须调用，否则阻塞。
    pub fn all_gather(&self, value: f64) -> Vec<f64> {
        let shared = &*self.shared;
        let mut round = shared.round.lock();

        // 上一轮尚未被全部读取
        while round.readers_left > 0 {
            shared.cv.wait(&mut round);
        }

        round.slots[self.rank] = Some(value);
        round.arrived += 1;
        let generation = round.generation;

        if round.arrived == shared.n_procs {
            round.gathered = round.slots.iter_mut().map(|s| s.take().unwrap_or(0.0)).collect();
            round.arrived = 0;
            round.readers_left = shared.n_procs;
            round.generation += 1;
            shared.cv.notify_all();
        } else {
            while round.generation == generation {
                shared.cv.wait(&mut round);
            }
        }

        let out = round.gathered.clone();
        round.readers_left -= 1;
        if round.readers_left == 0 {
            shared.cv.notify_all();
        }
        out
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.shared.n_procs
    }

    fn sum_reduce(&self, value: f64) -> DaResult<f64> {
        Ok(self.all_gather(value).iter().sum())
    }

    fn max_reduce(&self, value: f64) -> DaResult<f64> {
        Ok(self
            .all_gather(value)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }
}

/// 进程内线程组
#[derive(Debug)]
pub struct ThreadGroup;

impl ThreadGroup {
    /// 创建 `n_procs` 个互连的通信器
    pub fn new(n_procs: usize) -> DaResult<Vec<ThreadCommunicator>> {
        if n_procs == 0 {
            return Err(DaError::communication("线程组至少需要一个分区"));
        }
        let shared = Arc::new(Shared {
            n_procs,
            round: Mutex::new(Round {
                slots: vec![None; n_procs],
                arrived: 0,
                gathered: Vec::new(),
                readers_left: 0,
                generation: 0,
            }),
            cv: Condvar::new(),
        });
        Ok((0..n_procs)
            .map(|rank| ThreadCommunicator {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }

    /// 每个分区在独立线程中运行 `f`，按 rank 顺序返回结果
    pub fn run<T, F>(n_procs: usize, f: F) -> DaResult<Vec<T>>
    where
        T: Send,
        F: Fn(ThreadCommunicator) -> T + Sync,
    {
        let comms = Self::new(n_procs)?;
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .map_err(|_| DaError::communication("分区线程异常退出"))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_is_identity() {
        let comm = SerialCommunicator;
        assert_eq!(comm.sum_reduce(3.5).unwrap(), 3.5);
        assert!(comm.is_master());
    }

    #[test]
    fn test_thread_group_sum_matches_serial() {
        let values = [0.1, 0.2, 0.3, 0.4];
        let results = ThreadGroup::run(4, |comm| {
            comm.sum_reduce(values[comm.rank()]).unwrap()
        })
        .unwrap();
        let serial: f64 = values.iter().sum();
        assert!(results.iter().all(|&r| r == serial));
    }

    #[test]
    fn test_repeated_collectives() {
        let results = ThreadGroup::run(3, |comm| {
            let mut acc = 0.0;
            for round in 0..20 {
                acc += comm.sum_reduce((comm.rank() + round) as f64).unwrap();
            }
            let max = comm.max_reduce(comm.rank() as f64).unwrap();
            (acc, max)
        })
        .unwrap();
        // Σ_round (0+1+2 + 3 round) = 20*3 + 3*190
        for (acc, max) in results {
            assert_eq!(acc, 630.0);
            assert_eq!(max, 2.0);
        }
    }

    #[test]
    fn test_zero_procs_rejected() {
        assert!(ThreadGroup::new(0).is_err());
    }
}
