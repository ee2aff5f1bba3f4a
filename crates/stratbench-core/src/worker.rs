//! Worker pool for running independent cells in parallel.
//!
//! Workers pop cells from a shared async_channel, run them through the
//! executor, and send results back. A cell never leaves the worker that
//! picked it up, so its provider calls stay sequential.

use crate::executor::StrategyExecutor;
use crate::types::{BenchmarkResult, Cell};
use async_channel::{Receiver, Sender};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct WorkerPool {
    work_tx: Sender<Cell>,
    result_rx: mpsc::UnboundedReceiver<BenchmarkResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(concurrency: usize, executor: Arc<StrategyExecutor>) -> Self {
        let (work_tx, work_rx) = async_channel::unbounded();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        let workers = (0..concurrency.max(1))
            .map(|id| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let executor = executor.clone();
                tokio::spawn(async move {
                    worker_loop(id as u64, work_rx, result_tx, executor).await;
                })
            })
            .collect();

        Self {
            work_tx,
            result_rx,
            workers,
        }
    }

    /// Queue every cell, then close the queue so workers exit once it drains.
    pub async fn submit_all(&self, cells: Vec<Cell>) {
        for cell in cells {
            // Unbounded channel - send never fails unless closed
            let _ = self.work_tx.send(cell).await;
        }
        self.work_tx.close();
    }

    /// Receive the next result, or `None` once every worker has exited.
    pub async fn recv(&mut self) -> Option<BenchmarkResult> {
        self.result_rx.recv().await
    }

    /// Wait for workers to finish.
    pub async fn shutdown(self) {
        self.work_tx.close();
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!("worker task ended abnormally: {e}");
            }
        }
    }
}

async fn worker_loop(
    id: u64,
    work_rx: Receiver<Cell>,
    result_tx: mpsc::UnboundedSender<BenchmarkResult>,
    executor: Arc<StrategyExecutor>,
) {
    info!(worker_id = id, "Worker started");

    while let Ok(cell) = work_rx.recv().await {
        debug!(
            worker_id = id,
            cell = cell.index,
            strategy = %cell.policy.name,
            model = %cell.model.name,
            task = %cell.task.id,
            "Processing cell"
        );
        let result = executor.execute_cell(&cell).await;
        if result_tx.send(result).is_err() {
            warn!(worker_id = id, "Result channel closed");
            break;
        }
    }

    info!(worker_id = id, "Worker stopped");
}
