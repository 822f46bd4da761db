use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::screening::ScreeningContext;
use crate::worker::task::{ScreeningTask, TaskResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of OS threads screening tasks from a shared queue.
pub struct WorkerPool {
    task_sender: Sender<ScreeningTask>,
    result_receiver: Receiver<TaskResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers (at least one). The task queue holds
    /// `queue_capacity` tasks, so a whole job can be submitted up front.
    pub fn new(
        context: Arc<ScreeningContext>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let capacity = queue_capacity.max(worker_count);
        let (task_sender, task_receiver) = bounded::<ScreeningTask>(capacity);
        let (result_sender, result_receiver) = bounded::<TaskResult>(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_context = Arc::clone(&context);

            let handle = thread::Builder::new()
                .name(format!("screener-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, task_rx, result_tx, shutdown_flag, worker_context);
                })
                .map_err(|e| {
                    shutdown.store(true, Ordering::Relaxed);
                    WorkerError::SpawnFailed(e.to_string())
                })?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            task_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, task: ScreeningTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.task_sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks for the next result. `None` once every worker has exited.
    pub fn recv_result(&self) -> Option<TaskResult> {
        self.result_receiver.recv().ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn shutdown(&self) {
        debug!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Joins every worker after the queue drains.
    pub fn wait(self) {
        // Dropping the sender lets workers exit once the queue is empty
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        debug!("All workers have stopped");
    }

    /// Stops the pool without joining. Workers finish the task in hand and
    /// exit; their results are discarded.
    pub fn abandon(self) {
        self.shutdown();
        warn!(
            "Abandoning {} worker(s) with tasks still in flight",
            self.workers.len()
        );
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<ScreeningTask>,
    result_sender: Sender<TaskResult>,
    shutdown: Arc<AtomicBool>,
    context: Arc<ScreeningContext>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(task) => {
                let row = task.row();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| context.screen(&task.record)));

                let result = match outcome {
                    Ok(result) => TaskResult::success(result),
                    Err(payload) => {
                        let reason = panic_message(payload.as_ref());
                        error!("Worker {} panicked screening row {}: {}", worker_id, row, reason);
                        TaskResult::failure(row, reason)
                    }
                };

                if let Err(e) = result_sender.send(result) {
                    debug!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
