//! Bounded worker thread pool for job execution

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::trace;

pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// Fixed-size pool of worker threads consuming tasks from a shared queue
///
/// Job callbacks run here so a slow callback delays at most one worker,
/// never the scheduler's timing loop.
pub(crate) struct WorkerPool {
    sender: Option<mpsc::Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("aria-worker-{index}"))
                    .spawn(move || loop {
                        let task = {
                            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
                            guard.recv()
                        };
                        match task {
                            Ok(task) => {
                                trace!(worker = index, "Running scheduled task");
                                task();
                            }
                            // Channel closed: the pool is shutting down
                            Err(_) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Task> {
        self.sender
            .as_ref()
            .expect("worker pool already shut down")
            .clone()
    }

    pub(crate) fn shutdown(&mut self) {
        // Dropping the sender closes the channel; workers drain and exit
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
