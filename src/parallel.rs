use std::future::Future;
use std::sync::Arc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use crate::error::{Result, WorkspaceError};

/// Executes tasks concurrently with a fixed upper bound on in-flight tasks
pub struct ParallelProcessor {
    semaphore: Arc<Semaphore>,
}

impl ParallelProcessor {
    /// Creates a new parallel processor with the specified concurrency limit
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs every task and returns their results in input order
    ///
    /// A task that panics is reported as a `Processing` error in its slot.
    pub async fn process<F, T>(&self, tasks: Vec<F>) -> Vec<Result<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = Arc::clone(&self.semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| WorkspaceError::Processing(e.to_string()))?;
                task.await
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(WorkspaceError::Processing(format!("Task failed: {}", e))),
            })
            .collect()
    }
}
