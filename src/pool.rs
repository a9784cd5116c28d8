//! The worker pool that drives a [`TaskGraph`] to completion.
//!
//! Lifecycle of [`invoke`]:
//! 1. spawn one thread per worker, each owning a fresh kernel workspace;
//! 2. wait until every worker registered with the queue;
//! 3. push the top-left tile;
//! 4. wait for the completion event raised by the bottom-right tile;
//! 5. close the queue and join all workers.
//!
//! A panicking worker aborts the run: the completion event is marked aborted
//! and the queue closed so nobody waits forever, and the panic is resumed on
//! the calling thread.

use crate::context::{RunContext, RunState};
use crate::graph::TaskGraph;
use crate::kernel::TileKernel;
use crate::queue::ReadyQueue;
use crate::stats::WorkerStats;
use crate::worker::Worker;
use crate::{Error, Result};
use log::{debug, error};
use std::{io, thread};

/// Runs all tiles of `graph` on `threads` workers.
///
/// Returns the workspace and counters of every worker, in worker order.
/// The graph's dependency counters must be freshly initialized.
pub fn invoke<K: TileKernel>(
    graph: &TaskGraph,
    ctx: &RunContext,
    kernel: &K,
    threads: usize,
) -> Result<Vec<(K::Workspace, WorkerStats)>> {
    invoke_with(graph, ctx, kernel, threads, |id| {
        Ok(thread::Builder::new().name(format!("wavefront-{id}")))
    })
}

/// [`invoke`], with the thread builder of worker `id` given by `builder`.
fn invoke_with<K: TileKernel>(
    graph: &TaskGraph,
    ctx: &RunContext,
    kernel: &K,
    threads: usize,
    builder: impl Fn(usize) -> io::Result<thread::Builder>,
) -> Result<Vec<(K::Workspace, WorkerStats)>> {
    if threads == 0 {
        return Err(Error::invalid("threads", "must be >= 1"));
    }
    assert_eq!(
        (graph.cols(), graph.rows()),
        (ctx.tiling.cols(), ctx.tiling.rows()),
        "Task graph does not match the tiling"
    );
    assert_eq!(ctx.completion.state(), RunState::Running, "Run context reused");

    let queue = &ReadyQueue::new();
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for id in 0..threads {
            let mut worker = Worker::new(graph, ctx, queue, kernel);
            let spawned = builder(id).and_then(|b| {
                b.spawn_scoped(scope, move || {
                    let _abort = scopeguard::guard_on_unwind((), |()| {
                        ctx.completion.abort();
                        queue.close();
                    });
                    queue.register();
                    worker.run();
                    worker.into_parts()
                })
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!("Failed to spawn worker {id} of {threads}: {e}");
                    // Release the workers that did start; the scope joins them.
                    queue.close();
                    return Err(Error::Spawn(e));
                }
            }
        }

        queue.open(threads);
        debug!("{threads} workers registered, starting at tile {}", graph.coord(graph.first()));
        assert!(queue.push(graph.first()), "Queue closed before the run started");

        let state = ctx.completion.wait();
        queue.close();

        let mut parts = Vec::with_capacity(threads);
        for handle in handles {
            match handle.join() {
                Ok(p) => parts.push(p),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        assert_eq!(state, RunState::Done);
        debug_assert!(queue.is_empty());
        Ok(parts)
    })
}
