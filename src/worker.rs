//! Execution of ready tiles by a single worker.
//!
//! A [`Worker`] owns one kernel workspace for its whole lifetime and lends it
//! to every tile it executes, so tasks never need a workspace pointer of their
//! own. It can be driven without threads by calling [`Worker::execute`]
//! directly.

use crate::context::{RunContext, RunState};
use crate::graph::{TaskGraph, TaskId};
use crate::kernel::TileKernel;
use crate::queue::ReadyQueue;
use crate::stats::WorkerStats;
use crate::tiling::TileCoord;
use log::trace;
use smallvec::SmallVec;

pub struct Worker<'r, 'a, K: TileKernel> {
    graph: &'r TaskGraph,
    ctx: &'r RunContext<'a>,
    queue: &'r ReadyQueue,
    kernel: &'r K,
    workspace: K::Workspace,
    stats: WorkerStats,
    batch: SmallVec<[TaskId; 16]>,
    coords: SmallVec<[TileCoord; 16]>,
}

impl<'r, 'a, K: TileKernel> Worker<'r, 'a, K> {
    pub fn new(
        graph: &'r TaskGraph,
        ctx: &'r RunContext<'a>,
        queue: &'r ReadyQueue,
        kernel: &'r K,
    ) -> Self {
        Self::with_workspace(graph, ctx, queue, kernel, kernel.workspace(ctx))
    }

    pub fn with_workspace(
        graph: &'r TaskGraph,
        ctx: &'r RunContext<'a>,
        queue: &'r ReadyQueue,
        kernel: &'r K,
        workspace: K::Workspace,
    ) -> Self {
        Self {
            graph,
            ctx,
            queue,
            kernel,
            workspace,
            stats: WorkerStats::default(),
            batch: SmallVec::new(),
            coords: SmallVec::new(),
        }
    }

    pub fn workspace(&self) -> &K::Workspace {
        &self.workspace
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn into_parts(self) -> (K::Workspace, WorkerStats) {
        (self.workspace, self.stats)
    }

    /// Executes tasks until the queue is closed and drained.
    pub fn run(&mut self) {
        while let Some(id) = self.queue.pop() {
            self.execute(id);
        }
    }

    /// Runs the ready task `id`, possibly together with other ready tasks
    /// pulled from the queue, then releases their successors.
    pub fn execute(&mut self, id: TaskId) {
        let pending = self.graph.task(id).pending();
        assert!(
            pending == 0,
            "Tile {} executed with {pending} unfinished predecessors",
            self.graph.coord(id)
        );

        self.form_batch(id);
        let width = self.ctx.simd_width();
        if self.batch.len() == 1 {
            self.kernel
                .run_scalar(self.ctx, self.graph.coord(id), &mut self.workspace);
            self.stats.scalar_runs += 1;
        } else {
            assert_eq!(self.batch.len(), width);
            self.coords.clear();
            self.coords
                .extend(self.batch.iter().map(|&id| self.graph.coord(id)));
            trace!("SIMD batch {:?}", self.coords);
            self.kernel
                .run_simd(self.ctx, &self.coords, &mut self.workspace);
            self.stats.simd_batches += 1;
            self.stats.simd_tiles += width;
        }
        self.stats.tiles += self.batch.len();

        for &id in &self.batch {
            self.finish(id);
        }
    }

    /// Starts a batch with `id`. Under a SIMD policy of width `W`, adds
    /// exactly `W-1` more ready tasks if that many are queued, and none
    /// otherwise.
    fn form_batch(&mut self, id: TaskId) {
        self.batch.clear();
        self.batch.push(id);
        if self.ctx.policy.batches() {
            let _lock = self.ctx.lock_batch();
            self.queue
                .try_pop_exact(self.ctx.simd_width() - 1, &mut self.batch);
        }
    }

    /// Resolves the successors of a computed task, enqueueing those that
    /// became ready, and raises the completion event for the last tile.
    fn finish(&self, id: TaskId) {
        let task = self.graph.task(id);
        for succ in task.successors() {
            if self.graph.task(succ).decrement() == 0 && !self.queue.push(succ) {
                // Only an aborted run closes the queue before the last tile.
                assert_eq!(
                    self.ctx.completion.state(),
                    RunState::Aborted,
                    "Tile {} became ready after the queue was closed",
                    self.graph.coord(succ)
                );
            }
        }
        if task.is_last() {
            trace!("Last tile {} finished", task.coord);
            self.ctx.completion.signal();
        }
    }
}
