// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces an updated state plus a
//! list of [`CoreCommand`]s for the IO shell (`engine::runtime::Runtime`),
//! which owns the channels, the executor and Ctrl-C handling.
//!
//! It has no Tokio types and performs no IO, so it is unit tested directly.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    Bootstrap, CoreStep, handle_task_completion, handle_task_progress, handle_task_trigger,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state: scheduler, trigger queue, options and whether the
/// bootstrap run has settled.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
    bootstrap: Bootstrap,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour, queue_length),
            options,
            bootstrap: Bootstrap::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// True once the first run has finished (successfully or not).
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap.done
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, returning commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.scheduler, &mut self.queue, &self.bootstrap, task, reason)
            }
            RuntimeEvent::TaskProgressed { task } => handle_task_progress(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                &mut self.bootstrap,
                task,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                &mut self.bootstrap,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
