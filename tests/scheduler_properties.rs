// tests/scheduler_properties.rs

use std::collections::HashSet;

use proptest::prelude::*;

use assetdag::dag::{Pipeline, Scheduler, TaskNode, TaskRunState};
use assetdag::engine::TaskOutcome;
use assetdag::stage::names;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn pipeline_strategy(max_tasks: usize) -> impl Strategy<Value = Pipeline> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = Pipeline::builder();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let deps: HashSet<usize> = if i == 0 {
                    HashSet::new()
                } else {
                    potential_deps.into_iter().map(|d| d % i).collect()
                };
                builder = builder
                    .task(TaskNode::new(format!("task_{i}")).after(deps.into_iter().map(|d| format!("task_{d}"))));
            }
            builder.build().expect("generated pipeline is acyclic")
        })
    })
}

/// Complete dispatched tasks FIFO until the scheduler goes idle or nothing
/// is left to complete. Returns the number of completions.
fn drain(
    scheduler: &mut Scheduler,
    mut executing: Vec<String>,
    failing: &HashSet<String>,
) -> Result<usize, TestCaseError> {
    let mut steps = 0;
    let max_steps = 1000;

    while !scheduler.is_idle() && steps < max_steps {
        if executing.is_empty() {
            // Stuck is only acceptable when every pending task is waiting on
            // a dependency that cannot be satisfied in this run.
            for t in scheduler.tasks_in_current_run() {
                if let Some(TaskRunState::Pending) = scheduler.run_state_of(&t) {
                    let satisfied = scheduler.deps_satisfied(&t).unwrap_or(false);
                    prop_assert!(!satisfied, "{t} is Pending with satisfied deps but was not scheduled");
                }
            }
            break;
        }

        steps += 1;
        let task = executing.remove(0);
        let outcome = if failing.contains(&task) {
            TaskOutcome::Failed(format!("{task} failed"))
        } else {
            TaskOutcome::Success
        };
        executing.extend(scheduler.handle_completion(&task, outcome).into_iter().map(|t| t.name));
    }

    prop_assert!(steps < max_steps, "simulation did not terminate");
    Ok(steps)
}

proptest! {
    #[test]
    fn scheduler_eventually_settles(
        pipeline in pipeline_strategy(10),
        triggers in proptest::collection::vec(0..10usize, 1..5),
        failing_indices in proptest::collection::vec(0..10usize, 0..5),
    ) {
        let mut scheduler = Scheduler::from_pipeline(&pipeline);
        let task_names: Vec<String> = scheduler.task_names().map(|s| s.to_string()).collect();

        let failing: HashSet<String> = failing_indices
            .iter()
            .filter(|&&i| i < task_names.len())
            .map(|&i| task_names[i].clone())
            .collect();

        let mut executing = Vec::new();
        for &i in triggers.iter().filter(|&&i| i < task_names.len()) {
            executing.extend(scheduler.handle_trigger(&task_names[i]).into_iter().map(|t| t.name));
        }

        drain(&mut scheduler, executing, &failing)?;
    }

    #[test]
    fn standard_pipeline_always_finishes_its_first_run(
        failing in proptest::sample::subsequence(
            vec![names::CLEAN, names::HTML, names::STYLES, names::SCRIPTS, names::ASSETS],
            0..=5,
        ),
    ) {
        let pipeline = Pipeline::standard(true).unwrap();
        let mut scheduler = Scheduler::from_pipeline(&pipeline);
        let failing: HashSet<String> = failing.into_iter().map(String::from).collect();

        scheduler.start_new_run();
        let mut executing = Vec::new();
        for task in pipeline.initial_triggers() {
            executing.extend(scheduler.handle_trigger(&task).into_iter().map(|t| t.name));
        }

        // The dev session only reports progress; model that here.
        let mut steps = 0;
        while !scheduler.is_idle() && steps < 100 {
            steps += 1;
            let Some(task) = (!executing.is_empty()).then(|| executing.remove(0)) else {
                break;
            };
            let next = if task == names::WATCH {
                scheduler.handle_progress(&task)
            } else if failing.contains(&task) {
                scheduler.handle_completion(&task, TaskOutcome::Failed("boom".into()))
            } else {
                scheduler.handle_completion(&task, TaskOutcome::Success)
            };
            executing.extend(next.into_iter().map(|t| t.name));
        }

        prop_assert!(scheduler.is_idle(), "first run never finished");

        let failed: HashSet<String> = scheduler.failed_tasks().into_iter().collect();
        prop_assert!(failed.is_superset(&failing));
        prop_assert_eq!(failed.is_empty(), failing.is_empty());
        prop_assert_eq!(failed.contains(names::WATCH), !failing.is_empty());
    }
}
