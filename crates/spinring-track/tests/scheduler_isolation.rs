use std::sync::Arc;
use std::thread;
use std::time::Duration;

use spinring_core::{SpinError, SpinMotion, SpinVector};
use spinring_track::{polarization, ErrorLedger, Progress, Scheduler, Task};

struct CountingTask {
    id: u32,
    progress: Arc<Progress>,
    ran: bool,
    outcome: Outcome,
    pause: Duration,
}

#[derive(Clone, Copy)]
enum Outcome {
    Succeed,
    Fail,
    Panic,
}

impl CountingTask {
    fn new(id: u32, outcome: Outcome) -> Self {
        Self {
            id,
            progress: Arc::new(Progress::new(4)),
            ran: false,
            outcome,
            pause: Duration::ZERO,
        }
    }

    fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl Task for CountingTask {
    fn id(&self) -> u32 {
        self.id
    }

    fn run(&mut self) -> Result<(), SpinError> {
        self.ran = true;
        for _ in 0..4 {
            thread::sleep(self.pause);
            self.progress.advance();
        }
        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail => Err(SpinError::particle("engineered", "task failed on purpose")),
            Outcome::Panic => panic!("task {} exploded", self.id),
        }
    }

    fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }
}

#[test]
fn panicking_task_is_recorded_and_the_rest_complete() {
    let tasks = (0..16)
        .map(|id| CountingTask::new(id, if id == 5 { Outcome::Panic } else { Outcome::Succeed }))
        .collect();
    let scheduler = Scheduler::new(tasks, 4);
    scheduler.start().expect("pool");
    assert_eq!(scheduler.num_tasks(), 16);
    assert_eq!(scheduler.num_failed(), 1);
    assert_eq!(scheduler.num_successful(), 15);
    assert!(scheduler.progress().is_empty());

    let errors = scheduler.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[&5].contains("task 5 exploded"));

    let (tasks, ledger) = scheduler.into_parts();
    assert_eq!(ledger, errors);
    assert_eq!(tasks.len(), 16);
    assert!(tasks.iter().all(|task| task.ran));
    assert_eq!(
        tasks.iter().map(|task| task.id).collect::<Vec<_>>(),
        (0..16).collect::<Vec<_>>()
    );
}

#[test]
fn second_start_runs_nothing() {
    let tasks = vec![
        CountingTask::new(0, Outcome::Succeed),
        CountingTask::new(1, Outcome::Fail),
    ];
    let scheduler = Scheduler::new(tasks, 0);
    assert_eq!(scheduler.threads(), 1);
    scheduler.start().expect("pool");
    scheduler.start().expect("pool");
    let (tasks, ledger) = scheduler.into_parts();
    assert_eq!(ledger.len(), 1);
    assert!(ledger[&1].contains("engineered"));
    assert!(tasks.iter().all(|task| task.progress.written() == 4));
}

#[test]
fn monitor_sees_the_batch_advance_to_completion() {
    let tasks = (0..4)
        .map(|id| CountingTask::new(id, Outcome::Succeed).with_pause(Duration::from_millis(15)))
        .collect();
    let scheduler = Scheduler::new(tasks, 1);
    let mut reports = Vec::new();
    scheduler
        .start_monitored(Duration::from_millis(2), |report| reports.push(report.clone()))
        .expect("pool");
    assert!(reports.len() >= 2);
    let last = reports.last().expect("final report");
    assert_eq!(last.total, 4);
    assert_eq!(last.finished, 4);
    assert_eq!(last.failed, 0);
    assert!(last.running.is_empty());
    assert_eq!(last.fraction(), 1.0);
    assert!(reports.windows(2).all(|pair| pair[0].finished <= pair[1].finished));
    assert!(reports[..reports.len() - 1]
        .iter()
        .any(|report| report.finished < 4 && report.fraction() < 1.0));
}

fn constant_series(spin: SpinVector) -> SpinMotion {
    let mut motion = SpinMotion::new();
    for k in 0..5 {
        motion.insert(k as f64 * 1e-6, spin);
    }
    motion
}

#[test]
fn identical_series_average_to_themselves() {
    let spin = SpinVector::new(0.0, 0.6, 0.8);
    let series: Vec<_> = (0..7).map(|_| constant_series(spin)).collect();
    let average = polarization(
        series.iter().enumerate().map(|(id, motion)| (id as u32, motion)),
        &ErrorLedger::new(),
    )
    .expect("average");
    for (_, value) in average.iter() {
        assert!((value - spin).norm() < 1e-15);
    }
    assert!(average.same_times(&series[0]));
}

#[test]
fn only_the_survivor_is_averaged() {
    let survivor = constant_series(SpinVector::new(1.0, 0.0, 0.0));
    let others = constant_series(SpinVector::new(0.0, 0.0, -1.0));
    let errors: ErrorLedger = [(0, "boom".to_string()), (2, "boom".to_string())].into();
    let average = polarization([(0, &others), (1, &survivor), (2, &others)], &errors)
        .expect("average");
    assert_eq!(average, survivor);
}
