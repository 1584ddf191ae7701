use std::{
    num::NonZeroUsize,
    thread,
    time::{Duration, Instant},
};

use neural_supervisor::{
    trainer::from_fn, Dataset, EpochContext, EpochTrainer, Preset, RunOutcome, RunPlan, RunView,
    Snapshot, StopCondition, StopReason, SupervisorError, TrainerError, TrainingSupervisor,
    TrainingUi,
};

/// Records every call the view makes.
#[derive(Default)]
struct MockUi {
    controls: Vec<bool>,
    shown: Vec<usize>,
    failures: Vec<String>,
    finished: Vec<RunOutcome>,
}

impl MockUi {
    /// True once a run has disabled and then re-enabled the controls.
    fn run_over(&self) -> bool {
        self.controls.len() >= 2 && self.controls.last() == Some(&true)
    }
}

impl<V> TrainingUi<V> for MockUi {
    fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls.push(enabled);
    }

    fn show_progress(&mut self, snapshot: &Snapshot<V>) {
        self.shown.push(snapshot.iteration);
    }

    fn run_failed(&mut self, message: &str) {
        self.failures.push(message.to_string());
    }

    fn run_finished(&mut self, outcome: &RunOutcome) {
        self.finished.push(outcome.clone());
    }
}

/// Trainer whose visualization is the number of epochs it has run.
struct Counter {
    epochs: usize,
    pause: Duration,
}

impl EpochTrainer for Counter {
    type Visual = usize;

    fn train_epoch(&mut self, _data: &Dataset, _ctx: &EpochContext) -> Result<f64, TrainerError> {
        self.epochs += 1;
        thread::sleep(self.pause);
        Ok(1.0 / self.epochs as f64)
    }

    fn visualize(&self) -> usize {
        self.epochs
    }
}

fn counter(pause: Duration) -> Counter {
    Counter { epochs: 0, pause }
}

fn points() -> Dataset {
    Dataset::unsupervised(vec![vec![0.0, 1.0]; 8])
}

fn iterations(count: usize) -> RunPlan {
    RunPlan::new(StopCondition::iterations(NonZeroUsize::new(count).unwrap()))
}

fn tick_until_over<V: Send + 'static>(
    view: &mut RunView<V>,
    sup: &mut TrainingSupervisor<V>,
    ui: &mut MockUi,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        view.tick(sup, ui);
        if ui.run_over() {
            return;
        }
        assert!(Instant::now() < deadline, "run did not end in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn controls_are_disabled_for_the_length_of_a_run() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();

    view.start(
        &mut sup,
        &mut ui,
        Preset::Som2d.schema().defaults(),
        points(),
        counter(Duration::ZERO),
        iterations(500),
    )
    .unwrap();
    assert_eq!(ui.controls.first(), Some(&false));

    tick_until_over(&mut view, &mut sup, &mut ui);

    assert_eq!(ui.controls, vec![false, true]);
    assert_eq!(ui.finished.len(), 1);
    assert_eq!(ui.finished[0].reason, StopReason::IterationLimit);
    assert_eq!(ui.shown.last(), Some(&500));
    assert!(ui.shown.windows(2).all(|w| w[0] < w[1]));

    let latest = view.latest().unwrap();
    assert_eq!(latest.iteration, 500);
    assert_eq!(latest.visual, 500);
    assert_eq!(view.errors().len(), 500);
    assert!(view.status().unwrap().contains("500"));
}

#[test]
fn one_tick_renders_only_the_newest_snapshot() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();

    sup.start(
        Preset::Perceptron.schema().defaults(),
        points(),
        counter(Duration::ZERO),
        iterations(40),
    )
    .unwrap();
    sup.wait().unwrap();

    view.tick(&mut sup, &mut ui);

    assert_eq!(ui.shown, vec![40]);
    assert_eq!(ui.controls, vec![false, true]);
    // Every published error is kept for charting.
    let iterations: Vec<_> = view.errors().iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, (1..=40).collect::<Vec<_>>());
    assert_eq!(view.errors()[3].1, 0.25);
}

#[test]
fn stopping_through_the_view_re_enables_controls() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();

    view.start(
        &mut sup,
        &mut ui,
        Preset::Perceptron.schema().defaults(),
        points(),
        counter(Duration::from_millis(1)),
        RunPlan::new(StopCondition::until_cancelled()),
    )
    .unwrap();

    thread::sleep(Duration::from_millis(10));
    let outcome = view.stop(&mut sup, &mut ui).unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(ui.controls, vec![false, true]);
    assert_eq!(ui.finished, vec![outcome.clone()]);
    assert!(view.status().unwrap().starts_with("stopped at iteration"));
    assert_eq!(view.latest().map(|s| s.iteration), Some(outcome.iterations));
}

#[test]
fn failures_reach_the_ui() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();

    let trainer = from_fn(|_: &Dataset, ctx: &EpochContext| {
        if ctx.iteration() == 2 {
            return Err(TrainerError::new("matrix is singular"));
        }
        Ok(1.0)
    });
    view.start(
        &mut sup,
        &mut ui,
        Preset::Xor.schema().defaults(),
        points(),
        trainer,
        RunPlan::new(StopCondition::until_cancelled()),
    )
    .unwrap();

    tick_until_over(&mut view, &mut sup, &mut ui);

    assert_eq!(ui.failures, vec!["matrix is singular".to_string()]);
    assert!(ui.finished.is_empty());
    assert_eq!(ui.shown.last(), Some(&2));
    assert!(view.status().unwrap().contains("matrix is singular"));
}

#[test]
fn rejected_start_leaves_the_ui_alone() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();
    let params = Preset::Perceptron.schema().defaults();

    view.start(
        &mut sup,
        &mut ui,
        params.clone(),
        points(),
        counter(Duration::from_millis(1)),
        RunPlan::new(StopCondition::until_cancelled()),
    )
    .unwrap();
    let controls = ui.controls.clone();

    let err = view
        .start(
            &mut sup,
            &mut ui,
            params.clone(),
            points(),
            counter(Duration::ZERO),
            iterations(1),
        )
        .unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning));
    assert!(sup.is_running());
    assert_eq!(ui.controls[..controls.len()], controls[..]);

    view.stop(&mut sup, &mut ui);

    let err = view
        .start(
            &mut sup,
            &mut ui,
            params,
            Dataset::unsupervised(vec![]),
            counter(Duration::ZERO),
            iterations(1),
        )
        .unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidDataset(_)));
    assert_eq!(ui.controls.last(), Some(&true));
}

#[test]
fn a_new_run_resets_the_history() {
    let mut sup = TrainingSupervisor::new().unwrap();
    let mut view = RunView::new();
    let mut ui = MockUi::default();
    let params = Preset::Perceptron.schema().defaults();

    view.start(&mut sup, &mut ui, params.clone(), points(), counter(Duration::ZERO), iterations(30))
        .unwrap();
    tick_until_over(&mut view, &mut sup, &mut ui);
    assert_eq!(view.errors().len(), 30);

    let mut ui = MockUi::default();
    view.start(&mut sup, &mut ui, params, points(), counter(Duration::ZERO), iterations(5))
        .unwrap();
    tick_until_over(&mut view, &mut sup, &mut ui);

    assert_eq!(view.errors().len(), 5);
    assert_eq!(view.latest().map(|s| s.visual), Some(5));
}
