use std::{
    env, fs,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context};
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};

use neural_supervisor::{
    Dataset, EpochContext, EpochTrainer, InitRange, Preset, RunOutcome, RunView, Snapshot,
    StatisticsConfig, TrainerError, TrainingSupervisor, TrainingUi,
};

const FRAME: Duration = Duration::from_millis(50);

/// Threshold perceptron over a 2-input truth table.
struct Perceptron {
    bias: f64,
    weights: Vec<f64>,
}

impl Perceptron {
    fn new(inputs: usize, init: InitRange, rng: &mut StdRng) -> Self {
        Self {
            bias: init.sample(rng),
            weights: (0..inputs).map(|_| init.sample(rng)).collect(),
        }
    }

    fn output(&self, x: &[f64]) -> f64 {
        let net: f64 = self.bias + self.weights.iter().zip(x).map(|(w, x)| w * x).sum::<f64>();
        if net >= 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

impl EpochTrainer for Perceptron {
    type Visual = Vec<f64>;

    fn train_epoch(&mut self, data: &Dataset, ctx: &EpochContext) -> Result<f64, TrainerError> {
        let rate = ctx.rates().learning_rate;
        let mut misses = 0.0;

        for (x, t) in data.rows() {
            let target = *t
                .first()
                .ok_or_else(|| TrainerError::new("perceptron needs one output per row"))?;
            let delta = target - self.output(x);
            if delta != 0.0 {
                misses += 1.0;
                self.bias += rate * delta;
                for (w, x) in self.weights.iter_mut().zip(x) {
                    *w += rate * delta * x;
                }
            }
        }

        Ok(misses)
    }

    fn visualize(&self) -> Vec<f64> {
        std::iter::once(self.bias).chain(self.weights.iter().copied()).collect()
    }

    fn weights(&self) -> Option<Vec<Vec<f64>>> {
        Some(vec![self.visualize()])
    }
}

/// Prints progress to stdout and remembers when the run is over.
#[derive(Default)]
struct ConsoleUi {
    done: bool,
    failure: Option<String>,
}

impl TrainingUi<Vec<f64>> for ConsoleUi {
    fn set_controls_enabled(&mut self, enabled: bool) {
        self.done = enabled;
    }

    fn show_progress(&mut self, snapshot: &Snapshot<Vec<f64>>) {
        println!(
            "iteration {:>6}  error {:>8.4}  rate {:.4}  weights {:?}",
            snapshot.iteration, snapshot.error, snapshot.rates.learning_rate, snapshot.visual
        );
    }

    fn run_failed(&mut self, message: &str) {
        self.failure = Some(message.to_string());
    }

    fn run_finished(&mut self, outcome: &RunOutcome) {
        println!(
            "{} after {} iterations in {:?}",
            outcome.reason, outcome.iterations, outcome.elapsed
        );
    }
}

struct Args {
    preset: Preset,
    settings: Vec<(String, String)>,
    settings_file: Option<PathBuf>,
    stats_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

fn usage() -> String {
    let bin = env::args().next().unwrap_or_else(|| "supervise".to_string());
    format!(
        "Usage: {bin} <preset> [name=value ...] \
         [--settings file.json] [--stats dir] [--timeout secs]"
    )
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = env::args().skip(1);
    let preset = args.next().ok_or_else(|| anyhow!(usage()))?.parse::<Preset>()?;

    let mut parsed = Args {
        preset,
        settings: Vec::new(),
        settings_file: None,
        stats_dir: None,
        timeout: None,
    };

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match arg.as_str() {
            "--settings" => parsed.settings_file = Some(value("--settings")?.into()),
            "--stats" => parsed.stats_dir = Some(value("--stats")?.into()),
            "--timeout" => {
                let secs: f64 = value("--timeout")?.parse().context("invalid --timeout")?;
                parsed.timeout = Some(Duration::try_from_secs_f64(secs)?);
            }
            pair => match pair.split_once('=') {
                Some((name, text)) => parsed.settings.push((name.to_string(), text.to_string())),
                None => bail!("unexpected argument '{pair}'\n{}", usage()),
            },
        }
    }

    Ok(parsed)
}

fn and_gate() -> Dataset {
    Dataset::new(
        vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        vec![vec![0.0], vec![0.0], vec![0.0], vec![1.0]],
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let schema = args.preset.schema();

    let params = match &args.settings_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            let doc = serde_json::from_str(&text)
                .with_context(|| format!("parsing settings from {}", path.display()))?;
            if !args.settings.is_empty() {
                warn!("settings file given, ignoring command-line settings");
            }
            schema.resolve_json(&doc)
        }
        None => {
            let pairs: Vec<(&str, &str)> = args
                .settings
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_str()))
                .collect();
            schema.resolve(&pairs)
        }
    };

    for n in params.normalizations() {
        println!("{}: {:?} replaced by {} ({:?})", n.name, n.raw, n.used, n.reason);
    }
    info!("settings: {}", serde_json::to_string(&params)?);

    let mut plan = args.preset.plan(&params);
    if let Some(dir) = args.stats_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating statistics directory {}", dir.display()))?;
        plan = plan.with_statistics(StatisticsConfig::all(dir));
    }

    let data = and_gate();
    let mut rng = StdRng::from_os_rng();
    let trainer = Perceptron::new(data.input_dim(), InitRange::new(-0.5, 0.5), &mut rng);

    let mut supervisor = TrainingSupervisor::new()?;
    let mut view = RunView::new();
    let mut ui = ConsoleUi::default();

    view.start(&mut supervisor, &mut ui, params, data, trainer, plan)?;
    let deadline = args.timeout.map(|t| Instant::now() + t);

    while !ui.done {
        thread::sleep(FRAME);
        view.tick(&mut supervisor, &mut ui);

        if deadline.is_some_and(|d| Instant::now() >= d) && !ui.done {
            info!("timeout reached, stopping run");
            view.stop(&mut supervisor, &mut ui);
        }
    }
    supervisor.wait();

    if let Some(status) = view.status() {
        info!("{status}");
    }

    match ui.failure {
        Some(message) => bail!("training failed: {message}"),
        None => Ok(()),
    }
}
