use std::{
    error::Error,
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use log::info;

pub const ERRORS_FILE: &str = "errors.csv";
pub const WEIGHTS_FILE: &str = "weights.csv";

/// Which per-epoch statistics a run writes, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsConfig {
    pub directory: PathBuf,
    pub errors: bool,
    pub weights: bool,
}

impl StatisticsConfig {
    /// Writes both files into `directory`.
    pub fn all(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            errors: true,
            weights: true,
        }
    }
}

/// Failure creating or writing a statistics file.
#[derive(Debug)]
pub struct StatisticsError {
    path: PathBuf,
    source: io::Error,
}

impl fmt::Display for StatisticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed writing {}: {}", self.path.display(), self.source)
    }
}

impl Error for StatisticsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

struct CsvFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl CsvFile {
    fn create(path: PathBuf) -> Result<Self, StatisticsError> {
        match File::create(&path) {
            Ok(file) => Ok(Self {
                path,
                out: BufWriter::new(file),
            }),
            Err(source) => Err(StatisticsError { path, source }),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), StatisticsError> {
        writeln!(self.out, "{line}").map_err(|source| self.err(source))
    }

    fn flush(&mut self) -> Result<(), StatisticsError> {
        self.out.flush().map_err(|source| self.err(source))
    }

    fn err(&self, source: io::Error) -> StatisticsError {
        StatisticsError {
            path: self.path.clone(),
            source,
        }
    }
}

/// Appends one record per epoch to the enabled CSV files.
///
/// `errors.csv` holds one error value per line. `weights.csv` holds one line
/// per neuron per epoch, `neuron{i};w0;w1;...`, with the weights the epoch
/// started from.
pub struct StatisticsWriter {
    errors: Option<CsvFile>,
    weights: Option<CsvFile>,
}

impl StatisticsWriter {
    /// Creates (truncating) the enabled files.
    ///
    /// # Errors
    /// Returns a `StatisticsError` if a file cannot be created.
    pub fn create(cfg: &StatisticsConfig) -> Result<Self, StatisticsError> {
        let open = |enabled: bool, name: &str| -> Result<Option<CsvFile>, StatisticsError> {
            enabled
                .then(|| CsvFile::create(cfg.directory.join(name)))
                .transpose()
        };

        let writer = Self {
            errors: open(cfg.errors, ERRORS_FILE)?,
            weights: open(cfg.weights, WEIGHTS_FILE)?,
        };
        info!("writing statistics to {}", cfg.directory.display());
        Ok(writer)
    }

    /// Records one epoch.
    ///
    /// # Args
    /// * `error` - The epoch's error metric.
    /// * `weights` - The network's weights before the epoch, if the trainer exposes them.
    pub fn record(
        &mut self,
        error: f64,
        weights: Option<&[Vec<f64>]>,
    ) -> Result<(), StatisticsError> {
        if let Some(file) = &mut self.errors {
            file.write_line(&error.to_string())?;
        }

        if let (Some(file), Some(weights)) = (&mut self.weights, weights) {
            for (i, neuron) in weights.iter().enumerate() {
                let mut line = format!("neuron{i}");
                for w in neuron {
                    line.push(';');
                    line.push_str(&w.to_string());
                }
                file.write_line(&line)?;
            }
        }

        Ok(())
    }

    /// Flushes buffered records to disk.
    pub fn finish(mut self) -> Result<(), StatisticsError> {
        for file in [&mut self.errors, &mut self.weights].into_iter().flatten() {
            file.flush()?;
        }
        Ok(())
    }

    pub fn wants_weights(&self) -> bool {
        self.weights.is_some()
    }
}
