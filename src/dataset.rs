use std::{error::Error, fmt};

/// Rows a training primitive consumes: one output vector per input vector.
///
/// Unsupervised samples (self-organizing maps, elastic net) carry an empty
/// output vector per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    inputs: Vec<Vec<f64>>,
    outputs: Vec<Vec<f64>>,
}

/// Reasons a dataset is refused before a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    Empty,
    LengthMismatch { inputs: usize, outputs: usize },
    TooShort { got: usize, required: usize },
    RaggedInputs { row: usize, got: usize, expected: usize },
    RaggedOutputs { row: usize, got: usize, expected: usize },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Empty => write!(f, "dataset is empty"),
            DatasetError::LengthMismatch { inputs, outputs } => {
                write!(f, "dataset has {inputs} input rows but {outputs} output rows")
            }
            DatasetError::TooShort { got, required } => {
                write!(f, "dataset has {got} rows, at least {required} required")
            }
            DatasetError::RaggedInputs { row, got, expected } => {
                write!(f, "input row {row} has {got} values, expected {expected}")
            }
            DatasetError::RaggedOutputs { row, got, expected } => {
                write!(f, "output row {row} has {got} values, expected {expected}")
            }
        }
    }
}

impl Error for DatasetError {}

impl Dataset {
    /// Creates a supervised dataset. Shape is checked by [`Dataset::validate`].
    pub fn new(inputs: Vec<Vec<f64>>, outputs: Vec<Vec<f64>>) -> Self {
        Self { inputs, outputs }
    }

    /// Creates a dataset with no target values.
    pub fn unsupervised(inputs: Vec<Vec<f64>>) -> Self {
        let outputs = vec![Vec::new(); inputs.len()];
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Vec<f64>] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Width of each input row, or 0 for an empty dataset.
    pub fn input_dim(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }

    /// Width of each output row, or 0 for an empty or unsupervised dataset.
    pub fn output_dim(&self) -> usize {
        self.outputs.first().map_or(0, Vec::len)
    }

    /// Iterates `(input, output)` row pairs.
    pub fn rows(&self) -> impl Iterator<Item = (&[f64], &[f64])> {
        self.inputs
            .iter()
            .zip(&self.outputs)
            .map(|(x, y)| (x.as_slice(), y.as_slice()))
    }

    /// Checks the dataset is usable for a run.
    ///
    /// # Args
    /// * `min_samples` - The fewest rows the run accepts.
    ///
    /// # Errors
    /// Returns a `DatasetError` if the dataset is empty, shorter than
    /// `min_samples`, or its rows disagree in length.
    pub fn validate(&self, min_samples: usize) -> Result<(), DatasetError> {
        if self.inputs.is_empty() {
            return Err(DatasetError::Empty);
        }

        if self.inputs.len() != self.outputs.len() {
            return Err(DatasetError::LengthMismatch {
                inputs: self.inputs.len(),
                outputs: self.outputs.len(),
            });
        }

        if self.inputs.len() < min_samples {
            return Err(DatasetError::TooShort {
                got: self.inputs.len(),
                required: min_samples,
            });
        }

        let (x_dim, y_dim) = (self.input_dim(), self.output_dim());
        for (row, (x, y)) in self.rows().enumerate() {
            if x.len() != x_dim {
                return Err(DatasetError::RaggedInputs {
                    row,
                    got: x.len(),
                    expected: x_dim,
                });
            }
            if y.len() != y_dim {
                return Err(DatasetError::RaggedOutputs {
                    row,
                    got: y.len(),
                    expected: y_dim,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_data() {
        let ds = Dataset::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]], vec![vec![1.0], vec![0.0]]);
        assert_eq!(ds.validate(2), Ok(()));
        assert_eq!((ds.input_dim(), ds.output_dim()), (2, 1));
    }

    #[test]
    fn unsupervised_rows_have_empty_targets() {
        let ds = Dataset::unsupervised(vec![vec![3.0, 4.0]; 5]);
        assert_eq!(ds.validate(1), Ok(()));
        assert_eq!(ds.outputs().len(), 5);
        assert_eq!(ds.output_dim(), 0);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(Dataset::default().validate(0), Err(DatasetError::Empty));

        let ds = Dataset::new(vec![vec![0.0]; 3], vec![vec![0.0]; 2]);
        assert_eq!(
            ds.validate(1),
            Err(DatasetError::LengthMismatch { inputs: 3, outputs: 2 })
        );

        let ds = Dataset::unsupervised(vec![vec![0.0]; 3]);
        assert_eq!(ds.validate(4), Err(DatasetError::TooShort { got: 3, required: 4 }));

        let ds = Dataset::unsupervised(vec![vec![0.0, 1.0], vec![0.0]]);
        assert_eq!(
            ds.validate(1),
            Err(DatasetError::RaggedInputs { row: 1, got: 1, expected: 2 })
        );
    }
}
