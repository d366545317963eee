use std::error::Error;
use std::fmt;

/// Domain errors raised by the cleaning, preprocessing and model stages.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    MissingColumn(String),
    InvalidLabel { row: usize, value: f64 },
    ShapeMismatch { expected: usize, found: usize },
    InvalidParameter(String),
    NotFitted(&'static str),
    SingleClass(usize),
    EmptyInput(&'static str),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::MissingColumn(name) => write!(f, "Column '{}' not found", name),
            PipelineError::InvalidLabel { row, value } => {
                write!(f, "Label at row {} must be 0 or 1, found {}", row, value)
            }
            PipelineError::ShapeMismatch { expected, found } => write!(
                f,
                "Expected {} columns/rows but found {}",
                expected, found
            ),
            PipelineError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            PipelineError::NotFitted(stage) => write!(f, "Stage '{}' used before fit", stage),
            PipelineError::SingleClass(class) => write!(
                f,
                "Training labels contain a single class ({}); at least two are required",
                class
            ),
            PipelineError::EmptyInput(stage) => write!(f, "Stage '{}' received no rows", stage),
        }
    }
}

impl Error for PipelineError {}
