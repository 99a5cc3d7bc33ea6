//! Date column inference: which column holds the date, and how to read it

pub mod detector;
pub mod formats;
pub mod normalizer;

pub use detector::{DEFAULT_MIN_PARSE_RATIO, DateCandidate, DateColumnDetector, DetectionMethod};
pub use normalizer::{DateNormalizer, NormalizationReport, NormalizationStrategy};
