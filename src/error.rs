// src/error.rs
//! Unified error handling for the affect pipeline
//!
//! Every component reports failures through [`AffectError`], which carries an
//! [`ErrorContext`] describing where the failure happened. Leaf modules keep
//! their own small `thiserror` enums and convert into `AffectError` at the
//! module boundary, so the scheduler can record any failure uniformly.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use serde::{Deserialize, Serialize};

/// Unified error type for the whole pipeline
#[derive(Debug, Clone)]
pub enum AffectError {
    /// Configuration rejected at build time
    Configuration {
        component: String,
        reasons: Vec<String>,
        context: ErrorContext,
    },

    /// Sample rejected at ingest
    InvalidSample {
        reason: String,
        expected: Option<String>,
        actual: Option<String>,
        context: ErrorContext,
    },

    /// Conditioning, windowing or feature extraction failure
    Processing {
        stage: ProcessingStage,
        reason: String,
        context: ErrorContext,
    },

    /// Failure raised by the classifier collaborator
    Classifier {
        error: Arc<dyn Error + Send + Sync>,
        context: ErrorContext,
    },

    /// File system failures while loading configuration or model files
    Io {
        path: Option<String>,
        reason: String,
        context: ErrorContext,
    },
}

/// Pipeline stages used to tag processing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    Snapshot,
    Filtering,
    Windowing,
    FeatureExtraction,
    Scaling,
    Inference,
    Publish,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Snapshot => "snapshot",
            ProcessingStage::Filtering => "filtering",
            ProcessingStage::Windowing => "windowing",
            ProcessingStage::FeatureExtraction => "feature-extraction",
            ProcessingStage::Scaling => "scaling",
            ProcessingStage::Inference => "inference",
            ProcessingStage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Where and when an error happened
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_id: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: std::collections::HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_id: Self::current_thread_id(),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: std::collections::HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(
        component: &str,
        operation: &str,
        file: &'static str,
        line: u32,
    ) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    /// Add additional information to the context
    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }

    fn current_thread_id() -> Option<String> {
        std::thread::current().name().map(|s| s.to_string())
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl AffectError {
    /// Context attached to this error
    pub fn context(&self) -> &ErrorContext {
        match self {
            AffectError::Configuration { context, .. }
            | AffectError::InvalidSample { context, .. }
            | AffectError::Processing { context, .. }
            | AffectError::Classifier { context, .. }
            | AffectError::Io { context, .. } => context,
        }
    }

    /// Stage a failure belongs to when it is recorded by the scheduler
    pub fn stage(&self) -> Option<ProcessingStage> {
        match self {
            AffectError::Processing { stage, .. } => Some(*stage),
            AffectError::Classifier { .. } => Some(ProcessingStage::Inference),
            _ => None,
        }
    }

    /// Whether the error can only be fixed by changing configuration
    pub fn is_fatal(&self) -> bool {
        matches!(self, AffectError::Configuration { .. })
    }
}

impl fmt::Display for AffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffectError::Configuration { component, reasons, context } => {
                write!(f, "[CONFIG] Configuration error in {}: {} ({})",
                       component, reasons.join("; "), context.operation)
            }
            AffectError::InvalidSample { reason, expected, actual, context } => {
                match (expected, actual) {
                    (Some(exp), Some(act)) => write!(f, "[SAMPLE] Rejected sample: {} (expected: {}, got: {}) ({})",
                                                     reason, exp, act, context.operation),
                    _ => write!(f, "[SAMPLE] Rejected sample: {} ({})", reason, context.operation),
                }
            }
            AffectError::Processing { stage, reason, context } => {
                write!(f, "[PROCESSING] {} stage error: {} ({})", stage, reason, context.operation)
            }
            AffectError::Classifier { error, context } => {
                write!(f, "[CLASSIFIER] Inference failed in {}: {} (at {}:{})",
                       context.component, error,
                       context.file.unwrap_or("unknown"), context.line.unwrap_or(0))
            }
            AffectError::Io { path, reason, context } => {
                match path {
                    Some(path) => write!(f, "[IO] {} failed for {}: {}", context.operation, path, reason),
                    None => write!(f, "[IO] {} failed: {}", context.operation, reason),
                }
            }
        }
    }
}

impl Error for AffectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AffectError::Classifier { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<crate::acquisition::IngestError> for AffectError {
    fn from(err: crate::acquisition::IngestError) -> Self {
        use crate::acquisition::IngestError;

        let context = error_context!("sample_buffer", "ingest");
        match err {
            IngestError::ChannelCount { expected, actual } => AffectError::InvalidSample {
                reason: "wrong channel count".to_string(),
                expected: Some(expected.to_string()),
                actual: Some(actual.to_string()),
                context,
            },
            IngestError::NonFinite { channel } => AffectError::InvalidSample {
                reason: format!("non-finite value on channel {}", channel),
                expected: None,
                actual: None,
                context,
            },
        }
    }
}

impl From<crate::processing::filters::FilterError> for AffectError {
    fn from(err: crate::processing::filters::FilterError) -> Self {
        AffectError::Processing {
            stage: ProcessingStage::Filtering,
            reason: err.to_string(),
            context: error_context!("signal_conditioner", "filter"),
        }
    }
}

impl From<crate::inference::ClassifierError> for AffectError {
    fn from(err: crate::inference::ClassifierError) -> Self {
        AffectError::Classifier {
            error: Arc::new(err),
            context: error_context!("classifier", "infer"),
        }
    }
}

impl From<crate::config::ConfigError> for AffectError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;

        match err {
            ConfigError::Invalid(reasons) => AffectError::Configuration {
                component: "pipeline_config".to_string(),
                reasons,
                context: error_context!("config", "validate"),
            },
            ConfigError::Io { path, source } => AffectError::Io {
                path: Some(path),
                reason: source.to_string(),
                context: error_context!("config_loader", "read"),
            },
            other => AffectError::Configuration {
                component: "config_loader".to_string(),
                reasons: vec![other.to_string()],
                context: error_context!("config_loader", "load"),
            },
        }
    }
}

/// Result type alias for pipeline operations
pub type AffectResult<T> = Result<T, AffectError>;

/// Error builder for convenient error construction
pub struct AffectErrorBuilder {
    component: String,
    operation: String,
}

impl AffectErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn configuration(self, reason: &str) -> AffectError {
        let context = ErrorContext::new(&self.component, &self.operation);

        AffectError::Configuration {
            component: self.component,
            reasons: vec![reason.to_string()],
            context,
        }
    }

    pub fn processing(self, stage: ProcessingStage, reason: &str) -> AffectError {
        AffectError::Processing {
            stage,
            reason: reason.to_string(),
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }

    pub fn invalid_sample(self, reason: &str) -> AffectError {
        AffectError::InvalidSample {
            reason: reason.to_string(),
            expected: None,
            actual: None,
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("test_component", "test_operation");
        assert_eq!(context.component, "test_component");
        assert_eq!(context.operation, "test_operation");
        assert!(context.timestamp <= SystemTime::now());
    }

    #[test]
    fn test_error_builder() {
        let err = AffectErrorBuilder::new("scheduler", "tick")
            .processing(ProcessingStage::FeatureExtraction, "empty window");

        match &err {
            AffectError::Processing { stage, reason, context } => {
                assert_eq!(*stage, ProcessingStage::FeatureExtraction);
                assert_eq!(reason, "empty window");
                assert_eq!(context.component, "scheduler");
            }
            _ => panic!("Expected processing error"),
        }
        assert_eq!(err.stage(), Some(ProcessingStage::FeatureExtraction));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_ingest_error_conversion() {
        let err: AffectError = crate::acquisition::IngestError::ChannelCount {
            expected: 4,
            actual: 3,
        }
        .into();

        let display = err.to_string();
        assert!(display.contains("wrong channel count"));
        assert!(display.contains("expected: 4"));
        assert!(display.contains("got: 3"));
    }

    #[test]
    fn test_classifier_error_has_source() {
        let err: AffectError =
            crate::inference::ClassifierError::Model("weights missing".to_string()).into();

        assert_eq!(err.stage(), Some(ProcessingStage::Inference));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("weights missing"));
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err = AffectErrorBuilder::new("config", "validate").configuration("window too long");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("window too long"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AffectError>();
    }
}
