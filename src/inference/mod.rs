// src/inference/mod.rs
//! Classifier seam, published label and the periodic scheduler

pub mod classifier;
pub mod label;
pub mod scaler;
pub mod scheduler;

pub use classifier::{softmax, Classifier, ClassifierError, ClassifierInput, LinearSoftmaxClassifier};
pub use label::{EmotionLabel, LabelCell, Prediction};
pub use scaler::FeatureScaler;
pub use scheduler::{
    InferenceScheduler, PreparedWindow, SchedulerMetrics, SchedulerSettings, SkipReason,
    TickEvent, TickEventKind, TickFailure, TickOutcome,
};
