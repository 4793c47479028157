// src/inference/label.rs
//! Affective labels and the lock-free published-label cell

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Closed set of affective states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmotionLabel {
    Positive,
    Negative,
    Neutral,
}

impl EmotionLabel {
    /// Class order of classifier outputs
    pub const ALL: [EmotionLabel; 3] = [
        EmotionLabel::Positive,
        EmotionLabel::Negative,
        EmotionLabel::Neutral,
    ];

    pub fn index(self) -> usize {
        match self {
            EmotionLabel::Positive => 0,
            EmotionLabel::Negative => 1,
            EmotionLabel::Neutral => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Positive => "POSITIVE",
            EmotionLabel::Negative => "NEGATIVE",
            EmotionLabel::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: EmotionLabel,
    /// Probability of `label`, in [0, 1]
    pub confidence: f32,
    /// Optional per-channel attention weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention: Option<Vec<f32>>,
}

impl Prediction {
    pub fn new(label: EmotionLabel, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            attention: None,
        }
    }

    pub fn with_attention(mut self, attention: Vec<f32>) -> Self {
        self.attention = Some(attention);
        self
    }

    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

// Packed layout: [63..41 sequence][40 present][39..32 label][31..0 confidence bits]
const PRESENT_BIT: u64 = 1 << 40;
const LABEL_SHIFT: u32 = 32;
const SEQUENCE_SHIFT: u32 = 41;
const SEQUENCE_MASK: u64 = (1 << (64 - SEQUENCE_SHIFT)) - 1;

/// Single shared cell holding the latest label
///
/// Writes replace the whole value atomically; reads never block and never
/// see a label paired with another label's confidence.
#[derive(Debug, Default)]
pub struct LabelCell {
    packed: AtomicU64,
}

impl LabelCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, label: EmotionLabel, confidence: f32) {
        let mut current = self.packed.load(Ordering::Relaxed);
        loop {
            let sequence = ((current >> SEQUENCE_SHIFT) + 1) & SEQUENCE_MASK;
            let next = (sequence << SEQUENCE_SHIFT)
                | PRESENT_BIT
                | ((label.index() as u64) << LABEL_SHIFT)
                | u64::from(confidence.to_bits());

            match self.packed.compare_exchange_weak(
                current,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn load(&self) -> Option<(EmotionLabel, f32)> {
        let packed = self.packed.load(Ordering::Acquire);
        if packed & PRESENT_BIT == 0 {
            return None;
        }

        let label = EmotionLabel::from_index(((packed >> LABEL_SHIFT) & 0xFF) as usize)?;
        let confidence = f32::from_bits(packed as u32);
        Some((label, confidence))
    }

    /// Number of publishes so far, wrapping
    pub fn sequence(&self) -> u64 {
        self.packed.load(Ordering::Acquire) >> SEQUENCE_SHIFT
    }
}
