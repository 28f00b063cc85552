use serde::{Deserialize, Serialize};

/// Tunable constants of the learning loop.
///
/// The defaults are the hand-tuned values the system shipped with. None of
/// them are load-bearing individually, but two orderings are: a contradiction
/// reset must land below an accumulated confidence, and the vendor initial
/// confidence must clear the decision engine's bypass threshold so a single
/// correction is enough to outrank keyword indicators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearningConfig {
    /// Confidence of a vendor pattern after its first correction.
    pub vendor_initial_confidence: f32,
    /// Added per repeated identical correction, capped at 1.0.
    pub vendor_reinforce_step: f32,
    /// Confidence after a contradicting correction overwrites the pattern.
    pub vendor_reset_confidence: f32,

    pub payment_initial_confidence: f32,
    pub payment_reinforce_step: f32,
    pub payment_reset_confidence: f32,

    /// A brand-new card mapping starts here.
    pub card_initial_confidence: f32,
    pub card_reinforce_step: f32,
    /// A contradicted card mapping resets here — below a fresh mapping,
    /// above zero: one correction is weaker evidence than repeated
    /// confirmation but stronger than silence.
    pub card_reset_confidence: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            vendor_initial_confidence: 0.7,
            vendor_reinforce_step: 0.1,
            vendor_reset_confidence: 0.7,
            payment_initial_confidence: 0.7,
            payment_reinforce_step: 0.1,
            payment_reset_confidence: 0.7,
            card_initial_confidence: 0.8,
            card_reinforce_step: 0.05,
            card_reset_confidence: 0.7,
        }
    }
}

impl LearningConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, String> {
        toml::from_str(toml_content).map_err(|e| format!("Failed to parse TOML: {e}"))
    }
}
