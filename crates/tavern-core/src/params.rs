//! Generation parameters and the bounds the parameter panel enforces.

use serde::{Deserialize, Serialize};

/// Sampling knobs forwarded to the provider when the client sends them.
///
/// The server does not validate these; the client clamps them to
/// [`ParamKind::min`]..=[`ParamKind::max`] as the user adjusts a slider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub temperature: f32,
    #[serde(alias = "maxOutputTokens")]
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// One slider in the parameter panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Temperature,
    MaxTokens,
    TopP,
    FrequencyPenalty,
    PresencePenalty,
}

impl ParamKind {
    pub fn all() -> [ParamKind; 5] {
        [
            ParamKind::Temperature,
            ParamKind::MaxTokens,
            ParamKind::TopP,
            ParamKind::FrequencyPenalty,
            ParamKind::PresencePenalty,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::Temperature => "Temperature",
            ParamKind::MaxTokens => "Max Tokens",
            ParamKind::TopP => "Top P",
            ParamKind::FrequencyPenalty => "Frequency Penalty",
            ParamKind::PresencePenalty => "Presence Penalty",
        }
    }

    pub fn min(&self) -> f64 {
        match self {
            ParamKind::MaxTokens => 100.0,
            _ => 0.0,
        }
    }

    pub fn max(&self) -> f64 {
        match self {
            ParamKind::Temperature => 2.0,
            ParamKind::MaxTokens => 2000.0,
            ParamKind::TopP => 1.0,
            ParamKind::FrequencyPenalty => 2.0,
            ParamKind::PresencePenalty => 2.0,
        }
    }

    pub fn step(&self) -> f64 {
        match self {
            ParamKind::Temperature => 0.1,
            ParamKind::MaxTokens => 50.0,
            ParamKind::TopP => 0.05,
            ParamKind::FrequencyPenalty => 0.1,
            ParamKind::PresencePenalty => 0.1,
        }
    }

    /// Where `value` sits between min and max, as 0.0..=1.0
    pub fn ratio(&self, value: f64) -> f64 {
        ((value - self.min()) / (self.max() - self.min())).clamp(0.0, 1.0)
    }
}

impl GenerationParameters {
    pub fn get(&self, kind: ParamKind) -> f64 {
        match kind {
            ParamKind::Temperature => self.temperature as f64,
            ParamKind::MaxTokens => self.max_tokens as f64,
            ParamKind::TopP => self.top_p as f64,
            ParamKind::FrequencyPenalty => self.frequency_penalty as f64,
            ParamKind::PresencePenalty => self.presence_penalty as f64,
        }
    }

    /// Set a value, clamped to the slider's range and snapped to its step.
    pub fn set(&mut self, kind: ParamKind, value: f64) {
        let steps = ((value - kind.min()) / kind.step()).round();
        let snapped = (kind.min() + steps * kind.step()).clamp(kind.min(), kind.max());
        // Strip float noise left by the step multiplication (0.30000000000000004)
        let snapped = (snapped * 1000.0).round() / 1000.0;

        match kind {
            ParamKind::Temperature => self.temperature = snapped as f32,
            ParamKind::MaxTokens => self.max_tokens = snapped as u32,
            ParamKind::TopP => self.top_p = snapped as f32,
            ParamKind::FrequencyPenalty => self.frequency_penalty = snapped as f32,
            ParamKind::PresencePenalty => self.presence_penalty = snapped as f32,
        }
    }

    /// Move a slider by whole steps (negative moves down).
    pub fn nudge(&mut self, kind: ParamKind, steps: i32) {
        let value = self.get(kind) + steps as f64 * kind.step();
        self.set(kind, value);
    }

    /// Every value pulled back inside its slider range
    pub fn clamped(mut self) -> Self {
        for kind in ParamKind::all() {
            let value = self.get(kind);
            self.set(kind, value);
        }
        self
    }

    /// Display string used next to each slider label
    pub fn format(&self, kind: ParamKind) -> String {
        match kind {
            ParamKind::MaxTokens => self.max_tokens.to_string(),
            _ => format!("{:.2}", self.get(kind))
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
        }
    }
}
