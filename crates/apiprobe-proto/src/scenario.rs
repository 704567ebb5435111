//! Quality scenarios that drive case generation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The testing intent a batch of cases is generated for.
///
/// Iteration order is fixed: [`QualityScenario::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityScenario {
    /// Ordinary, well-formed calls that should succeed.
    HappyPath,
    /// Missing, empty, or mistyped parameters.
    ParamIntegrity,
    /// Oversized strings, special characters, injection attempts, boundary values.
    AbnormalInput,
}

impl QualityScenario {
    pub const ALL: [QualityScenario; 3] = [
        QualityScenario::HappyPath,
        QualityScenario::ParamIntegrity,
        QualityScenario::AbnormalInput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QualityScenario::HappyPath => "HAPPY_PATH",
            QualityScenario::ParamIntegrity => "PARAM_INTEGRITY",
            QualityScenario::AbnormalInput => "ABNORMAL_INPUT",
        }
    }

    /// Short human description, used in prompts and reports.
    pub fn description(self) -> &'static str {
        match self {
            QualityScenario::HappyPath => "basic functionality",
            QualityScenario::ParamIntegrity => "parameter integrity",
            QualityScenario::AbnormalInput => "abnormal input",
        }
    }
}

impl fmt::Display for QualityScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
