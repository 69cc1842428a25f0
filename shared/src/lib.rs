use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Index the damage classifier assigns to the "damaged" class.
pub const DAMAGED_CLASS_INDEX: usize = 0;

/// Which of the three classifiers produced a prediction. Only used to label
/// log output; reports carry the predictions positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ClassifierKind {
    #[strum(serialize = "CAR DAMAGE")]
    Damage,
    #[strum(serialize = "CAR DAMAGE SIDE")]
    Side,
    #[strum(serialize = "CAR DAMAGE LEVEL")]
    Level,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Score of the predicted class, `0.0` if the index is out of range.
    pub fn confidence(&self) -> f32 {
        self.scores.get(self.index).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DamageReport {
    pub file_name: String,
    pub file_url: String,
    pub damage: Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Prediction>,
}

impl DamageReport {
    pub fn is_damaged(&self) -> bool {
        self.damage.index == DAMAGED_CLASS_INDEX
    }
}
