//! Finishing position parsing.
//!
//! Form rows store positions as `"pos/field"` (e.g. `"2/11"`) or as a
//! non-finish code (`"PU"`, `"F"`, ...). Both are classified explicitly.

use serde::Serialize;

/// Reason a runner did not complete the race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NonFinishCode {
    Fell,
    PulledUp,
    UnseatedRider,
    Refused,
    BroughtDown,
    SlippedUp,
    RanOut,
    CarriedOut,
    Disqualified,
    Void,
}

impl NonFinishCode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "F" => Some(Self::Fell),
            "PU" => Some(Self::PulledUp),
            "U" | "UR" => Some(Self::UnseatedRider),
            "R" | "REF" => Some(Self::Refused),
            "BD" => Some(Self::BroughtDown),
            "SU" => Some(Self::SlippedUp),
            "RO" => Some(Self::RanOut),
            "CO" => Some(Self::CarriedOut),
            "DSQ" => Some(Self::Disqualified),
            "VOI" | "VOID" => Some(Self::Void),
            _ => None,
        }
    }

    /// Codes penalised by the points scorer
    pub fn is_penalised(&self) -> bool {
        matches!(
            self,
            Self::Fell | Self::PulledUp | Self::UnseatedRider | Self::Refused
        )
    }
}

/// Classified finishing position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishingPosition {
    Finished { rank: u32, field_size: Option<u32> },
    DidNotFinish(NonFinishCode),
    Unrecognised(String),
}

impl FinishingPosition {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(code) = NonFinishCode::from_code(trimmed) {
            return Self::DidNotFinish(code);
        }

        let (rank_part, field_part) = match trimmed.split_once('/') {
            Some((rank, field)) => (rank, Some(field)),
            None => (trimmed, None),
        };

        // Non-finish codes can also appear in the rank slot ("PU/12")
        if field_part.is_some() {
            if let Some(code) = NonFinishCode::from_code(rank_part) {
                return Self::DidNotFinish(code);
            }
        }

        let rank = match rank_part.trim().parse::<u32>() {
            Ok(r) if r > 0 => r,
            _ => return Self::Unrecognised(trimmed.to_string()),
        };

        let field_size = match field_part {
            Some(field) => match field.trim().parse::<u32>() {
                Ok(f) if f > 0 => Some(f),
                _ => return Self::Unrecognised(trimmed.to_string()),
            },
            None => None,
        };

        Self::Finished { rank, field_size }
    }

    pub fn rank(&self) -> Option<u32> {
        match self {
            Self::Finished { rank, .. } => Some(*rank),
            _ => None,
        }
    }

    /// `(rank, field_size)` when both are known
    pub fn rank_and_field(&self) -> Option<(u32, u32)> {
        match self {
            Self::Finished {
                rank,
                field_size: Some(field),
            } => Some((*rank, *field)),
            _ => None,
        }
    }

    pub fn is_win(&self) -> bool {
        self.rank() == Some(1)
    }
}
