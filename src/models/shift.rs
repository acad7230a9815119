use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ShiftKind {
    Open,
    Booked,
}

impl ShiftKind {
    pub const ALL: [ShiftKind; 2] = [ShiftKind::Open, ShiftKind::Booked];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftKind::Open => "open",
            ShiftKind::Booked => "booked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(ShiftKind::Open),
            "booked" => Some(ShiftKind::Booked),
            _ => None,
        }
    }
}

/// What one screenshot says about one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedShift {
    pub kind: ShiftKind,
    pub count: u32,
}

/// An open, available, not-yet-alerted date ready for notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedDate {
    pub date: NaiveDate,
    pub count: u32,
}
