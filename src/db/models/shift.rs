use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ShiftKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub kind: ShiftKind,
    pub count: u32,
    pub alerted: bool,
    pub created_at: DateTime<Utc>,
}
