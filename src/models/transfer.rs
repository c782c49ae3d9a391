use serde::{Deserialize, Serialize};

/// Kind of transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    Permanent,
    Loan,
    Free,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Permanent => "permanent",
            TransferType::Loan => "loan",
            TransferType::Free => "free",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "loan" => TransferType::Loan,
            "free" => TransferType::Free,
            _ => TransferType::Permanent,
        }
    }
}

/// A player move between clubs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Option<i64>,
    pub player_id: i64,
    pub from_team_id: Option<i64>,
    pub to_team_id: Option<i64>,
    pub league_id: Option<i64>,
    /// Fee in euros
    pub fee: Option<f64>,
    pub transfer_type: TransferType,
    pub contract_start: Option<String>,
    pub contract_end: Option<String>,
    pub market_value: Option<f64>,
    pub transfer_date: String,
}
