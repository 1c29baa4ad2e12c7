//! Persistent domain records.
//!
//! Ledger records (`Transaction`, `InvestmentEvent`) are append-only:
//! nothing updates or deletes them except a slot reset.

use crate::{
    money::Money,
    types::{EntityId, GameDay, SlotId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Enums stored as TEXT columns.
macro_rules! sql_text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(text: &str) -> Option<Self> {
                match text {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                Self::parse(text).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} '{}'", stringify!($name), text).into(),
                    )
                })
            }
        }
    };
}

// ── Slot ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    pub slot_id: SlotId,
    pub liquid_cash: Money,
    pub invested_amount: Money,
    pub asset_price: Money,
    /// Annual rate offered on new mortgages.
    pub mortgage_rate: Decimal,
    /// Derived from `game_ms`; kept for display and read models.
    pub game_day: f64,
    pub next_dividend_day: GameDay,
    pub next_growth_day: GameDay,
    pub last_observed_at: Option<DateTime<Utc>>,
    /// Bumped on every save; a stale version means a lost update.
    pub version: i64,
    /// Total elapsed game time in real milliseconds. Whole days are
    /// counted from this, never from `game_day`.
    pub game_ms: i64,
}

impl SlotState {
    pub fn current_day(&self) -> GameDay {
        self.game_day.floor() as GameDay
    }

    pub fn total_assets(&self) -> Money {
        self.liquid_cash + self.invested_amount
    }
}

// ── Clients and jobs ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub client_id: EntityId,
    pub slot_id: SlotId,
    pub name: String,
    pub checking_balance: Money,
    pub daily_withdrawn: Money,
    /// Derived caches owned by collaborators; spending only reads them.
    pub cached_monthly_income: Option<Money>,
    pub cached_monthly_mandatory: Money,
    pub cached_monthly_rent: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub assignment_id: EntityId,
    pub slot_id: SlotId,
    pub client_id: EntityId,
    pub job_id: String,
    pub next_payday: f64,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

// ── Ledger ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentEventKind {
    Growth,
    Dividend,
    Invest,
    Divest,
}

sql_text_enum!(InvestmentEventKind {
    Growth => "GROWTH",
    Dividend => "DIVIDEND",
    Invest => "INVEST",
    Divest => "DIVEST",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentEvent {
    pub slot_id: SlotId,
    pub kind: InvestmentEventKind,
    pub asset: String,
    pub amount: Money,
    pub game_day: GameDay,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    PayrollDeposit,
    RentPayment,
    PaymentFailed,
    Spending,
    MortgageDownPayment,
}

sql_text_enum!(TransactionKind {
    Deposit => "DEPOSIT",
    Withdrawal => "WITHDRAWAL",
    PayrollDeposit => "PAYROLL_DEPOSIT",
    RentPayment => "RENT_PAYMENT",
    PaymentFailed => "PAYMENT_FAILED",
    Spending => "SPENDING",
    MortgageDownPayment => "MORTGAGE_DOWN_PAYMENT",
});

impl TransactionKind {
    /// Money flowing into the client's checking account.
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::PayrollDeposit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: EntityId,
    pub slot_id: SlotId,
    pub client_id: EntityId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub game_day: GameDay,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        client: &ClientAccount,
        kind: TransactionKind,
        amount: Money,
        game_day: GameDay,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            slot_id: client.slot_id,
            client_id: client.client_id.clone(),
            kind,
            amount,
            game_day,
            created_at,
        }
    }
}

// ── Property market and mortgages ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Available,
    Owned,
    Removed,
}

sql_text_enum!(PropertyStatus {
    Available => "AVAILABLE",
    Owned => "OWNED",
    Removed => "REMOVED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub property_id: EntityId,
    pub slot_id: SlotId,
    pub name: String,
    pub price: Money,
    pub status: PropertyStatus,
    pub owner_client_id: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MortgageStatus {
    Pending,
    Accepted,
    Rejected,
}

sql_text_enum!(MortgageStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
});

/// Where an accepted mortgage stands in its repayment life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentState {
    Current,
    Delinquent,
    Repossessed,
    PaidOff,
}

sql_text_enum!(RepaymentState {
    Current => "CURRENT",
    Delinquent => "DELINQUENT",
    Repossessed => "REPOSSESSED",
    PaidOff => "PAID_OFF",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgagePosition {
    pub mortgage_id: EntityId,
    pub slot_id: SlotId,
    pub client_id: EntityId,
    pub property_id: EntityId,
    pub property_price: Money,
    pub down_payment: Money,
    pub loan_amount: Money,
    pub interest_rate: Decimal,
    pub term_years: u32,
    pub status: MortgageStatus,
    pub repayment: Option<RepaymentState>,
    pub monthly_payment: Option<Money>,
    pub next_payment_day: Option<GameDay>,
    pub missed_payments: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Read models ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub slot_id: SlotId,
    pub client_count: usize,
    pub game_day: f64,
    pub liquid_cash: Money,
    pub has_data: bool,
}

/// Cumulative credits vs debits per whole day, from day 0 to today.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySeries {
    pub days: Vec<GameDay>,
    pub cumulative_deposits: Vec<Money>,
    pub cumulative_withdrawals: Vec<Money>,
}

/// One client's checking balance, for the distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientBalance {
    pub client_id: String,
    pub name: String,
    pub balance: Money,
}
