//! Shared type definitions for the casino core
//!
//! Canonical money, account and log record types used by the ledger, the
//! repositories and the game tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

const CENTS_PER_UNIT: i64 = 100;

/// Fixed-point currency amount, stored as a whole number of cents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Money(units * CENTS_PER_UNIT)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiply by an integer payout multiple (roulette, blackjack)
    pub fn times(self, multiple: i64) -> Money {
        Money(self.0 * multiple)
    }

    /// Multiply by a real multiplier, rounded to the nearest cent (crash cash-out)
    pub fn scale(self, multiplier: f64) -> Money {
        Money((self.0 as f64 * multiplier).round() as i64)
    }

    pub fn as_units_f64(self) -> f64 {
        self.0 as f64 / CENTS_PER_UNIT as f64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / CENTS_PER_UNIT as u64;
        let cents = abs % CENTS_PER_UNIT as u64;

        let digits = units.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{}${}.{:02}", sign, grouped, cents)
    }
}

impl FromStr for Money {
    type Err = String;

    /// Parses plain decimal amounts such as `250`, `12.5` or `-3.75`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match body.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (body, None),
        };

        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        let fraction_ok = fraction.map_or(true, |f| digits(f) && f.len() <= 2);
        if !digits(whole) || !fraction_ok {
            return Err(format!("not a currency amount: '{}'", s));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| format!("amount out of range: '{}'", s))?;
        let fraction: i64 = match fraction {
            Some(f) => format!("{:0<2}", f)
                .parse()
                .map_err(|_| format!("not a currency amount: '{}'", s))?,
            None => 0,
        };

        let cents = whole
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| format!("amount out of range: '{}'", s))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// Games offered by the casino
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GameKind {
    Blackjack,
    Roulette,
    Crash,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Blackjack => write!(f, "Blackjack"),
            GameKind::Roulette => write!(f, "Roulette"),
            GameKind::Crash => write!(f, "Crash"),
        }
    }
}

/// Reasons a balance changes outside of a wager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    InitialDeposit,
    Deposit,
    AdminDeposit,
    AdminWithdrawal,
    ReferralBonus,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::InitialDeposit => write!(f, "initial_deposit"),
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::AdminDeposit => write!(f, "admin_deposit"),
            TransactionKind::AdminWithdrawal => write!(f, "admin_withdrawal"),
            TransactionKind::ReferralBonus => write!(f, "referral_bonus"),
        }
    }
}

/// Player account as stored by the repository
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique account name
    pub name: String,
    /// Hex-encoded SHA-256 digest of the password
    pub password_hash: String,
    /// Current balance, never negative
    pub balance: Money,
    /// Unique six character invitation code
    pub referral_code: String,
    pub created_at: DateTime<Utc>,
}

/// Name and balance pair for admin listings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSummary {
    pub name: String,
    pub balance: Money,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            balance: account.balance,
        }
    }
}

/// Settled wager, written once per accepted bet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetRecord {
    /// Monotonic sequence number assigned by the repository
    pub id: u64,
    pub account: String,
    pub game: GameKind,
    pub wager: Money,
    pub winnings: Money,
    /// winnings - wager
    pub outcome: Money,
    pub timestamp: DateTime<Utc>,
}

/// Non-wager balance change
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Monotonic sequence number assigned by the repository
    pub id: u64,
    pub account: String,
    pub kind: TransactionKind,
    /// Signed amount; withdrawals are negative
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

/// Filter for log reads: optional substring match on the account name and a row cap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub account_filter: Option<String>,
    pub limit: usize,
}

impl LogQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            account_filter: None,
            limit,
        }
    }

    pub fn for_account(filter: impl Into<String>, limit: usize) -> Self {
        Self {
            account_filter: Some(filter.into()),
            limit,
        }
    }

    pub fn matches(&self, account: &str) -> bool {
        match &self.account_filter {
            Some(filter) => account.contains(filter.as_str()),
            None => true,
        }
    }
}

/// Aggregate figures shown on the admin statistics tab
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CasinoStats {
    pub total_accounts: usize,
    pub total_balance: Money,
}

pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
