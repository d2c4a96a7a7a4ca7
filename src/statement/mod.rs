use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    format::{format_btc, format_percent, format_usd, SATS_PER_BTC},
    ledger::Sats,
};

pub type Cents = u64;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StatementError {
    #[error("unknown withdrawal {0}")]
    UnknownWithdrawal(String),
}

/// A recurring deposit converted to BTC.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purchase {
    pub date: String,
    pub time: String,
    pub contributed_cents: Cents,
    pub btc_price_cents: Cents,
    pub btc_acquired_sats: Sats,
    pub current_value_cents: Cents,
}

impl Purchase {
    pub fn gain_cents(&self) -> i64 {
        self.current_value_cents as i64 - self.contributed_cents as i64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Withdrawal {
    pub id: String,
    pub date: String,
    pub time: String,
    pub amount_cents: Cents,
    pub btc_sats: Sats,
    pub btc_price_cents: Cents,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioSummary {
    pub total_contributed_cents: Cents,
    pub total_current_cents: Cents,
    pub total_btc_sats: Sats,
    pub pnl_cents: i64,
    pub pnl_pct: f64,
    pub avg_price_cents: Cents,
}

impl PortfolioSummary {
    /// Aggregate over deposits only; withdrawals do not count towards P&L.
    pub fn from_purchases(purchases: &[Purchase]) -> Self {
        let total_contributed_cents: Cents = purchases.iter().map(|p| p.contributed_cents).sum();
        let total_current_cents: Cents = purchases.iter().map(|p| p.current_value_cents).sum();
        let total_btc_sats: Sats = purchases.iter().map(|p| p.btc_acquired_sats).sum();
        let pnl_cents = total_current_cents as i64 - total_contributed_cents as i64;
        let pnl_pct = if total_contributed_cents > 0 {
            pnl_cents as f64 / total_contributed_cents as f64 * 100.0
        } else {
            0.0
        };
        let avg_price_cents = if total_btc_sats > 0 {
            (total_contributed_cents as u128 * SATS_PER_BTC as u128 / total_btc_sats as u128)
                as Cents
        } else {
            0
        };
        Self {
            total_contributed_cents,
            total_current_cents,
            total_btc_sats,
            pnl_cents,
            pnl_pct,
            avg_price_cents,
        }
    }

    pub fn is_gain(&self) -> bool {
        self.pnl_cents >= 0
    }

    /// `"$6,200.00 (12.50%)"` style P&L line.
    pub fn pnl_label(&self) -> String {
        format!(
            "{} ({})",
            format_usd(self.pnl_cents),
            format_percent(self.pnl_pct)
        )
    }

    pub fn holdings_label(&self) -> String {
        format!("₿{}", format_btc(self.total_btc_sats))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatementItem {
    Deposit(Purchase),
    Withdraw(Withdrawal),
}

impl StatementItem {
    pub fn date(&self) -> &str {
        match self {
            StatementItem::Deposit(p) => &p.date,
            StatementItem::Withdraw(w) => &w.date,
        }
    }
}

/// Deposits and withdrawals in one list, most recent first.
#[derive(Clone, Debug, Default)]
pub struct Statement {
    items: Vec<StatementItem>,
    vetoed: BTreeSet<String>,
}

impl Statement {
    pub fn new(purchases: Vec<Purchase>, withdrawals: Vec<Withdrawal>) -> Self {
        let mut items: Vec<StatementItem> = withdrawals
            .into_iter()
            .map(StatementItem::Withdraw)
            .chain(purchases.into_iter().map(StatementItem::Deposit))
            .collect();
        // ISO dates sort lexically; stable so same-day withdrawals stay first
        items.sort_by(|a, b| b.date().cmp(a.date()));
        Self {
            items,
            vetoed: BTreeSet::new(),
        }
    }

    pub fn items(&self) -> &[StatementItem] {
        &self.items
    }

    pub fn summary(&self) -> PortfolioSummary {
        let purchases: Vec<Purchase> = self
            .items
            .iter()
            .filter_map(|item| match item {
                StatementItem::Deposit(p) => Some(p.clone()),
                StatementItem::Withdraw(_) => None,
            })
            .collect();
        PortfolioSummary::from_purchases(&purchases)
    }

    /// Veto a withdrawal. Returns `false` when it was already vetoed.
    pub fn veto(&mut self, id: &str) -> Result<bool, StatementError> {
        let known = self
            .items
            .iter()
            .any(|item| matches!(item, StatementItem::Withdraw(w) if w.id == id));
        if !known {
            return Err(StatementError::UnknownWithdrawal(id.to_string()));
        }
        let fresh = self.vetoed.insert(id.to_string());
        if fresh {
            info!(withdrawal = id, "withdrawal vetoed");
        }
        Ok(fresh)
    }

    pub fn is_vetoed(&self, id: &str) -> bool {
        self.vetoed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(date: &str, contributed: Cents, sats: Sats, current: Cents) -> Purchase {
        Purchase {
            date: date.into(),
            time: "09:00".into(),
            contributed_cents: contributed,
            btc_price_cents: 0,
            btc_acquired_sats: sats,
            current_value_cents: current,
        }
    }

    fn withdrawal(id: &str, date: &str) -> Withdrawal {
        Withdrawal {
            id: id.into(),
            date: date.into(),
            time: "15:10".into(),
            amount_cents: 30_000,
            btc_sats: 600_000,
            btc_price_cents: 5_000_000,
        }
    }

    #[test]
    fn summary_over_deposits() {
        let purchases = vec![
            purchase("2024-01-15", 50_000, 1_186_700, 122_230),
            purchase("2024-04-15", 50_000, 390_625, 40_234),
        ];
        let summary = PortfolioSummary::from_purchases(&purchases);
        assert_eq!(summary.total_contributed_cents, 100_000);
        assert_eq!(summary.total_current_cents, 162_464);
        assert_eq!(summary.total_btc_sats, 1_577_325);
        assert_eq!(summary.pnl_cents, 62_464);
        assert!((summary.pnl_pct - 62.464).abs() < 1e-9);
        // $1,000 for 0.01577325 BTC
        assert_eq!(summary.avg_price_cents, 6_339_847);
        assert!(summary.is_gain());
        assert_eq!(summary.pnl_label(), "$624.64 (62.46%)");
        assert_eq!(summary.holdings_label(), "₿0.01577325");
        assert_eq!(purchases[1].gain_cents(), -9_766);
    }

    #[test]
    fn empty_summary_has_no_division() {
        let summary = PortfolioSummary::from_purchases(&[]);
        assert_eq!(summary.pnl_pct, 0.0);
        assert_eq!(summary.avg_price_cents, 0);
    }

    #[test]
    fn statement_is_newest_first_with_withdrawals_ahead_on_ties() {
        let statement = Statement::new(
            vec![
                purchase("2024-01-15", 1, 1, 1),
                purchase("2024-02-28", 1, 1, 1),
                purchase("2024-03-15", 1, 1, 1),
            ],
            vec![withdrawal("w-2024-02", "2024-02-28")],
        );
        let dates: Vec<&str> = statement.items().iter().map(|i| i.date()).collect();
        assert_eq!(
            dates,
            vec!["2024-03-15", "2024-02-28", "2024-02-28", "2024-01-15"]
        );
        assert!(matches!(statement.items()[1], StatementItem::Withdraw(_)));
        assert_eq!(statement.summary().total_contributed_cents, 3);
    }

    #[test]
    fn veto_is_recorded_once() {
        let mut statement = Statement::new(vec![], vec![withdrawal("w-1", "2024-06-28")]);
        assert!(!statement.is_vetoed("w-1"));
        assert_eq!(statement.veto("w-1"), Ok(true));
        assert_eq!(statement.veto("w-1"), Ok(false));
        assert!(statement.is_vetoed("w-1"));
        assert_eq!(
            statement.veto("w-9"),
            Err(StatementError::UnknownWithdrawal("w-9".into()))
        );
    }
}
