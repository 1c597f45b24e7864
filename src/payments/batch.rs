use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::PaymentConfig;
use crate::decimal::Money;
use crate::envelope::{lenient_opt_string, money_number};
use crate::errors::{LedgerError, Result};
use crate::ledger::{FeeHeadLedgerItem, StudentLedger};
use crate::types::{AdmNo, ClassId, FeeHeadKey};

/// backend action name for recording a payment
pub const ADD_PAYMENT_BATCH: &str = "addPaymentBatch";

/// one line of a payment batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentItem {
    pub fee_head: String,
    #[serde(with = "money_number")]
    pub amount: Money,
    #[serde(default, with = "money_number")]
    pub fine: Money,
}

impl PaymentItem {
    pub fn new(fee_head: impl Into<String>, amount: Money) -> Self {
        Self {
            fee_head: fee_head.into(),
            amount,
            fine: Money::ZERO,
        }
    }

    pub fn with_fine(mut self, fine: Money) -> Self {
        self.fine = fine;
        self
    }

    pub fn total(&self) -> Money {
        self.amount + self.fine
    }
}

/// request body for `addPaymentBatch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBatch {
    pub action: String,
    pub date: NaiveDate,
    pub adm_no: AdmNo,
    pub name: String,
    pub cls: ClassId,
    pub mode: String,
    pub items: Vec<PaymentItem>,
}

impl PaymentBatch {
    /// validate a cashier's selection against the student's ledger
    ///
    /// Lines for the same fee head are merged. Every head must still have a
    /// balance and every line must collect something. Amounts above the
    /// head balance, or fines above the assessed fine, are rejected unless
    /// overpayment is allowed.
    pub fn from_selection(
        ledger: &StudentLedger,
        date: NaiveDate,
        mode: &str,
        selection: &[PaymentItem],
        config: &PaymentConfig,
    ) -> Result<Self> {
        let mut merged: Vec<(FeeHeadKey, PaymentItem)> = Vec::new();
        for line in selection {
            let key = FeeHeadKey::new(&line.fee_head);
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some((_, item)) => {
                    item.amount += line.amount;
                    item.fine += line.fine;
                }
                None => merged.push((key, line.clone())),
            }
        }

        if merged.is_empty() {
            return Err(LedgerError::EmptyBatch {
                adm_no: ledger.adm_no.clone(),
            });
        }

        let mut items = Vec::with_capacity(merged.len());
        for (_, line) in merged {
            let head = payable_head(ledger, &line.fee_head)?;
            validate_line(&line, head, config)?;
            items.push(PaymentItem {
                fee_head: head.fee_head.clone(),
                amount: line.amount,
                fine: line.fine,
            });
        }

        Ok(Self {
            action: ADD_PAYMENT_BATCH.to_string(),
            date,
            adm_no: ledger.adm_no.clone(),
            name: ledger.name.clone(),
            cls: ledger.class.clone(),
            mode: mode.trim().to_string(),
            items,
        })
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(PaymentItem::total).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn payable_head<'a>(
    ledger: &'a StudentLedger,
    fee_head: &str,
) -> Result<&'a FeeHeadLedgerItem> {
    ledger
        .item(fee_head)
        .filter(|item| item.balance.is_positive())
        .ok_or_else(|| LedgerError::FeeHeadNotPayable {
            adm_no: ledger.adm_no.clone(),
            fee_head: fee_head.trim().to_string(),
        })
}

fn validate_line(
    line: &PaymentItem,
    head: &FeeHeadLedgerItem,
    config: &PaymentConfig,
) -> Result<()> {
    if line.amount.is_negative() || line.fine.is_negative() || line.total().is_zero() {
        return Err(LedgerError::InvalidPayment {
            fee_head: head.fee_head.clone(),
            amount: line.amount,
        });
    }

    if !config.allow_overpayment && line.amount > head.balance {
        return Err(LedgerError::PaymentExceedsBalance {
            fee_head: head.fee_head.clone(),
            balance: head.balance,
            requested: line.amount,
        });
    }

    if !config.allow_overpayment && line.fine > head.fine {
        return Err(LedgerError::FineExceedsAssessed {
            fee_head: head.fee_head.clone(),
            assessed: head.fine,
            requested: line.fine,
        });
    }

    Ok(())
}

/// how a lump sum was split across fee heads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub items: Vec<PaymentItem>,
    /// part of the lump sum nothing was owed against
    pub excess: Money,
}

impl Allocation {
    pub fn applied(&self) -> Money {
        self.items.iter().map(PaymentItem::total).sum()
    }

    /// batch for the allocated lines
    pub fn to_batch(
        &self,
        ledger: &StudentLedger,
        date: NaiveDate,
        mode: &str,
        config: &PaymentConfig,
    ) -> Result<PaymentBatch> {
        PaymentBatch::from_selection(ledger, date, mode, &self.items, config)
    }
}

#[derive(Debug, Clone, Copy)]
enum Component {
    Fine,
    Principal,
}

/// split a lump sum across payable heads, oldest due date first
///
/// Undated heads come after dated ones, in schedule order. Within a head
/// the fine is settled before the amount when `fines_first` is set.
pub fn allocate_lump_sum(
    ledger: &StudentLedger,
    amount: Money,
    fines_first: bool,
) -> Result<Allocation> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidPayment {
            fee_head: "lump sum".to_string(),
            amount,
        });
    }

    let mut heads: Vec<&FeeHeadLedgerItem> = ledger.payable_items().collect();
    heads.sort_by_key(|item| (item.due_date.is_none(), item.due_date));

    let order = if fines_first {
        [Component::Fine, Component::Principal]
    } else {
        [Component::Principal, Component::Fine]
    };

    let mut remaining = amount;
    let mut items = Vec::new();

    for head in heads {
        let mut line = PaymentItem::new(head.fee_head.clone(), Money::ZERO);
        for component in order {
            let (owed, applied) = match component {
                Component::Fine => (head.fine, &mut line.fine),
                Component::Principal => (head.balance, &mut line.amount),
            };
            let payment = remaining.min(owed);
            *applied = payment;
            remaining -= payment;
        }

        if !line.total().is_zero() {
            items.push(line);
        }
        if remaining.is_zero() {
            break;
        }
    }

    debug!(
        adm_no = %ledger.adm_no,
        %amount,
        lines = items.len(),
        excess = %remaining,
        "lump sum allocated"
    );

    Ok(Allocation {
        items,
        excess: remaining,
    })
}

/// backend reply to `addPaymentBatch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub receipt_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub date: Option<String>,
    #[serde(default)]
    pub partial_payments: Option<Value>,
    #[serde(default, alias = "error", deserialize_with = "lenient_opt_string")]
    pub message: Option<String>,
}

impl BatchReceipt {
    /// parse a reply body, unwrapping a `{data: {...}}` envelope if present
    pub fn parse(body: &str) -> Result<Self> {
        let mut raw: Value = serde_json::from_str(body)?;
        if let Some(inner) = raw.get_mut("data").filter(|d| d.is_object()) {
            raw = inner.take();
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// `ok: true`, a success status, or a bare receipt number
    pub fn is_success(&self) -> bool {
        if let Some(ok) = self.ok {
            return ok;
        }
        match self.status.as_deref() {
            Some(status) => ["ok", "success"]
                .iter()
                .any(|s| status.eq_ignore_ascii_case(s)),
            None => self.receipt_no.is_some(),
        }
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(LedgerError::ApiFailure {
                message: self
                    .message
                    .clone()
                    .or_else(|| self.status.clone())
                    .unwrap_or_else(|| "payment was not recorded".to_string()),
            })
        }
    }
}
