use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::decimal::Money;

/// admission number, the unique key of a student
pub type AdmNo = String;

/// canonical class identifier
///
/// Built once at ingestion so that `"5A"`, `"5 A"`, `"STD 5A"` and `"std-5a"`
/// all compare equal afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassId(String);

impl ClassId {
    pub fn new(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        let mut rest = upper.as_str();
        for prefix in ["CLASS", "STD.", "STD"] {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
                break;
            }
        }
        ClassId(
            rest.chars()
                .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClassId {
    fn from(raw: String) -> Self {
        ClassId::new(&raw)
    }
}

impl From<&str> for ClassId {
    fn from(raw: &str) -> Self {
        ClassId::new(raw)
    }
}

impl From<ClassId> for String {
    fn from(id: ClassId) -> Self {
        id.0
    }
}

/// normalized fee head name used for grouping and lookup
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeeHeadKey(String);

impl FeeHeadKey {
    pub fn new(name: &str) -> Self {
        FeeHeadKey(
            name.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeeHeadKey {
    fn from(name: &str) -> Self {
        FeeHeadKey::new(name)
    }
}

/// student record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub adm_no: AdmNo,
    pub name: String,
    pub class: ClassId,
    pub email: Option<String>,
    pub parent_contact: Option<String>,
}

impl Student {
    pub fn new(adm_no: impl Into<AdmNo>, name: impl Into<String>, class: &str) -> Self {
        Self {
            adm_no: adm_no.into(),
            name: name.into(),
            class: ClassId::new(class),
            email: None,
            parent_contact: None,
        }
    }
}

/// one line of a class fee schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHead {
    pub class: ClassId,
    pub fee_head: String,
    pub amount: Money,
    pub due_date: Option<NaiveDate>,
}

impl FeeHead {
    pub fn new(class: &str, fee_head: impl Into<String>, amount: Money) -> Self {
        Self {
            class: ClassId::new(class),
            fee_head: fee_head.into(),
            amount,
            due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn key(&self) -> FeeHeadKey {
        FeeHeadKey::new(&self.fee_head)
    }
}

/// a payment event as recorded by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub adm_no: AdmNo,
    pub fee_head: String,
    pub amount: Money,
    pub fine: Money,
    pub date: Option<NaiveDate>,
    pub mode: String,
    pub receipt_no: String,
    pub voided: bool,
    pub class: Option<ClassId>,
    pub name: Option<String>,
}

impl Transaction {
    pub fn new(adm_no: impl Into<AdmNo>, fee_head: impl Into<String>, amount: Money) -> Self {
        Self {
            adm_no: adm_no.into(),
            fee_head: fee_head.into(),
            amount,
            fine: Money::ZERO,
            date: None,
            mode: String::new(),
            receipt_no: String::new(),
            voided: false,
            class: None,
            name: None,
        }
    }

    pub fn with_fine(mut self, fine: Money) -> Self {
        self.fine = fine;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn receipt(mut self, receipt_no: impl Into<String>) -> Self {
        self.receipt_no = receipt_no.into();
        self
    }

    pub fn void(mut self) -> Self {
        self.voided = true;
        self
    }

    pub fn key(&self) -> FeeHeadKey {
        FeeHeadKey::new(&self.fee_head)
    }

    /// amount plus fine, what the cashier actually received
    pub fn collected(&self) -> Money {
        self.amount + self.fine
    }
}

/// backend void marker: any value starting with "y" or "Y"
pub fn is_void_marker(raw: &str) -> bool {
    raw.trim_start()
        .chars()
        .next()
        .map(|c| c.eq_ignore_ascii_case(&'y'))
        .unwrap_or(false)
}

/// payment status of a student or fee head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    /// everything required has been paid
    Paid,
    /// something paid, not everything
    Partial,
    /// nothing paid yet
    Pending,
    /// no fee heads apply to the student's class
    NoFees,
}

impl PaymentStatus {
    pub fn classify(total_paid: Money, total_required: Money) -> Self {
        if total_required.is_zero() {
            PaymentStatus::NoFees
        } else if total_paid >= total_required {
            PaymentStatus::Paid
        } else if total_paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Pending => "pending",
            PaymentStatus::NoFees => "no-fees",
        }
    }
}

/// a person reference that the backend sends either as a bare string or as a
/// `{name, email}` object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Identifier {
    Email(String),
    Name(String),
}

impl Identifier {
    pub fn resolve(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(s) => Self::from_text(s),
            Value::Object(map) => {
                let field = |k: &str| {
                    map.get(k)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                };
                field("email")
                    .map(|e| Identifier::Email(e.to_lowercase()))
                    .or_else(|| field("name").map(|n| Identifier::Name(n.to_string())))
            }
            _ => None,
        }
    }

    fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            None
        } else if s.contains('@') {
            Some(Identifier::Email(s.to_lowercase()))
        } else {
            Some(Identifier::Name(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Email(v) | Identifier::Name(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_class_id_canonical_forms() {
        let expected = ClassId::new("5A");
        assert_eq!(ClassId::new("5 A"), expected);
        assert_eq!(ClassId::new("STD 5A"), expected);
        assert_eq!(ClassId::new("std-5a"), expected);
        assert_eq!(ClassId::new("  Std. 5 a "), expected);
        assert_eq!(ClassId::new("Class 10").as_str(), "10");
        assert_ne!(ClassId::new("5A"), ClassId::new("5B"));
    }

    #[test]
    fn test_class_id_serde_canonicalizes() {
        let id: ClassId = serde_json::from_value(json!("std 6 b")).unwrap();
        assert_eq!(id.as_str(), "6B");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("6B"));
    }

    #[test]
    fn test_fee_head_key() {
        assert_eq!(FeeHeadKey::new("  Tuition  Fee"), FeeHeadKey::new("tuition fee"));
        assert_ne!(FeeHeadKey::new("Tuition"), FeeHeadKey::new("Transport"));
    }

    #[test]
    fn test_void_marker() {
        assert!(is_void_marker("Y"));
        assert!(is_void_marker("yes"));
        assert!(is_void_marker(" Yes"));
        assert!(!is_void_marker(""));
        assert!(!is_void_marker("N"));
        assert!(!is_void_marker("no"));
    }

    #[test]
    fn test_status_classification() {
        let required = Money::from_major(1_000);
        let status =
            |paid: i64, required: Money| PaymentStatus::classify(Money::from_major(paid), required);
        assert_eq!(status(1_000, required), PaymentStatus::Paid);
        assert_eq!(status(1_200, required), PaymentStatus::Paid);
        assert_eq!(status(1, required), PaymentStatus::Partial);
        assert_eq!(status(0, required), PaymentStatus::Pending);
        assert_eq!(status(50, Money::ZERO), PaymentStatus::NoFees);
        assert_eq!(serde_json::to_value(PaymentStatus::NoFees).unwrap(), json!("no-fees"));
    }

    #[test]
    fn test_identifier_resolution() {
        assert_eq!(
            Identifier::resolve(&json!("R.Sharma@School.org")),
            Some(Identifier::Email("r.sharma@school.org".to_string()))
        );
        assert_eq!(
            Identifier::resolve(&json!("Ritu Sharma")),
            Some(Identifier::Name("Ritu Sharma".to_string()))
        );
        assert_eq!(
            Identifier::resolve(&json!({"name": "Ritu Sharma", "email": "ritu@school.org"})),
            Some(Identifier::Email("ritu@school.org".to_string()))
        );
        assert_eq!(
            Identifier::resolve(&json!({"name": "Ritu Sharma", "email": ""})),
            Some(Identifier::Name("Ritu Sharma".to_string()))
        );
        assert_eq!(Identifier::resolve(&json!("  ")), None);
        assert_eq!(Identifier::resolve(&json!(42)), None);
    }
}
