use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dates::parse_local_date;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::grading::GradeBoundary;
use crate::types::{is_void_marker, ClassId, FeeHead, Student, Transaction};

/// unwrap the array carried by any of the backend's response shapes
///
/// Accepted: a bare array, `{data: [...]}`, `{data: {data: [...]}}` and
/// `{success, data}`. `success: false` is an api failure; a null or missing
/// `data` on a successful response is an empty list.
pub fn normalize_array_response(raw: Value) -> Result<Vec<Value>> {
    match raw {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                let message = ["message", "error"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .unwrap_or("request failed")
                    .to_string();
                return Err(LedgerError::ApiFailure { message });
            }

            match map.remove("data") {
                Some(Value::Array(items)) => Ok(items),
                Some(Value::Object(mut inner)) => match inner.remove("data") {
                    Some(Value::Array(items)) => Ok(items),
                    Some(Value::Null) | None if inner.is_empty() => Ok(Vec::new()),
                    _ => Err(LedgerError::InvalidResponse {
                        message: "nested data is not an array".to_string(),
                    }),
                },
                Some(Value::Null) => Ok(Vec::new()),
                None if map.contains_key("success") => Ok(Vec::new()),
                Some(other) => Err(LedgerError::InvalidResponse {
                    message: format!("data is not an array: {}", type_name(&other)),
                }),
                None => Err(LedgerError::InvalidResponse {
                    message: "object response without data".to_string(),
                }),
            }
        }
        other => Err(LedgerError::InvalidResponse {
            message: format!("expected array or object, got {}", type_name(&other)),
        }),
    }
}

/// parse a response body and unwrap its array
pub fn parse_response(body: &str) -> Result<Vec<Value>> {
    normalize_array_response(serde_json::from_str(body)?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// a record that failed to decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// decoded records plus the ones that were dropped
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRecord>,
}

/// decode every element, skipping the malformed ones
pub fn decode_records<T: DeserializeOwned>(kind: &str, values: Vec<Value>) -> Decoded<T> {
    let mut records = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(kind, index, error = %e, "skipping malformed record");
                skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(kind, decoded = records.len(), skipped = skipped.len(), "records decoded");
    Decoded { records, skipped }
}

/// amounts travel as plain json numbers; inbound values go through `Money::coerce`
pub mod money_number {
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use crate::decimal::Money;

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        let d = money.as_decimal();
        if d.fract().is_zero() {
            if let Some(whole) = d.to_i64() {
                return serializer.serialize_i64(whole);
            }
        }
        serializer.serialize_f64(d.to_f64().unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Money::coerce(&raw))
    }
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {}",
            type_name(&other)
        ))),
    }
}

pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// row of `getStudents`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub adm_no: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub name: Option<String>,
    #[serde(default, alias = "cls", deserialize_with = "lenient_opt_string")]
    pub class: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub email: Option<String>,
    #[serde(default, alias = "contact", deserialize_with = "lenient_opt_string")]
    pub parent_contact: Option<String>,
}

impl StudentRecord {
    pub fn into_domain(self) -> Student {
        Student {
            adm_no: self.adm_no,
            name: self.name.unwrap_or_default(),
            class: ClassId::new(self.class.as_deref().unwrap_or_default()),
            email: self.email,
            parent_contact: self.parent_contact,
        }
    }
}

/// row of `feeheads`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHeadRecord {
    #[serde(alias = "cls", deserialize_with = "lenient_string")]
    pub class: String,
    #[serde(alias = "feehead", deserialize_with = "lenient_string")]
    pub fee_head: String,
    #[serde(default, with = "money_number")]
    pub amount: Money,
    #[serde(default)]
    pub due_date: Value,
}

impl FeeHeadRecord {
    pub fn into_domain(self, tz: Tz) -> FeeHead {
        FeeHead {
            class: ClassId::new(&self.class),
            fee_head: self.fee_head,
            amount: self.amount,
            due_date: parse_local_date(&self.due_date, tz),
        }
    }
}

/// row of `transactions`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub adm_no: String,
    #[serde(alias = "feehead", deserialize_with = "lenient_string")]
    pub fee_head: String,
    #[serde(default, with = "money_number")]
    pub amount: Money,
    #[serde(default, with = "money_number")]
    pub fine: Money,
    #[serde(default)]
    pub date: Value,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub receipt_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub void: Option<String>,
    #[serde(default, alias = "cls", deserialize_with = "lenient_opt_string")]
    pub class: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub name: Option<String>,
}

impl TransactionRecord {
    pub fn into_domain(self, tz: Tz) -> Transaction {
        Transaction {
            adm_no: self.adm_no,
            fee_head: self.fee_head,
            amount: self.amount,
            fine: self.fine,
            date: parse_local_date(&self.date, tz),
            mode: self.mode.unwrap_or_default(),
            receipt_no: self.receipt_no.unwrap_or_default(),
            voided: self.void.as_deref().map(is_void_marker).unwrap_or(false),
            class: self.class.as_deref().map(ClassId::new),
            name: self.name,
        }
    }
}

/// row of `getGradeBoundaries`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBoundaryRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub standard_group: String,
    #[serde(default)]
    pub min_percentage: Value,
    #[serde(default)]
    pub max_percentage: Value,
    #[serde(deserialize_with = "lenient_string")]
    pub grade: String,
}

impl GradeBoundaryRecord {
    /// `None` when either bound is not a number
    pub fn into_domain(self) -> Option<GradeBoundary> {
        let min = decimal_from_value(&self.min_percentage)?;
        let max = decimal_from_value(&self.max_percentage)?;
        Some(GradeBoundary::new(&self.standard_group, min, max, &self.grade))
    }
}
