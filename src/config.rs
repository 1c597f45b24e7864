use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::dates::SCHOOL_TZ;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::fines::FineConfig;

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// timezone used to turn stored timestamps into calendar days
    pub timezone: Tz,
    pub fine_config: FineConfig,
    pub payment_config: PaymentConfig,
    pub grading: GradingConfig,
}

/// rules applied when building a payment batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// accept items larger than the head's outstanding balance
    pub allow_overpayment: bool,
    /// lump sums settle the fine of a head before its amount
    pub fines_first: bool,
}

/// one row of the fallback grade table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultGrade {
    pub min_percentage: Decimal,
    pub grade: String,
}

impl DefaultGrade {
    pub fn new(min_percentage: Decimal, grade: &str) -> Self {
        Self {
            min_percentage,
            grade: grade.to_string(),
        }
    }
}

/// grade classifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingConfig {
    /// used while boundaries are not loaded, highest threshold first
    pub default_table: Vec<DefaultGrade>,
    /// grade given when neither the table nor a threshold matches
    pub floor_grade: String,
    /// grade given to an unparsable score
    pub invalid_score_grade: String,
    /// label returned for absent students
    pub absent_label: String,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            default_table: vec![
                DefaultGrade::new(dec!(80), "A"),
                DefaultGrade::new(dec!(60), "B"),
                DefaultGrade::new(dec!(40), "C"),
                DefaultGrade::new(dec!(30), "D"),
            ],
            floor_grade: "E".to_string(),
            invalid_score_grade: "E".to_string(),
            absent_label: "Absent".to_string(),
        }
    }
}

impl LedgerConfig {
    /// IST calendar, ₹25 per half month, no overpayment at the counter
    pub fn indian_school() -> Self {
        Self {
            timezone: SCHOOL_TZ,
            fine_config: FineConfig::default(),
            payment_config: PaymentConfig {
                allow_overpayment: false,
                fines_first: true,
            },
            grading: GradingConfig::default(),
        }
    }

    /// load from json, missing sections are not filled in
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let step = self.fine_config.step_amount;
        if step.is_negative() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("fine step must not be negative: {}", step),
            });
        }

        if let Some(max) = self.fine_config.maximum_fine {
            if max < Money::ZERO {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("maximum fine must not be negative: {}", max),
                });
            }
        }

        let table = &self.grading.default_table;
        if table.is_empty() {
            return Err(LedgerError::InvalidConfiguration {
                message: "default grade table is empty".to_string(),
            });
        }
        if table.windows(2).any(|w| w[0].min_percentage <= w[1].min_percentage) {
            return Err(LedgerError::InvalidConfiguration {
                message: "default grade table must be ordered by descending threshold".to_string(),
            });
        }
        if self.grading.floor_grade.trim().is_empty()
            || self.grading.invalid_score_grade.trim().is_empty()
        {
            return Err(LedgerError::InvalidConfiguration {
                message: "fallback grades must not be blank".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig::indian_school()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_school_defaults() {
        let config = LedgerConfig::indian_school();
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.fine_config.step_amount, Money::from_major(25));
        assert_eq!(config.fine_config.maximum_fine, None);
        assert!(!config.payment_config.allow_overpayment);
        assert_eq!(config.grading.default_table.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_keeps_timezone_name() {
        let json = LedgerConfig::indian_school().to_json_pretty().unwrap();
        assert!(json.contains("Asia/Kolkata"));

        let parsed = LedgerConfig::from_json(&json).unwrap();
        assert_eq!(parsed, LedgerConfig::indian_school());
    }

    #[test]
    fn test_rejects_unsorted_grade_table() {
        let mut config = LedgerConfig::indian_school();
        config.grading.default_table.swap(0, 1);
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_rejects_bad_json() {
        let err = LedgerConfig::from_json("{\"timezone\": \"Mars/Olympus\"}").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
