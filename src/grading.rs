use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::GradingConfig;

/// a grade band for one standard group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeBoundary {
    pub standard_group: String,
    pub min_percentage: Decimal,
    pub max_percentage: Decimal,
    pub grade: String,
}

impl GradeBoundary {
    pub fn new(standard_group: &str, min: Decimal, max: Decimal, grade: &str) -> Self {
        Self {
            standard_group: standard_group.to_string(),
            min_percentage: min,
            max_percentage: max,
            grade: grade.to_string(),
        }
    }

    pub fn contains(&self, pct: Decimal) -> bool {
        self.min_percentage <= pct && pct <= self.max_percentage
    }
}

/// a raw marks cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Absent,
    Percent(Decimal),
    Invalid,
}

impl Score {
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Null => Score::Absent,
            Value::Number(n) => n
                .as_i64()
                .map(Decimal::from)
                .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))
                .map(Score::Percent)
                .unwrap_or(Score::Invalid),
            Value::String(s) => Score::from_text(s),
            _ => Score::Invalid,
        }
    }

    /// text cell; a leading number is enough, as in "45 (re-test)"
    pub fn from_text(raw: &str) -> Self {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("absent") {
            return Score::Absent;
        }
        leading_number(s).map(Score::Percent).unwrap_or(Score::Invalid)
    }
}

fn leading_number(s: &str) -> Option<Decimal> {
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            '-' | '+' if i == 0 => {}
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    Decimal::from_str(s[..end].trim_end_matches('.')).ok()
}

/// "1-4", "5-8" or "9-12" for the first number in a class name
pub fn standard_group(student_class: &str) -> Option<&'static str> {
    let digits: String = student_class
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let standard: u32 = digits.parse().ok()?;
    match standard {
        1..=4 => Some("1-4"),
        5..=8 => Some("5-8"),
        9..=12 => Some("9-12"),
        _ => None,
    }
}

/// canonical form of a group label: "Std 5 – 8" becomes "5-8"
pub fn normalize_group(label: &str) -> String {
    let lower = label.to_lowercase();
    lower
        .replace("std", "")
        .replace(['–', '—'], "-")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect()
}

/// resolves a score to a grade label
#[derive(Debug, Clone, Default)]
pub struct GradeClassifier {
    pub config: GradingConfig,
}

impl GradeClassifier {
    pub fn new(config: GradingConfig) -> Self {
        Self { config }
    }

    pub fn classify(
        &self,
        score: Score,
        student_class: &str,
        boundaries: &[GradeBoundary],
    ) -> String {
        let pct = match score {
            Score::Absent => return self.config.absent_label.clone(),
            Score::Invalid => return self.config.invalid_score_grade.clone(),
            Score::Percent(p) => p,
        };

        let Some(group) = standard_group(student_class) else {
            return self.default_grade(pct);
        };

        let mut candidates: Vec<&GradeBoundary> = boundaries
            .iter()
            .filter(|b| normalize_group(&b.standard_group) == group)
            .collect();

        if candidates.is_empty() {
            return self.default_grade(pct);
        }

        candidates.sort_by(|a, b| b.min_percentage.cmp(&a.min_percentage));

        candidates
            .iter()
            .find(|b| b.contains(pct))
            .or_else(|| candidates.last())
            .map(|b| b.grade.clone())
            .unwrap_or_else(|| self.default_grade(pct))
    }

    /// fixed table used while boundaries are not available
    pub fn default_grade(&self, pct: Decimal) -> String {
        self.config
            .default_table
            .iter()
            .find(|row| pct >= row.min_percentage)
            .map(|row| row.grade.clone())
            .unwrap_or_else(|| self.config.floor_grade.clone())
    }

    /// tally of grades for a class result sheet
    pub fn grade_counts<'a, I>(
        &self,
        scores: I,
        student_class: &str,
        boundaries: &[GradeBoundary],
    ) -> BTreeMap<String, usize>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut counts = BTreeMap::new();
        for raw in scores {
            let grade = self.classify(Score::parse(raw), student_class, boundaries);
            *counts.entry(grade).or_insert(0) += 1;
        }
        counts
    }
}

/// grade for a raw marks cell using the default grading rules
pub fn classify_grade(score: &Value, student_class: &str, boundaries: &[GradeBoundary]) -> String {
    GradeClassifier::default().classify(Score::parse(score), student_class, boundaries)
}
