//! Candidate universe parsing and momentum ranking.
//!
//! A ticker's score is the median bar-to-bar percent change of its closes.
//! The highest score wins; ties go to the alphabetically first ticker.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Fewest bars needed to produce one percent change.
pub const MIN_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Decimal,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub ticker: String,
    pub score: Decimal,
    pub bars: usize,
}

/// Median of the percent changes between consecutive closes. Bars are
/// expected in date order. Returns `None` below [`MIN_BARS`] or when a
/// zero close makes the change undefined.
pub fn median_percent_change(bars: &[PriceBar]) -> Option<Decimal> {
    if bars.len() < MIN_BARS {
        return None;
    }
    let mut changes = bars
        .windows(2)
        .map(|w| {
            if w[0].close.is_zero() {
                None
            } else {
                Some((w[1].close - w[0].close) / w[0].close * Decimal::ONE_HUNDRED)
            }
        })
        .collect::<Option<Vec<_>>>()?;
    changes.sort();

    let mid = changes.len() / 2;
    if changes.len() % 2 == 1 {
        Some(changes[mid])
    } else {
        Some((changes[mid - 1] + changes[mid]) / Decimal::TWO)
    }
}

/// Score every ticker and sort best first. Tickers without a score are dropped.
pub fn rank(series: Vec<(String, Vec<PriceBar>)>) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = series
        .into_iter()
        .filter_map(|(ticker, bars)| {
            median_percent_change(&bars).map(|score| Ranked {
                ticker,
                score,
                bars: bars.len(),
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ticker.cmp(&b.ticker)));
    ranked
}
