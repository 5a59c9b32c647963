// Quantity / price quantisation against exchange step and tick sizes
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::ExchangeError;

/// Step used when the instrument carries no matching filter
pub const DEFAULT_STEP: &str = "1e-8";
const DEFAULT_PRECISION: u32 = 8;

/// One exchange filter: increment, decimals to emit, and the lower bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRule {
    pub step: Decimal,
    /// Decimal places derived from the step's textual form
    pub precision: u32,
    pub minimum: Decimal,
}

impl Default for StepRule {
    fn default() -> Self {
        Self {
            step: Decimal::new(1, DEFAULT_PRECISION),
            precision: DEFAULT_PRECISION,
            minimum: Decimal::ZERO,
        }
    }
}

impl StepRule {
    /// Build a rule from the exchange's strings. `None` if the step is unusable.
    pub fn parse(step_text: &str, minimum_text: &str) -> Option<Self> {
        let step = parse_decimal(step_text)?;
        if step <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            step,
            precision: precision_of(step_text),
            minimum: parse_decimal(minimum_text).unwrap_or(Decimal::ZERO),
        })
    }
}

/// Parse plain (`0.001`) or exponential (`1e-8`) decimal text.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(|c: char| c == 'e' || c == 'E') {
        Decimal::from_scientific(&text.to_ascii_lowercase()).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}

/// Number of decimals a step size implies.
///
/// `1e-8` -> 8, `0.0100` -> 2, `1` -> 0.
pub fn precision_of(step_text: &str) -> u32 {
    let text = step_text.trim().to_ascii_lowercase();

    if let Some((_, exponent)) = text.split_once('e') {
        if let Some(digits) = exponent.trim().strip_prefix('-') {
            if let Ok(precision) = digits.parse::<u32>() {
                return precision;
            }
        }
    }

    let parts: Vec<&str> = text.split('.').collect();
    match parts.as_slice() {
        [_] => 0,
        [_, decimals] => decimals.trim_end_matches('0').len() as u32,
        _ => DEFAULT_PRECISION,
    }
}

/// Greatest multiple of `step` not above `value`, never negative.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value.max(Decimal::ZERO);
    }
    match value.checked_div(step) {
        Some(units) => (units.floor() * step).max(Decimal::ZERO),
        None => value.max(Decimal::ZERO),
    }
}

/// Smallest multiple of `step` not below `value`.
pub fn ceil_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    match value.checked_div(step) {
        Some(units) => units.ceil() * step,
        None => value,
    }
}

/// Render with exactly `precision` decimals.
pub fn format_with_precision(value: Decimal, precision: u32) -> String {
    let value = value.round_dp_with_strategy(precision, RoundingStrategy::ToZero);
    format!("{:.*}", precision as usize, value)
}

/// Quantise a base-asset quantity against the LOT_SIZE rule.
pub fn adjust_quantity(desired: Decimal, rule: &StepRule) -> Result<String, ExchangeError> {
    adjust(desired, rule, "quantity")
}

/// Quantise a trigger/limit price against the PRICE_FILTER rule.
pub fn adjust_price(desired: Decimal, rule: &StepRule) -> Result<String, ExchangeError> {
    adjust(desired, rule, "price")
}

fn adjust(desired: Decimal, rule: &StepRule, what: &str) -> Result<String, ExchangeError> {
    let has_minimum = rule.minimum > Decimal::ZERO;
    if has_minimum && desired < rule.minimum {
        return Err(ExchangeError::validation(format!(
            "{} {} is below the exchange minimum {}",
            what, desired, rule.minimum
        )));
    }

    let mut adjusted = floor_to_step(desired, rule.step);
    if has_minimum && adjusted < rule.minimum {
        adjusted = ceil_to_step(rule.minimum, rule.step);
    }

    Ok(format_with_precision(adjusted, rule.precision))
}
