use std::time::Duration;

use rust_decimal::Decimal;

use crate::config::ApprovalConfig;

/// When a disposal needs a reviewer, and how long the reviewer gets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub high_value_threshold: Decimal,
    pub timeout: Duration,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self { high_value_threshold: Decimal::from(15_000), timeout: Duration::from_secs(300) }
    }
}

impl From<&ApprovalConfig> for ApprovalPolicy {
    fn from(config: &ApprovalConfig) -> Self {
        Self { high_value_threshold: config.high_value_threshold, timeout: config.timeout() }
    }
}

impl ApprovalPolicy {
    pub fn requires_human_approval(&self, value: Decimal) -> bool {
        value > self.high_value_threshold
    }
}

/// Pulls the first money amount out of agent text such as
/// `Estimated value: $24,500 (after depreciation)`. Amounts prefixed with `$`
/// win over bare numbers.
pub fn parse_currency(text: &str) -> Option<Decimal> {
    let dollar = text.match_indices('$').find_map(|(idx, _)| leading_amount(&text[idx + 1..]));
    dollar.or_else(|| {
        text.char_indices()
            .filter(|(idx, ch)| {
                ch.is_ascii_digit()
                    && !text[..*idx].chars().next_back().is_some_and(|prev| prev.is_ascii_digit())
            })
            .find_map(|(idx, _)| leading_amount(&text[idx..]))
    })
}

fn leading_amount(text: &str) -> Option<Decimal> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == ',' || *ch == '.')
        .filter(|ch| *ch != ',')
        .collect();
    let digits = digits.trim_end_matches('.');
    if digits.is_empty() {
        return None;
    }
    digits.parse::<Decimal>().ok()
}
