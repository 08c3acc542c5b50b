//! Deterministic fleet rules. The offline model answers with these, and the
//! agents fall back to them when a remote model's answer cannot be parsed.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use carfleet_core::domain::proposal::DispositionAction;

/// Feedback phrases that mean the car may have to leave the fleet.
pub const SEVERE_DAMAGE_KEYWORDS: &[&str] = &[
    "wrecked",
    "totaled",
    "destroyed",
    "crashed",
    "collision",
    "frame damage",
    "structural damage",
    "major damage",
    "unsafe",
    "not drivable",
    "inoperable",
    "dangerous",
    "engine blown",
    "transmission failed",
    "major mechanical failure",
];

const CLEANING_KEYWORDS: &[&str] = &[
    "dirty", "stain", "smell", "odor", "mud", "sand", "trash", "spill", "crumbs", "pet hair",
    "smoke", "sticky", "dust", "filthy", "messy", "vomit",
];

const MAINTENANCE_KEYWORDS: &[&str] = &[
    "brake",
    "oil",
    "tire",
    "engine",
    "transmission",
    "noise",
    "rattle",
    "leak",
    "warning light",
    "check engine",
    "battery",
    "squeal",
    "vibration",
    "alignment",
    "overheat",
    "stall",
    "dent",
    "scratch",
    "bumper",
    "windshield",
    "crack",
];

fn matches<'a>(feedback: &str, keywords: &[&'a str]) -> Vec<&'a str> {
    let lowered = feedback.to_ascii_lowercase();
    keywords.iter().copied().filter(|keyword| lowered.contains(keyword)).collect()
}

pub fn severe_damage(feedback: &str) -> Vec<&'static str> {
    matches(feedback, SEVERE_DAMAGE_KEYWORDS)
}

pub fn cleaning_request(feedback: &str) -> String {
    let found = matches(feedback, CLEANING_KEYWORDS);
    if found.is_empty() {
        "CLEANING_NOT_REQUIRED".to_string()
    } else {
        format!("Cleaning needed ({}): {}", found.join(", "), first_sentence(feedback))
    }
}

pub fn maintenance_request(feedback: &str) -> String {
    let found = matches(feedback, MAINTENANCE_KEYWORDS);
    if found.is_empty() {
        "MAINTENANCE_NOT_REQUIRED".to_string()
    } else {
        format!("Maintenance needed ({}): {}", found.join(", "), first_sentence(feedback))
    }
}

pub fn disposition_request(feedback: &str) -> String {
    let found = severe_damage(feedback);
    if found.is_empty() {
        "DISPOSITION_NOT_REQUIRED".to_string()
    } else {
        format!("DISPOSITION_REQUIRED: severe damage reported ({})", found.join(", "))
    }
}

fn brand_base_value(make: &str, model: &str) -> Decimal {
    let make = make.to_ascii_lowercase();
    let model = model.to_ascii_lowercase();
    match make.as_str() {
        "mercedes-benz" | "mercedes" | "bmw" | "audi" | "lexus" => Decimal::from(60_000),
        "ford" if model.contains("f-150") => Decimal::from(52_500),
        "toyota" | "honda" | "chevrolet" => Decimal::from(35_000),
        "nissan" => Decimal::from(28_500),
        _ => Decimal::from(30_000),
    }
}

/// Yearly depreciation: 12% in year one, then 15%, 12%, 10%, and 8% for
/// every year after that.
fn depreciation_rate(year_of_life: i32) -> Decimal {
    match year_of_life {
        1 => Decimal::new(12, 2),
        2 => Decimal::new(15, 2),
        3 => Decimal::new(12, 2),
        4 => Decimal::new(10, 2),
        _ => Decimal::new(8, 2),
    }
}

fn condition_adjustment(condition: &str, feedback: &str) -> Decimal {
    if !severe_damage(feedback).is_empty() {
        return Decimal::new(-20, 2);
    }
    let condition = condition.to_ascii_lowercase();
    if condition.contains("excellent") || condition.contains("like new") {
        Decimal::new(5, 2)
    } else if condition.contains("poor") || condition.contains("damaged") {
        Decimal::new(-20, 2)
    } else if condition.contains("fair") {
        Decimal::new(-10, 2)
    } else {
        Decimal::ZERO
    }
}

/// Market value estimate rounded to the nearest hundred dollars.
pub fn estimate_value(
    make: &str,
    model: &str,
    year: i32,
    current_year: i32,
    condition: &str,
    feedback: &str,
) -> Decimal {
    let mut value = brand_base_value(make, model);
    for year_of_life in 1..=(current_year - year).max(0) {
        value -= value * depreciation_rate(year_of_life);
    }
    value += value * condition_adjustment(condition, feedback);
    (value / Decimal::from(100)).round() * Decimal::from(100)
}

/// Recommendation for a car valuable enough to need a reviewer.
pub fn recommend_action(
    age_years: i32,
    value: Decimal,
    feedback: &str,
) -> (DispositionAction, String) {
    let severe = severe_damage(feedback);
    if !severe.is_empty() && age_years > 5 {
        (
            DispositionAction::Scrap,
            format!("{age_years} years old with {}; repair is not economical", severe.join(", ")),
        )
    } else if value < Decimal::from(5_000) {
        (DispositionAction::Donate, "Low market value but still functional".to_string())
    } else if !severe.is_empty() && age_years >= 3 {
        (
            DispositionAction::Sell,
            format!("{age_years} years old with {}; sell before further loss", severe.join(", ")),
        )
    } else {
        (
            DispositionAction::Keep,
            format!(
                "Valued at ${} and {age_years} years old; damage looks repairable",
                format_money(value)
            ),
        )
    }
}

/// Direct choice for a car below the review threshold.
pub fn low_value_action(value: Decimal, feedback: &str) -> (DispositionAction, String) {
    let severe = !severe_damage(feedback).is_empty();
    if severe && value < Decimal::from(5_000) {
        (DispositionAction::Scrap, "Low value and severely damaged".to_string())
    } else if value < Decimal::from(5_000) {
        (DispositionAction::Donate, "Low value, still usable by a charity".to_string())
    } else {
        (DispositionAction::Sell, "Moderate value; recover it through a sale".to_string())
    }
}

/// Short condition description stored on the car record.
pub fn condition_summary(previous: &str, feedback: &str) -> String {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return previous.to_string();
    }
    let rating = if !severe_damage(feedback).is_empty() {
        "Poor"
    } else if !matches(feedback, MAINTENANCE_KEYWORDS).is_empty() {
        "Fair"
    } else if !matches(feedback, CLEANING_KEYWORDS).is_empty() {
        "Good, needs cleaning"
    } else {
        "Good"
    };
    truncate(&format!("{rating} - {}", first_sentence(feedback)), 200)
}

pub fn format_money(value: Decimal) -> String {
    let whole = value.round().to_i64().unwrap_or_default();
    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    match text.find(['.', '!', '?', '\n']) {
        Some(end) => text[..end].trim(),
        None => text,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
