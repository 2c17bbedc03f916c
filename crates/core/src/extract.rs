//! Best-effort extraction of structured findings from free-text wound assessments.
//!
//! Model output and clinician text are loosely formatted, so every function here is lenient:
//! matching is case-insensitive, works line by line, and returns `None` or a documented
//! default rather than failing.

use crate::constants::{DEFAULT_INFECTION_RISK, DEFAULT_RECOMMENDATION, DEFAULT_RISK_FACTOR};
use woundsnap_types::InfectionRisk;

/// Text following `label` on the same line, after any `:` and whitespace.
///
/// The value must start with an alphanumeric character. For example `field("Type: Pressure
/// ulcer", "type")` yields `"Pressure ulcer"`.
pub fn field(text: &str, label: &str) -> Option<String> {
    for line in text.lines() {
        let mut rest = line;
        while let Some(after) = find_after(rest, label) {
            let trimmed = after.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            let separated = trimmed.len() < after.len();
            if separated && trimmed.starts_with(|c: char| c.is_alphanumeric()) {
                return Some(trimmed.trim_end().to_owned());
            }
            rest = after;
        }
    }
    None
}

/// A `<number> cm` measurement following `label`, e.g. `Length: 4.2 cm`.
pub fn measurement_after(text: &str, label: &str) -> Option<String> {
    for line in text.lines() {
        let mut rest = line;
        while let Some(after) = find_after(rest, label) {
            let trimmed = after.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            if trimmed.len() < after.len() {
                if let Some(value) = leading_centimetres(trimmed) {
                    return Some(value);
                }
            }
            rest = after;
        }
    }
    None
}

/// A `<number> cm` measurement preceding `in <label>`, e.g. `4.2 cm in length`.
pub fn measurement_before(text: &str, label: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let needle = format!("cm in {}", label.to_lowercase());
    let at = lower.find(&needle)?;
    let head = lower[..at].trim_end();
    let start = head
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map_or(0, |i| i + 1);
    let number = &head[start..];
    if number.is_empty() || number.parse::<f64>().is_err() {
        return None;
    }
    Some(format!("{number} cm"))
}

/// A measurement labelled either way round.
pub fn measurement(text: &str, label: &str) -> Option<String> {
    measurement_after(text, label).or_else(|| measurement_before(text, label))
}

/// The numeric part of a `<number> cm` string.
pub fn centimetres(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("cm").trim().parse().ok()
}

/// Lines that read as recommendations.
///
/// Falls back to a single standard-care line when none are found.
pub fn recommendations(text: &str) -> Vec<String> {
    let found: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            ["recommend", "treatment", "should"]
                .iter()
                .any(|word| lower.contains(word))
        })
        .map(|line| line.trim_start_matches(['-', '*', ' ']).to_owned())
        .filter(|line| !line.is_empty())
        .collect();

    if found.is_empty() {
        vec![DEFAULT_RECOMMENDATION.to_owned()]
    } else {
        found
    }
}

/// The first `<n>%` on a line that later mentions risk.
///
/// Returns the default risk when no such percentage exists or it is out of range.
pub fn infection_risk(text: &str) -> InfectionRisk {
    text.lines()
        .find_map(risk_on_line)
        .unwrap_or_else(default_infection_risk)
}

fn risk_on_line(line: &str) -> Option<InfectionRisk> {
    let lower = line.to_lowercase();
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if bytes.get(i) == Some(&b'%') && lower[i..].contains("risk") {
                return lower[start..i]
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| InfectionRisk::new(n).ok());
            }
        } else {
            i += 1;
        }
    }
    None
}

fn default_infection_risk() -> InfectionRisk {
    InfectionRisk::new(i64::from(DEFAULT_INFECTION_RISK)).unwrap_or_default()
}

/// Risk factors named in the text.
pub fn risk_factors(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let factors: Vec<String> = [
        ("infection", "Signs of infection"),
        ("necrosis", "Tissue necrosis"),
        ("drainage", "Wound drainage"),
    ]
    .iter()
    .filter(|(needle, _)| lower.contains(needle))
    .map(|(_, factor)| (*factor).to_owned())
    .collect();

    if factors.is_empty() {
        vec![DEFAULT_RISK_FACTOR.to_owned()]
    } else {
        factors
    }
}

/// The pressure-ulcer stage named in the text (`stage 1` to `stage 4`).
pub fn stage(text: &str) -> Option<u8> {
    let lower = text.to_lowercase();
    let mut rest = lower.as_str();
    while let Some(at) = rest.find("stage") {
        let after = rest[at + "stage".len()..].trim_start();
        if let Some(digit) = after.chars().next().and_then(|c| c.to_digit(10)) {
            if (1..=4).contains(&digit) {
                return Some(digit as u8);
            }
        }
        rest = &rest[at + "stage".len()..];
    }
    None
}

fn find_after<'a>(haystack: &'a str, label: &str) -> Option<&'a str> {
    let lower = haystack.to_lowercase();
    let needle = label.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only trust ASCII offsets.
    if lower.len() != haystack.len() {
        return None;
    }
    lower
        .find(&needle)
        .map(|at| &haystack[at + needle.len()..])
}

fn leading_centimetres(text: &str) -> Option<String> {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let number = &text[..end];
    if number.is_empty() || number.parse::<f64>().is_err() {
        return None;
    }
    let unit = text[end..].trim_start();
    if unit.to_lowercase().starts_with("cm") {
        Some(format!("{number} cm"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_TEXT: &str = "Wound type: Pressure ulcer\n\
        Severity: Stage 3 with slough\n\
        Length: 4.2 cm\n\
        Width: 3.5cm\n\
        Estimated 72% infection risk given drainage.\n\
        Recommend daily dressing changes.\n\
        Treatment should include offloading.";

    #[test]
    fn extracts_labelled_fields() {
        assert_eq!(
            field(MODEL_TEXT, "wound type").as_deref(),
            Some("Pressure ulcer")
        );
        assert_eq!(
            field(MODEL_TEXT, "severity").as_deref(),
            Some("Stage 3 with slough")
        );
        assert_eq!(field(MODEL_TEXT, "healing stage"), None);
    }

    #[test]
    fn extracts_measurements_in_both_orders() {
        assert_eq!(measurement(MODEL_TEXT, "length").as_deref(), Some("4.2 cm"));
        assert_eq!(measurement(MODEL_TEXT, "width").as_deref(), Some("3.5 cm"));
        assert_eq!(measurement(MODEL_TEXT, "depth"), None);

        let prose = "The wound measures approximately 2.3 cm in length and 1.8 cm in width.";
        assert_eq!(measurement(prose, "length").as_deref(), Some("2.3 cm"));
        assert_eq!(measurement(prose, "width").as_deref(), Some("1.8 cm"));
        assert_eq!(centimetres("2.3 cm"), Some(2.3));
    }

    #[test]
    fn risk_percentage_must_precede_risk_on_the_same_line() {
        assert_eq!(infection_risk(MODEL_TEXT).percent(), 72);
        assert_eq!(
            infection_risk("Risk is high\n40% of the wound bed").percent(),
            DEFAULT_INFECTION_RISK
        );
        assert_eq!(
            infection_risk("150% infection risk").percent(),
            DEFAULT_INFECTION_RISK
        );
    }

    #[test]
    fn recommendations_and_factors_have_defaults() {
        assert_eq!(
            recommendations(MODEL_TEXT),
            vec![
                "Recommend daily dressing changes.".to_owned(),
                "Treatment should include offloading.".to_owned()
            ]
        );
        assert_eq!(recommendations("nothing useful"), vec![DEFAULT_RECOMMENDATION]);
        assert_eq!(
            risk_factors(MODEL_TEXT),
            vec!["Signs of infection", "Wound drainage"]
        );
        assert_eq!(risk_factors("clean"), vec![DEFAULT_RISK_FACTOR]);
    }

    #[test]
    fn finds_stage_numbers() {
        assert_eq!(stage(MODEL_TEXT), Some(3));
        assert_eq!(stage("Healing stage: granulation. Stage 2 ulcer"), Some(2));
        assert_eq!(stage("no staging"), None);
        assert_eq!(stage("stage 7"), None);
    }
}
