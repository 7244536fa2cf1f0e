//! Submission validation
//!
//! Checks run per zone in declared order and never short-circuit, so one
//! submission reports every problem at once.

use crate::domain::zone::{RawZoneCounts, ZoneCounts, ZoneName};

/// Validate a raw tally; an empty list means the tally is acceptable
pub fn validate_headcount(counts: &RawZoneCounts) -> Vec<String> {
    let mut errors = Vec::new();
    for zone in ZoneName::ALL {
        let value = counts.get(zone);
        if value < 0.0 {
            errors.push(format!("{} count cannot be negative", zone));
        }
        if !value.is_finite() || value.fract() != 0.0 {
            errors.push(format!("{} count must be a whole number", zone));
        } else if value > f64::from(u32::MAX) {
            errors.push(format!("{} count is too large", zone));
        }
    }
    errors
}

/// Sum of all zones
#[inline]
pub fn calculate_total(counts: &ZoneCounts) -> u64 {
    counts.iter().map(|(_, count)| u64::from(count)).sum()
}

impl TryFrom<RawZoneCounts> for ZoneCounts {
    type Error = Vec<String>;

    fn try_from(raw: RawZoneCounts) -> Result<Self, Self::Error> {
        let errors = validate_headcount(&raw);
        if !errors.is_empty() {
            return Err(errors);
        }
        // Every value is a whole number in 0..=u32::MAX at this point
        Ok(ZoneCounts::from_fn(|zone| raw.get(zone) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(left: f64, middle: f64, right: f64, production: f64, outside: f64) -> RawZoneCounts {
        RawZoneCounts { left, middle, right, production, outside }
    }

    #[test]
    fn test_valid_counts_have_no_errors() {
        assert!(validate_headcount(&raw(50.0, 80.0, 40.0, 5.0, 2.0)).is_empty());
        assert!(validate_headcount(&raw(0.0, 0.0, 0.0, 0.0, 0.0)).is_empty());
        assert!(validate_headcount(&raw(f64::from(u32::MAX), 0.0, 0.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_negative_and_fractional() {
        let errors = validate_headcount(&raw(-1.0, 3.5, 0.0, 0.0, 0.0));
        assert_eq!(
            errors,
            vec!["left count cannot be negative".to_string(), "middle count must be a whole number".to_string()]
        );
    }

    #[test]
    fn test_one_error_per_offending_zone() {
        let errors = validate_headcount(&raw(-2.0, 1.25, -7.0, 0.5, 9.0));
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[2], "right count cannot be negative");
        assert_eq!(errors[3], "production count must be a whole number");
    }

    #[test]
    fn test_negative_fraction_reports_both_checks() {
        let errors = validate_headcount(&raw(0.0, 0.0, 0.0, 0.0, -1.5));
        assert_eq!(
            errors,
            vec!["outside count cannot be negative".to_string(), "outside count must be a whole number".to_string()]
        );
    }

    #[test]
    fn test_non_finite_values() {
        let errors = validate_headcount(&raw(f64::NAN, f64::INFINITY, 0.0, 0.0, 0.0));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.ends_with("must be a whole number")));
    }

    #[test]
    fn test_too_large() {
        let errors = validate_headcount(&raw(0.0, 0.0, 5_000_000_000.0, 0.0, 0.0));
        assert_eq!(errors, vec!["right count is too large".to_string()]);
    }

    #[test]
    fn test_try_from_raw() {
        let counts = ZoneCounts::try_from(raw(50.0, 80.0, 40.0, 5.0, 2.0)).unwrap();
        assert_eq!(counts, ZoneCounts::new(50, 80, 40, 5, 2));
        assert_eq!(calculate_total(&counts), 177);

        let errors = ZoneCounts::try_from(raw(-1.0, 0.0, 0.0, 0.0, 0.0)).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
