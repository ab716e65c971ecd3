use crate::error::QueueError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use core_types::{Algorithm, TaskFilter, TaskStatus};

/// Which end of a date range an input bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parses a date bound given as RFC 3339 or as a plain `YYYY-MM-DD` day.
///
/// A plain day covers the whole day: as a start bound it means midnight, as
/// an end bound it means the last instant of that day.
pub fn parse_date_bound(input: &str, bound: Bound) -> Result<DateTime<Utc>, QueueError> {
    let input = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        QueueError::InvalidArgument(format!(
            "'{input}' is not a date (expected YYYY-MM-DD or RFC 3339)"
        ))
    })?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN),
    };
    Ok(day.and_time(time).and_utc())
}

/// Builds a `TaskFilter` from raw query parameters.
pub fn build_filter(
    algorithm: Option<&str>,
    status: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<TaskFilter, QueueError> {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }
    let invalid = |e: core_types::CoreError| QueueError::InvalidArgument(e.to_string());

    let filter = TaskFilter {
        algorithm: present(algorithm)
            .map(str::parse::<Algorithm>)
            .transpose()
            .map_err(invalid)?,
        status: present(status)
            .map(str::parse::<TaskStatus>)
            .transpose()
            .map_err(invalid)?,
        created_from: present(start_date)
            .map(|d| parse_date_bound(d, Bound::Start))
            .transpose()?,
        created_to: present(end_date)
            .map(|d| parse_date_bound(d, Bound::End))
            .transpose()?,
    };

    if let (Some(from), Some(to)) = (filter.created_from, filter.created_to) {
        if from > to {
            return Err(QueueError::InvalidArgument(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn plain_days_cover_the_whole_day() {
        let start = parse_date_bound("2024-03-01", Bound::Start).unwrap();
        let end = parse_date_bound("2024-03-01", Bound::End).unwrap();
        assert_eq!(start.hour(), 0);
        assert_eq!(end.hour(), 23);
        assert_eq!(end.day(), 1);
        assert!(end > start);
    }

    #[test]
    fn rfc3339_is_accepted() {
        let instant = parse_date_bound("2024-03-01T12:30:00+02:00", Bound::Start).unwrap();
        assert_eq!(instant.hour(), 10);
    }

    #[test]
    fn filter_parses_every_field() {
        let filter = build_filter(Some("volatility"), Some("success"), Some("2024-01-01"), None)
            .unwrap();
        assert_eq!(filter.algorithm, Some(Algorithm::Volatility));
        assert_eq!(filter.status, Some(TaskStatus::Success));
        assert!(filter.created_from.is_some());
        assert!(filter.created_to.is_none());
    }

    #[test]
    fn blank_parameters_are_ignored() {
        let filter = build_filter(Some(""), Some("  "), None, Some("")).unwrap();
        assert_eq!(filter, TaskFilter::default());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let filter = build_filter(Some(" volatility "), Some("\tpending\n"), None, None).unwrap();
        assert_eq!(filter.algorithm, Some(Algorithm::Volatility));
        assert_eq!(filter.status, Some(TaskStatus::Pending));
    }

    #[test]
    fn bad_values_are_invalid_arguments() {
        assert!(matches!(
            build_filter(Some("astrology"), None, None, None),
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_filter(None, Some("DONE"), None, None),
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_filter(None, None, Some("yesterday"), None),
            Err(QueueError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_filter(None, None, Some("2024-02-01"), Some("2024-01-01")),
            Err(QueueError::InvalidArgument(_))
        ));
    }
}
