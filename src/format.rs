//! Display strings for counts, publish dates and ISO-8601 durations.

use chrono::{DateTime, Utc};

/// Shorten a count to one decimal with a K/M/B suffix, halves rounding up.
/// Absent or zero gives "0".
pub fn format_count(n: Option<u64>) -> String {
  let n = match n {
    None | Some(0) => return "0".to_string(),
    Some(n) => n,
  };
  let (scale, suffix) = match n {
    1_000_000_000.. => (1_000_000_000, 'B'),
    1_000_000.. => (1_000_000, 'M'),
    1_000.. => (1_000, 'K'),
    _ => return n.to_string(),
  };
  let tenths = (u128::from(n) * 10 + scale / 2) / scale;
  format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}

/// Bucket a publish timestamp relative to `now` by calendar days (UTC).
pub fn format_relative_date(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
  let Some(published) = published else {
    return "unknown date".to_string();
  };
  let days = (now.date_naive() - published.date_naive()).num_days().unsigned_abs();
  age_label(days)
}

/// Label for an age in whole days.
pub fn age_label(days: u64) -> String {
  match days {
    0 => return "Today".to_string(),
    1 => return "Yesterday".to_string(),
    d if d < 30 => return format!("{d} days ago"),
    _ => {}
  }

  let months = days / 30;
  if months == 1 {
    return "1 month ago".to_string();
  }
  if months < 12 {
    return format!("{months} months ago");
  }

  let years = months / 12;
  if years == 1 { "1 year ago".to_string() } else { format!("{years} years ago") }
}

/// Components pulled out of a `PT#H#M#S` duration. Each is the raw digit run.
#[derive(Debug, Default, PartialEq, Eq)]
struct DurationParts<'a> {
  hours: Option<&'a str>,
  minutes: Option<&'a str>,
  seconds: Option<&'a str>,
}

/// Find the first `PT` marker and read the optional H, M, S groups in order.
fn parse_duration(code: &str) -> Option<DurationParts<'_>> {
  let start = code.find("PT")?;
  let mut rest = &code[start + 2..];
  let mut parts = DurationParts::default();

  for (unit, slot) in [('H', 0usize), ('M', 1), ('S', 2)] {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || rest[digits..].chars().next() != Some(unit) {
      continue;
    }
    let value = &rest[..digits];
    match slot {
      0 => parts.hours = Some(value),
      1 => parts.minutes = Some(value),
      _ => parts.seconds = Some(value),
    }
    rest = &rest[digits + 1..];
  }
  Some(parts)
}

fn pad2(s: &str) -> String {
  format!("{s:0>2}")
}

/// Render an ISO-8601 duration as `HH:MM:SS`, or `MM:SS` when there is no hour
/// component. Absent or malformed input gives "0:00".
pub fn format_duration(code: Option<&str>) -> String {
  let Some(parts) = code.filter(|c| !c.is_empty()).and_then(parse_duration) else {
    return "0:00".to_string();
  };
  let minutes = pad2(parts.minutes.unwrap_or("0"));
  let seconds = pad2(parts.seconds.unwrap_or("00"));
  match parts.hours {
    Some(hours) => format!("{}:{}:{}", pad2(hours), minutes, seconds),
    None => format!("{minutes}:{seconds}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  // --- format_count ---

  #[test]
  fn count_absent_or_zero() {
    assert_eq!(format_count(None), "0");
    assert_eq!(format_count(Some(0)), "0");
  }

  #[test]
  fn count_thresholds() {
    assert_eq!(format_count(Some(999)), "999");
    assert_eq!(format_count(Some(1_000)), "1.0K");
    assert_eq!(format_count(Some(999_999)), "1000.0K");
    assert_eq!(format_count(Some(1_000_000)), "1.0M");
    assert_eq!(format_count(Some(1_000_000_000)), "1.0B");
  }

  #[test]
  fn count_one_decimal() {
    assert_eq!(format_count(Some(1_540)), "1.5K");
    assert_eq!(format_count(Some(2_340_000)), "2.3M");
    assert_eq!(format_count(Some(12_000_000_000)), "12.0B");
  }

  #[test]
  fn count_halves_round_up() {
    assert_eq!(format_count(Some(1_250)), "1.3K");
    assert_eq!(format_count(Some(12_250)), "12.3K");
    assert_eq!(format_count(Some(2_250_000)), "2.3M");
    assert_eq!(format_count(Some(1_249)), "1.2K");
    assert_eq!(format_count(Some(u64::MAX)), "18446744073.7B");
  }

  // --- age buckets ---

  #[test]
  fn age_days() {
    assert_eq!(age_label(0), "Today");
    assert_eq!(age_label(1), "Yesterday");
    assert_eq!(age_label(2), "2 days ago");
    assert_eq!(age_label(29), "29 days ago");
  }

  #[test]
  fn age_months_and_years() {
    assert_eq!(age_label(30), "1 month ago");
    assert_eq!(age_label(59), "1 month ago");
    assert_eq!(age_label(60), "2 months ago");
    assert_eq!(age_label(359), "11 months ago");
    assert_eq!(age_label(360), "1 year ago");
    assert_eq!(age_label(719), "1 year ago");
    assert_eq!(age_label(720), "2 years ago");
  }

  #[test]
  fn relative_date_uses_calendar_days() {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 5, 0).unwrap();
    let late_yesterday = Utc.with_ymd_and_hms(2024, 3, 9, 23, 55, 0).unwrap();
    let this_morning = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
    assert_eq!(format_relative_date(Some(late_yesterday), now), "Yesterday");
    assert_eq!(format_relative_date(Some(this_morning), now), "Today");
    assert_eq!(format_relative_date(None, now), "unknown date");
  }

  // --- format_duration ---

  #[test]
  fn duration_examples() {
    assert_eq!(format_duration(Some("PT1H2M3S")), "01:02:03");
    assert_eq!(format_duration(Some("PT5M9S")), "05:09");
    assert_eq!(format_duration(Some("PT45S")), "00:45");
  }

  #[test]
  fn duration_missing_components() {
    assert_eq!(format_duration(Some("PT2H")), "02:00:00");
    assert_eq!(format_duration(Some("PT10M")), "10:00");
    assert_eq!(format_duration(Some("PT0S")), "00:00");
  }

  #[test]
  fn duration_malformed() {
    assert_eq!(format_duration(None), "0:00");
    assert_eq!(format_duration(Some("")), "0:00");
    assert_eq!(format_duration(Some("garbage")), "0:00");
    assert_eq!(format_duration(Some("P1D")), "0:00");
  }
}
