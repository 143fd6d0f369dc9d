use chrono::{Datelike, Duration, Local, Months, NaiveDate, Utc, Weekday};
use anyhow::{anyhow, Result};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Renders a deadline the way it is stored: `D/M/YYYY`, month 1-based, no padding.
pub fn format_deadline(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

pub fn parse_deadline(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    let parts: Vec<&str> = input.split('/').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Expected a D/M/YYYY date, got '{}'", input));
    }

    let day: u32 = parts[0].parse().map_err(|_| anyhow!("Invalid day in '{}'", input))?;
    let month: u32 = parts[1].parse().map_err(|_| anyhow!("Invalid month in '{}'", input))?;
    let year: i32 = parts[2].parse().map_err(|_| anyhow!("Invalid year in '{}'", input))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| anyhow!("No such date: {}", input))
}

/// Resolves a deadline typed on the command line relative to `today`.
///
/// Accepts `D/M/YYYY`, `YYYY-MM-DD`, the keywords `today`, `tomorrow`,
/// `eow` and `eom`, relative offsets (`+3d`, `+2w`, `+1m`) and weekdays
/// (`fri` for the next Friday, `2:fri` for the one after).
pub fn parse_human_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();

    // 1. Reserved keywords
    match input.to_lowercase().as_str() {
        "today" | "tod" => return Ok(today),
        "tomorrow" | "tom" => return Ok(today + Duration::days(1)),
        "eow" => {
            // Sunday closes the week
            let days_to_sunday = 6 - today.weekday().num_days_from_monday() as i64;
            return Ok(today + Duration::days(days_to_sunday));
        }
        "eom" => {
            let first = today.with_day(1).ok_or_else(|| anyhow!("Invalid date"))?;
            return first
                .checked_add_months(Months::new(1))
                .map(|next| next - Duration::days(1))
                .ok_or_else(|| anyhow!("Date out of range"));
        }
        _ => {}
    }

    // 2. Fixed formats
    if input.contains('/') {
        return parse_deadline(input);
    }
    if let Ok(d) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(d);
    }

    // 3. Relative format (+Nd, +Nw, +Nm)
    if let Some(body) = input.strip_prefix('+') {
        if body.len() < 2 || !body.is_ascii() {
            return Err(anyhow!("Invalid relative format: {}", input));
        }
        let (num_str, unit) = body.split_at(body.len() - 1);
        let count: u32 = num_str.parse().map_err(|_| anyhow!("Invalid relative format: {}", input))?;

        let target = match unit {
            "d" => Duration::try_days(count as i64).and_then(|d| today.checked_add_signed(d)),
            "w" => Duration::try_weeks(count as i64).and_then(|d| today.checked_add_signed(d)),
            // Clamps to the last day of a shorter month (Jan 31 + 1m -> Feb 28)
            "m" => today.checked_add_months(Months::new(count)),
            _ => return Err(anyhow!("Unknown unit in relative time: {}", unit)),
        };
        return target.ok_or_else(|| anyhow!("Date out of range"));
    }

    // 4. Weekday format (fri, 2:fri)
    if let Some((count, day_str)) = parse_weekday_token(input) {
        if let Ok(target_weekday) = parse_weekday_str(day_str) {
            let mut days_needed = target_weekday.num_days_from_sunday() as i64
                - today.weekday().num_days_from_sunday() as i64;
            if days_needed <= 0 {
                days_needed += 7;
            }
            return count
                .checked_sub(1)
                .and_then(|c| c.checked_mul(7))
                .and_then(|extra| extra.checked_add(days_needed))
                .and_then(Duration::try_days)
                .and_then(|offset| today.checked_add_signed(offset))
                .ok_or_else(|| anyhow!("Date out of range"));
        }
    }

    Err(anyhow!("Could not parse date: {}", input))
}

fn parse_weekday_token(input: &str) -> Option<(i64, &str)> {
    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() == 2 {
            if let Ok(count) = parts[0].parse::<i64>() {
                if count >= 1 {
                    return Some((count, parts[1]));
                }
            }
        }
    } else {
        // Just "fri" means 1:fri
        return Some((1, input));
    }
    None
}

fn parse_weekday_str(s: &str) -> Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(anyhow!("Invalid weekday")),
    }
}

/// Calendar cursor behind the deadline field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePicker {
    date: NaiveDate,
}

impl DatePicker {
    pub fn new(seed: NaiveDate) -> Self {
        Self { date: seed }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn shift_days(&mut self, days: i64) {
        if let Some(d) = self.date.checked_add_signed(Duration::days(days)) {
            self.date = d;
        }
    }

    /// Moves by whole months, clamping the day to the target month's length.
    pub fn shift_months(&mut self, months: i32) {
        let step = Months::new(months.unsigned_abs());
        let moved = if months >= 0 {
            self.date.checked_add_months(step)
        } else {
            self.date.checked_sub_months(step)
        };
        if let Some(d) = moved {
            self.date = d;
        }
    }

    pub fn shift_years(&mut self, years: i32) {
        self.shift_months(years.saturating_mul(12));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_deadline_is_unpadded_and_one_based() {
        assert_eq!(format_deadline(ymd(2024, 3, 5)), "5/3/2024");
        assert_eq!(format_deadline(ymd(2025, 12, 31)), "31/12/2025");
        assert_eq!(format_deadline(ymd(2026, 1, 1)), "1/1/2026");
    }

    #[test]
    fn test_parse_deadline() {
        assert_eq!(parse_deadline("5/3/2024").unwrap(), ymd(2024, 3, 5));
        assert_eq!(parse_deadline(" 05/03/2024 ").unwrap(), ymd(2024, 3, 5));
        assert!(parse_deadline("31/2/2024").is_err());
        assert!(parse_deadline("2024-03-05").is_err());
        assert!(parse_deadline("").is_err());
    }

    #[test]
    fn test_parse_human_date_relative_to_anchor() {
        // Wednesday
        let today = ymd(2024, 1, 31);
        assert_eq!(parse_human_date("today", today).unwrap(), today);
        assert_eq!(parse_human_date("tom", today).unwrap(), ymd(2024, 2, 1));
        assert_eq!(parse_human_date("eow", today).unwrap(), ymd(2024, 2, 4));
        assert_eq!(parse_human_date("eom", today).unwrap(), ymd(2024, 1, 31));
        assert_eq!(parse_human_date("+3d", today).unwrap(), ymd(2024, 2, 3));
        assert_eq!(parse_human_date("+1w", today).unwrap(), ymd(2024, 2, 7));
        assert_eq!(parse_human_date("+1m", today).unwrap(), ymd(2024, 2, 29));
        assert_eq!(parse_human_date("fri", today).unwrap(), ymd(2024, 2, 2));
        assert_eq!(parse_human_date("2:fri", today).unwrap(), ymd(2024, 2, 9));
        assert_eq!(parse_human_date("wed", today).unwrap(), ymd(2024, 2, 7));
        assert_eq!(parse_human_date("7/4/2024", today).unwrap(), ymd(2024, 4, 7));
        assert_eq!(parse_human_date("2024-04-07", today).unwrap(), ymd(2024, 4, 7));
        assert!(parse_human_date("someday", today).is_err());
        assert!(parse_human_date("+d", today).is_err());
    }

    #[test]
    fn test_parse_human_date_out_of_range_is_an_error() {
        let today = ymd(2024, 1, 31);
        assert!(parse_human_date("99999999999:fri", today).is_err());
        assert!(parse_human_date("9223372036854775807:mon", today).is_err());
        assert!(parse_human_date("+4294967295d", today).is_err());
        assert!(parse_human_date("+4294967295w", today).is_err());
        assert!(parse_human_date("+4294967295m", today).is_err());
    }

    #[test]
    fn test_parse_weekday_token() {
        assert_eq!(parse_weekday_token("fri"), Some((1, "fri")));
        assert_eq!(parse_weekday_token("2:fri"), Some((2, "fri")));
        assert_eq!(parse_weekday_token("0:fri"), None);
        assert_eq!(parse_weekday_token("invalid"), Some((1, "invalid"))); // will fail later at weekday parse
    }

    #[test]
    fn test_date_picker_clamps_month_shift() {
        let mut picker = DatePicker::new(ymd(2024, 1, 31));
        picker.shift_months(1);
        assert_eq!(picker.date(), ymd(2024, 2, 29));
        picker.shift_months(-2);
        assert_eq!(picker.date(), ymd(2023, 12, 29));
        picker.shift_years(1);
        assert_eq!(picker.date(), ymd(2024, 12, 29));
        picker.shift_days(3);
        assert_eq!(picker.date(), ymd(2025, 1, 1));
        picker.shift_days(-7);
        assert_eq!(picker.date(), ymd(2024, 12, 25));
    }
}
