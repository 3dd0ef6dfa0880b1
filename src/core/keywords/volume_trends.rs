use chrono::{Datelike, Months, NaiveDate};

/// Day of month used to date a monthly volume.
pub const VOLUME_DAY_OF_MONTH: u32 = 15;
pub const TRAILING_MONTHS: usize = 12;

const MONTH_NAMES: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

/// `"MARCH"` -> 3. Case-insensitive; `UNSPECIFIED`/`UNKNOWN` give `None`.
pub fn month_number(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();
    MONTH_NAMES
        .iter()
        .position(|m| *m == upper)
        .map(|i| i as u32 + 1)
}

pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Date a monthly volume is recorded under.
pub fn volume_record_date(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, VOLUME_DAY_OF_MONTH)
}

/// The 15th of each of the `n` months before `today`'s month, oldest first.
pub fn trailing_month_dates(today: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let Some(anchor) = NaiveDate::from_ymd_opt(today.year(), today.month(), VOLUME_DAY_OF_MONTH)
    else {
        return Vec::new();
    };
    (1..=n as u32)
        .rev()
        .filter_map(|back| anchor.checked_sub_months(Months::new(back)))
        .collect()
}

fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
}

fn tail(values: &[i64], n: usize) -> &[i64] {
    &values[values.len().saturating_sub(n)..]
}

/// Slope of a least-squares line through the last three months, divided by
/// the mean volume over the whole series and rounded to three places.
pub fn three_month_trend_coef(volumes: &[i64]) -> Option<f64> {
    let overall = mean(volumes)?;
    let window = tail(volumes, 3);
    if window.len() < 2 || overall == 0.0 {
        return None;
    }

    let n = window.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = window.iter().sum::<i64>() as f64 / n;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in window.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (*y as f64 - y_mean);
        den += dx * dx;
    }
    let slope = num / den;
    Some((slope / overall * 1000.0).round() / 1000.0)
}

pub fn latest_volume(volumes: &[i64]) -> Option<i64> {
    volumes.last().copied()
}

pub fn previous_volume(volumes: &[i64]) -> Option<i64> {
    volumes.len().checked_sub(2).map(|i| volumes[i])
}

/// The month twelve months before the latest one.
pub fn last_year_volume(volumes: &[i64]) -> Option<i64> {
    volumes.len().checked_sub(13).map(|i| volumes[i])
}

pub fn volume_mom(volumes: &[i64]) -> Option<i64> {
    Some(latest_volume(volumes)? - previous_volume(volumes)?)
}

pub fn volume_yoy(volumes: &[i64]) -> Option<i64> {
    Some(latest_volume(volumes)? - last_year_volume(volumes)?)
}

/// Mean of the last `months` entries. A twelve-month average needs a full
/// year of data; shorter windows average whatever is there.
pub fn volume_average(volumes: &[i64], months: usize) -> Option<f64> {
    if months >= TRAILING_MONTHS && volumes.len() < months {
        return None;
    }
    mean(tail(volumes, months))
}

/// Everything derived from one keyword's monthly volume series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeTrendStats {
    pub trend_coef: Option<f64>,
    pub latest: Option<i64>,
    pub previous: Option<i64>,
    pub last_year: Option<i64>,
    pub mom: Option<i64>,
    pub yoy: Option<i64>,
    pub avg_3_months: Option<f64>,
    pub avg_6_months: Option<f64>,
    pub avg_12_months: Option<f64>,
}

impl VolumeTrendStats {
    pub fn from_volumes(volumes: &[i64]) -> Self {
        Self {
            trend_coef: three_month_trend_coef(volumes),
            latest: latest_volume(volumes),
            previous: previous_volume(volumes),
            last_year: last_year_volume(volumes),
            mom: volume_mom(volumes),
            yoy: volume_yoy(volumes),
            avg_3_months: volume_average(volumes, 3),
            avg_6_months: volume_average(volumes, 6),
            avg_12_months: volume_average(volumes, 12),
        }
    }
}
