//! Column-aware row ordering.
//!
//! Every comparison falls back to the row ids, so distinct rows never compare equal and
//! sort output does not depend on the stability of the sort algorithm.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use crate::{Header, RowEvent, NA_VALUE};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_YEAR: i64 = 365 * SECS_PER_DAY;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    Natural,
    Number,
    Duration,
    /// Natural ordering of the rendered string. Not unit aware: "2 GiB" sorts before "500 MiB".
    Capacity,
}

impl SortMode {
    pub fn from_flags(is_number: bool, is_duration: bool, is_capacity: bool) -> Self {
        match (is_number, is_duration, is_capacity) {
            (true, _, _) => SortMode::Number,
            (_, true, _) => SortMode::Duration,
            (_, _, true) => SortMode::Capacity,
            _ => SortMode::Natural,
        }
    }

    /// Mode for column `col`: time and capacity attributes win, then a column whose every
    /// non-empty value is a grouped integer sorts numerically.
    pub fn for_column<'a, I>(header: &Header, col: usize, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        if header.is_time_col(col) {
            return SortMode::Duration;
        }
        if header.is_capacity_col(col) {
            return SortMode::Capacity;
        }
        let mut seen = false;
        for v in values {
            if v.is_empty() {
                continue;
            }
            if !is_grouped_number(v) {
                return SortMode::Natural;
            }
            seen = true;
        }
        if seen { SortMode::Number } else { SortMode::Natural }
    }
}

fn is_grouped_number(v: &str) -> bool {
    let mut digits = false;
    for b in v.bytes() {
        match b {
            b'0'..=b'9' => digits = true,
            b',' => {}
            _ => return false,
        }
    }
    digits
}

/// True when row `a` sorts before row `b`.
pub fn less(
    is_number: bool,
    is_duration: bool,
    is_capacity: bool,
    id_a: &str,
    id_b: &str,
    value_a: &str,
    value_b: &str,
) -> bool {
    let mode = SortMode::from_flags(is_number, is_duration, is_capacity);
    compare(mode, id_a, id_b, value_a, value_b) == Ordering::Less
}

/// Total order over `(id, value)` pairs for the given mode.
pub fn compare(mode: SortMode, id_a: &str, id_b: &str, value_a: &str, value_b: &str) -> Ordering {
    let by_value = match mode {
        SortMode::Number => natural_cmp(&value_a.replace(',', ""), &value_b.replace(',', "")),
        SortMode::Duration => duration_to_seconds(value_a).cmp(&duration_to_seconds(value_b)),
        SortMode::Capacity | SortMode::Natural => natural_cmp(value_a, value_b),
    };
    by_value.then_with(|| natural_cmp(id_a, id_b))
}

/// Compare two row events on column `col`.
pub fn compare_events(mode: SortMode, col: usize, a: &RowEvent, b: &RowEvent) -> Ordering {
    compare(
        mode,
        &a.row.id,
        &b.row.id,
        a.row.field(col).unwrap_or(""),
        b.row.field(col).unwrap_or(""),
    )
}

pub fn natural_less(a: &str, b: &str) -> bool {
    natural_cmp(a, b) == Ordering::Less
}

/// Digit-aware string ordering: embedded digit runs compare by numeric value.
///
/// Runs equal in value but differing in leading zeros order the shorter run first, so
/// only identical strings compare equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    let mut tie = Ordering::Equal;
    loop {
        match (a.first(), b.first()) {
            (None, None) => return tie,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (run_a, rest_a) = split_digits(a);
                let (run_b, rest_b) = split_digits(b);
                let (num_a, num_b) = (trim_zeros(run_a), trim_zeros(run_b));
                let ord = num_a.len().cmp(&num_b.len()).then_with(|| num_a.cmp(num_b));
                if ord != Ordering::Equal {
                    return ord;
                }
                if tie == Ordering::Equal {
                    tie = run_a.len().cmp(&run_b.len());
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// Parse a compact duration such as `1d3h` or `90m` into seconds.
///
/// Units: `y` (365 days), `d`, `h`, `m`, `s`. Placeholders and empty values are zero.
pub fn duration_to_seconds(duration: &str) -> i64 {
    let duration = duration.trim();
    if duration.is_empty() || duration == NA_VALUE {
        return 0;
    }
    let mut total: i64 = 0;
    let mut num: i64 = 0;
    for c in duration.chars() {
        let unit = match c {
            'y' => SECS_PER_YEAR,
            'd' => SECS_PER_DAY,
            'h' => SECS_PER_HOUR,
            'm' => SECS_PER_MINUTE,
            's' => 1,
            '0'..='9' => {
                num = num.saturating_mul(10).saturating_add(i64::from(c as u8 - b'0'));
                continue;
            }
            _ => continue,
        };
        total = total.saturating_add(num.saturating_mul(unit));
        num = 0;
    }
    total
}
