pub mod templating;

use crate::enrichment::EnrichmentRecord;
use crate::holidays::HolidayTable;
use crate::{Error, Result, YEAR};
use chrono::{Datelike, Duration, Locale, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MONTH_NAMES: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Weekday abbreviations, Monday first.
pub const DAY_NAMES: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];

/// Full weekday names, Monday first.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
    "Sonntag",
];

/// Returns the German name of `month` (1-12).
pub fn month_name(month: u32) -> Result<&'static str> {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
        .ok_or(Error::InvalidMonth(month))
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

/// The canonical `YYYY-MM-DD` key of a day.
pub fn iso_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` key.
pub fn parse_iso_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").map_err(|_| Error::InvalidDate(key.to_owned()))
}

/// Human readable date in Austrian German, e.g. `26. Oktober 2026`.
pub fn german_date(date: NaiveDate) -> String {
    date.format_localized("%-d. %B %Y", Locale::de_AT)
        .to_string()
}

/// The current day in Vienna.
pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&chrono_tz::Europe::Vienna).date_naive()
}

fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

fn days_from(first: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(first), |day| day.succ_opt())
}

/// All days of `year` in order.
pub fn days_of_year(year: i32) -> Vec<NaiveDate> {
    match NaiveDate::from_ymd_opt(year, 1, 1) {
        Some(first) => days_from(first).take_while(|day| day.year() == year).collect(),
        None => Vec::new(),
    }
}

/// All days of `month` (1-12) in `year`.
pub fn days_of_month(year: i32, month: u32) -> Result<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidMonth(month))?;
    Ok(days_from(first)
        .take_while(|day| day.month() == month)
        .collect())
}

/// A single day as displayed in the calendar views.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub iso: String,
    pub day: u32,
    pub weekday: &'static str,
    pub in_month: bool,
    pub is_today: bool,
    pub is_weekend: bool,
    pub holiday: Option<String>,
    pub namenstag: Option<String>,
}

impl DayCell {
    fn new(date: NaiveDate, month: u32, today: NaiveDate, holidays: &HolidayTable) -> DayCell {
        DayCell {
            date,
            iso: iso_key(date),
            day: date.day(),
            weekday: weekday_name(date),
            in_month: date.month() == month,
            is_today: date == today,
            is_weekend: is_weekend(date),
            holiday: holidays.holiday_for(date).map(|holiday| holiday.name.clone()),
            namenstag: None,
        }
    }

    fn annotate(&mut self, records: &BTreeMap<String, EnrichmentRecord>) {
        self.namenstag = records
            .get(&self.iso)
            .map(|record| record.namenstag.clone());
    }
}

/// A compact month for the year overview: leading blanks so the first day lands on its weekday
/// column, followed by the days of the month.
#[derive(Serialize, Debug, Clone)]
pub struct MiniMonth {
    pub month: u32,
    pub name: &'static str,
    pub blanks: usize,
    pub days: Vec<DayCell>,
}

impl MiniMonth {
    pub fn new(year: i32, month: u32, today: NaiveDate, holidays: &HolidayTable) -> Result<MiniMonth> {
        let days = days_of_month(year, month)?;
        let blanks = days
            .first()
            .map(|first| first.weekday().num_days_from_monday() as usize)
            .unwrap_or_default();

        Ok(MiniMonth {
            month,
            name: month_name(month)?,
            blanks,
            days: days
                .into_iter()
                .map(|day| DayCell::new(day, month, today, holidays))
                .collect(),
        })
    }

    /// All twelve months of `year`.
    pub fn year(year: i32, today: NaiveDate, holidays: &HolidayTable) -> Result<Vec<MiniMonth>> {
        (1..=12)
            .map(|month| MiniMonth::new(year, month, today, holidays))
            .collect()
    }
}

/// Full month view: complete weeks from Monday to Sunday, including the trailing and leading days
/// of the neighbouring months.
#[derive(Serialize, Debug, Clone)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub name: &'static str,
    pub weeks: Vec<Vec<DayCell>>,
}

impl MonthGrid {
    pub fn new(year: i32, month: u32, today: NaiveDate, holidays: &HolidayTable) -> Result<MonthGrid> {
        let days = days_of_month(year, month)?;
        let (first, last) = match (days.first(), days.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(Error::InvalidMonth(month)),
        };

        let start = first - Duration::days(first.weekday().num_days_from_monday().into());
        let end = last + Duration::days((6 - last.weekday().num_days_from_monday()).into());

        let cells: Vec<DayCell> = days_from(start)
            .take_while(|day| *day <= end)
            .map(|day| DayCell::new(day, month, today, holidays))
            .collect();

        Ok(MonthGrid {
            year,
            month,
            name: month_name(month)?,
            weeks: cells.chunks(7).map(<[DayCell]>::to_vec).collect(),
        })
    }

    /// Adds cached name days to the cells.
    pub fn annotate(&mut self, records: &BTreeMap<String, EnrichmentRecord>) {
        self.weeks
            .iter_mut()
            .flatten()
            .for_each(|cell| cell.annotate(records));
    }
}

/// The week (Monday to Sunday) containing a day.
#[derive(Serialize, Debug, Clone)]
pub struct Week {
    pub iso_week: u32,
    pub days: Vec<DayCell>,
}

impl Week {
    pub fn containing(date: NaiveDate, today: NaiveDate, holidays: &HolidayTable) -> Week {
        let monday = date - Duration::days(date.weekday().num_days_from_monday().into());

        Week {
            iso_week: date.iso_week().week(),
            days: days_from(monday)
                .take(7)
                .map(|day| DayCell::new(day, date.month(), today, holidays))
                .collect(),
        }
    }

    pub fn annotate(&mut self, records: &BTreeMap<String, EnrichmentRecord>) {
        self.days.iter_mut().for_each(|cell| cell.annotate(records));
    }
}

/// `target` if it lies in the supported year, otherwise the day of its Monday-to-Sunday week
/// closest to it that does, if any.
fn week_within_year(target: NaiveDate) -> Option<NaiveDate> {
    let monday = target - Duration::days(target.weekday().num_days_from_monday().into());
    let sunday = monday + Duration::days(6);
    let first = NaiveDate::from_ymd_opt(YEAR, 1, 1)?;
    let last = NaiveDate::from_ymd_opt(YEAR, 12, 31)?;

    (monday <= last && sunday >= first).then(|| target.clamp(first, last))
}

/// The calendar views.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Year,
    Month,
    Week,
    Day,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [ViewMode::Year, ViewMode::Month, ViewMode::Week, ViewMode::Day];

    /// German label used in the view switcher.
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Year => "Jahr",
            ViewMode::Month => "Monat",
            ViewMode::Week => "Woche",
            ViewMode::Day => "Tag",
        }
    }

    /// Moves `date` one unit of this view forward (`direction > 0`) or backward.
    ///
    /// The year view does not move. Returns `None` if the target leaves the supported year. A week
    /// straddling the turn of the year is still reachable; the target is then clamped to its first
    /// or last day within the year.
    pub fn step(&self, date: NaiveDate, direction: i32) -> Option<NaiveDate> {
        let forward = direction > 0;
        let within_year = |target: NaiveDate| (target.year() == YEAR).then_some(target);

        match self {
            ViewMode::Year => Some(date),
            ViewMode::Month if forward => date
                .checked_add_months(Months::new(1))
                .and_then(within_year),
            ViewMode::Month => date
                .checked_sub_months(Months::new(1))
                .and_then(within_year),
            ViewMode::Week => date
                .checked_add_signed(Duration::weeks(if forward { 1 } else { -1 }))
                .and_then(week_within_year),
            ViewMode::Day if forward => date.succ_opt().and_then(within_year),
            ViewMode::Day => date.pred_opt().and_then(within_year),
        }
    }

    /// The subtitle shown in the page header.
    pub fn header_label(&self, date: NaiveDate) -> String {
        let month = date.format_localized("%B", Locale::de_AT);
        match self {
            ViewMode::Year => date.year().to_string(),
            ViewMode::Month => format!("{month} {}", date.year()),
            ViewMode::Week => format!("KW {}, {month} {}", date.iso_week().week(), date.year()),
            ViewMode::Day => german_date(date),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.label().fmt(f)
    }
}
