use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public holidays in Austria in 2026, in chronological order.
const AUSTRIAN_HOLIDAYS_2026: [(u32, u32, &str); 15] = [
    (1, 1, "Neujahr"),
    (1, 6, "Heilige Drei Könige"),
    (4, 5, "Ostersonntag"),
    (4, 6, "Ostermontag"),
    (5, 1, "Staatsfeiertag"),
    (5, 14, "Christi Himmelfahrt"),
    (5, 24, "Pfingstsonntag"),
    (5, 25, "Pfingstmontag"),
    (6, 4, "Fronleichnam"),
    (8, 15, "Mariä Himmelfahrt"),
    (10, 26, "Nationalfeiertag"),
    (11, 1, "Allerheiligen"),
    (12, 8, "Mariä Empfängnis"),
    (12, 25, "Christtag"),
    (12, 26, "Stefanitag"),
];

/// A public holiday.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    /// The day of the holiday.
    pub date: NaiveDate,
    /// The holiday name.
    pub name: String,
    /// Whether the holiday is only observed in some federal states.
    #[serde(default)]
    pub is_regional: bool,
}

impl Holiday {
    pub fn new(date: NaiveDate, name: impl Into<String>) -> Holiday {
        Holiday {
            date,
            name: name.into(),
            is_regional: false,
        }
    }
}

impl fmt::Display for Holiday {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.name.fmt(f)
    }
}

/// Type alias for holidays grouped by month.
pub type HolidaysByMonth = IndexMap<u32, Vec<Holiday>>;

/// Immutable, chronologically ordered table of holidays.
#[derive(Debug, Clone, Default)]
pub struct HolidayTable {
    holidays: Vec<Holiday>,
}

impl HolidayTable {
    /// Creates a table from holidays. Entries are sorted by date and duplicate dates are dropped,
    /// keeping the first one.
    pub fn new<I>(iter: I) -> HolidayTable
    where
        I: IntoIterator<Item = Holiday>,
    {
        let mut holidays: Vec<Holiday> = iter.into_iter().collect();
        holidays.sort_by_key(|holiday| holiday.date);
        holidays.dedup_by_key(|holiday| holiday.date);
        HolidayTable { holidays }
    }

    /// The statutory holidays of Austria in 2026.
    pub fn austria_2026() -> HolidayTable {
        HolidayTable::new(
            AUSTRIAN_HOLIDAYS_2026
                .iter()
                .filter_map(|&(month, day, name)| {
                    NaiveDate::from_ymd_opt(crate::YEAR, month, day)
                        .map(|date| Holiday::new(date, name))
                }),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holiday> {
        self.holidays.iter()
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }

    /// Exact lookup by day.
    pub fn holiday_for(&self, date: NaiveDate) -> Option<&Holiday> {
        self.holidays.iter().find(|holiday| holiday.date == date)
    }

    /// Returns the first holiday strictly after `date`.
    ///
    /// Past the last holiday of the table this wraps around to the first entry, so there is always
    /// something to show. Returns `None` only for an empty table.
    pub fn next_holiday_from(&self, date: NaiveDate) -> Option<&Holiday> {
        self.holidays
            .iter()
            .find(|holiday| holiday.date > date)
            .or_else(|| self.holidays.first())
    }

    /// Holidays falling into `month` (1-12).
    pub fn in_month(&self, month: u32) -> Vec<&Holiday> {
        self.holidays
            .iter()
            .filter(|holiday| holiday.date.month() == month)
            .collect()
    }

    /// Builds an index of month to holidays, used by the year view.
    pub fn by_month(&self) -> HolidaysByMonth {
        let mut by_month: HolidaysByMonth = IndexMap::new();

        for holiday in &self.holidays {
            by_month
                .entry(holiday.date.month())
                .or_default()
                .push(holiday.clone());
        }

        by_month
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! date {
        ($y:expr, $m:expr, $d:expr) => {
            NaiveDate::from_ymd_opt($y, $m, $d).unwrap()
        };
    }

    #[test]
    fn table_is_complete_and_sorted() {
        let table = HolidayTable::austria_2026();
        assert_eq!(table.len(), 15);
        assert!(table
            .iter()
            .zip(table.iter().skip(1))
            .all(|(a, b)| a.date < b.date));
    }

    #[test]
    fn holiday_for_exact_date() {
        let table = HolidayTable::austria_2026();

        assert_eq!(
            table.holiday_for(date!(2026, 10, 26)),
            Some(&Holiday::new(date!(2026, 10, 26), "Nationalfeiertag"))
        );
        assert_eq!(table.holiday_for(date!(2026, 10, 27)), None);
    }

    #[test]
    fn next_holiday() {
        let table = HolidayTable::austria_2026();

        assert_eq!(
            table.next_holiday_from(date!(2026, 10, 17)).unwrap().name,
            "Nationalfeiertag"
        );
        // Strictly after: the holiday itself is not "next".
        assert_eq!(
            table.next_holiday_from(date!(2026, 1, 1)).unwrap().name,
            "Heilige Drei Könige"
        );
        assert_eq!(
            table.next_holiday_from(date!(2025, 12, 31)).unwrap().name,
            "Neujahr"
        );
    }

    #[test]
    fn next_holiday_wraps_around() {
        let table = HolidayTable::austria_2026();

        let next = table.next_holiday_from(date!(2026, 12, 27)).unwrap();
        assert_eq!(next, &Holiday::new(date!(2026, 1, 1), "Neujahr"));

        let next = table.next_holiday_from(date!(2026, 12, 26)).unwrap();
        assert_eq!(next.name, "Neujahr");

        assert_eq!(HolidayTable::default().next_holiday_from(date!(2026, 1, 1)), None);
    }

    #[test]
    fn holidays_by_month() {
        let table = HolidayTable::austria_2026();

        let names: Vec<_> = table.in_month(5).iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Staatsfeiertag",
                "Christi Himmelfahrt",
                "Pfingstsonntag",
                "Pfingstmontag"
            ]
        );
        assert!(table.in_month(2).is_empty());

        let by_month = table.by_month();
        assert_eq!(
            by_month.keys().copied().collect::<Vec<_>>(),
            vec![1, 4, 5, 6, 8, 10, 11, 12]
        );
        assert_eq!(by_month[&12].len(), 3);
    }

    #[test]
    fn duplicates_are_dropped() {
        let table = HolidayTable::new([
            Holiday::new(date!(2026, 5, 1), "b"),
            Holiday::new(date!(2026, 1, 1), "a"),
            Holiday::new(date!(2026, 5, 1), "c"),
        ]);
        let names: Vec<_> = table.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
