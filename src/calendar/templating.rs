use super::{iso_key, month_name, weekday_name};
use crate::holidays::{Holiday, HolidaysByMonth};
use chrono::Locale;
use minijinja::value::{StructObject, Value};

impl StructObject for Holiday {
    fn get_field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "date" => {
                let date = self.date.format_localized("%e. %B", Locale::de_AT);
                Value::from(date.to_string().trim_start().to_owned())
            }
            "short_date" => Value::from(self.date.format("%d.%m.").to_string()),
            "iso" => Value::from(iso_key(self.date)),
            "weekday" => Value::from(weekday_name(self.date)),
            "name" => Value::from(self.name.clone()),
            "is_regional" => Value::from(self.is_regional),
            _ => return None,
        };

        Some(value)
    }

    fn static_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["date", "short_date", "iso", "weekday", "name", "is_regional"])
    }
}

/// Wraps a holiday so that templates get the formatted fields above.
pub fn holiday_value(holiday: &Holiday) -> Value {
    Value::from_struct_object(holiday.clone())
}

/// Holidays grouped by month as `{ month, name, holidays }`, in the order of `by_month`.
pub fn holiday_groups(by_month: &HolidaysByMonth) -> Vec<Value> {
    by_month
        .iter()
        .map(|(month, holidays)| {
            minijinja::context! {
                month => month,
                name => month_name(*month).unwrap_or_default(),
                holidays => holidays.iter().map(holiday_value).collect::<Vec<_>>(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holidays::HolidayTable;
    use chrono::NaiveDate;

    #[test]
    fn holiday_fields() {
        let holiday = Holiday::new(NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(), "Heilige Drei Könige");

        assert_eq!(holiday.get_field("date"), Some(Value::from("6. Jänner")));
        assert_eq!(holiday.get_field("short_date"), Some(Value::from("06.01.")));
        assert_eq!(holiday.get_field("iso"), Some(Value::from("2026-01-06")));
        assert_eq!(holiday.get_field("weekday"), Some(Value::from("Dienstag")));
        assert_eq!(holiday.get_field("unknown"), None);

        let env = minijinja::Environment::new();
        let rendered = env
            .template_from_str("{{ h.name }} am {{ h.date }}")
            .unwrap()
            .render(minijinja::context! { h => holiday_value(&holiday) })
            .unwrap();
        assert_eq!(rendered, "Heilige Drei Könige am 6. Jänner");
    }

    #[test]
    fn holidays_grouped_by_month() {
        let groups = holiday_groups(&HolidayTable::austria_2026().by_month());
        assert_eq!(groups.len(), 8);

        let env = minijinja::Environment::new();
        let tmpl = env
            .template_from_str(
                "{% for group in groups %}{{ group.name }}: \
                 {% for h in group.holidays %}{{ h.short_date }} {{ h.name }}{% if not loop.last %}, {% endif %}{% endfor %}\n\
                 {% endfor %}",
            )
            .unwrap();
        let rendered = tmpl
            .render(minijinja::context! { groups => groups })
            .unwrap();

        let mut lines = rendered.lines();
        assert_eq!(
            lines.next(),
            Some("Januar: 01.01. Neujahr, 06.01. Heilige Drei Könige")
        );
        assert_eq!(
            lines.last(),
            Some("Dezember: 08.12. Mariä Empfängnis, 25.12. Christtag, 26.12. Stefanitag")
        );
    }
}
