use serde_json::Value;

use crate::extract::split_yield;

/// One yield reading gathered from a source: "24 cookies" is value 24 with
/// unit "cookies".
#[derive(Debug, Clone, PartialEq)]
pub struct YieldOption {
    pub value: u32,
    pub unit: String,
}

/// Pick a single servings value and unit from possibly conflicting yield
/// readings. The unit mentioned in the recipe title wins, otherwise the
/// most frequent unit; among that unit's values, one reading is taken as
/// is, two are averaged, more than two take the median.
pub fn resolve_yield(options: &[YieldOption], title: &str) -> Option<(u32, String)> {
    if options.is_empty() {
        return None;
    }

    let unit = pick_unit(options, title);
    let mut values: Vec<u32> = options
        .iter()
        .filter(|o| o.unit == unit)
        .map(|o| o.value)
        .collect();
    values.sort_unstable();

    let value = match values.len() {
        0 => return None,
        1 => values[0],
        2 => average(values[0], values[1]),
        n if n % 2 == 1 => values[n / 2],
        n => average(values[n / 2 - 1], values[n / 2]),
    };
    Some((value, unit))
}

fn pick_unit(options: &[YieldOption], title: &str) -> String {
    let title = title.to_lowercase();
    for option in options {
        if title.contains(option.unit.to_lowercase().trim_end_matches('s')) {
            return option.unit.clone();
        }
    }

    // fall back to the most frequent unit, first seen winning ties
    let mut best: Option<(&str, usize)> = None;
    for option in options {
        let count = options.iter().filter(|o| o.unit == option.unit).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((&option.unit, count));
        }
    }
    best.map(|(u, _)| u.to_string())
        .unwrap_or_else(|| options[0].unit.clone())
}

fn average(a: u32, b: u32) -> u32 {
    ((a as f64 + b as f64) / 2.0).round() as u32
}

/// Read a servings value and unit out of whatever shape a generated recipe
/// puts there: a bare number, a string like "4" or "24 cookies", or an
/// array of either.
pub fn parse_yield_value(value: &Value, title: &str) -> (Option<u32>, Option<String>) {
    match value {
        Value::Number(n) => {
            let count = n
                .as_u64()
                .map(|v| v as u32)
                .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v.round() as u32));
            (count, None)
        }
        Value::String(s) => {
            let (count, unit) = split_yield(s);
            (count, Some(unit))
        }
        Value::Array(entries) => {
            let options: Vec<YieldOption> = entries
                .iter()
                .filter_map(|e| match parse_yield_value(e, title) {
                    (Some(v), unit) => Some(YieldOption {
                        value: v,
                        unit: unit.unwrap_or_else(|| "servings".to_string()),
                    }),
                    _ => None,
                })
                .collect();
            match resolve_yield(&options, title) {
                Some((value, unit)) => (Some(value), Some(unit)),
                None => (None, None),
            }
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option(value: u32, unit: &str) -> YieldOption {
        YieldOption {
            value,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn test_title_unit_wins() {
        let options = vec![option(4, "servings"), option(24, "cookies")];
        let resolved = resolve_yield(&options, "Chewy Chocolate Chip Cookies");
        assert_eq!(resolved, Some((24, "cookies".to_string())));
    }

    #[test]
    fn test_most_frequent_unit_without_title_match() {
        let options = vec![
            option(4, "servings"),
            option(6, "servings"),
            option(12, "muffins"),
        ];
        let resolved = resolve_yield(&options, "Sunday Brunch Bake");
        assert_eq!(resolved, Some((5, "servings".to_string())));
    }

    #[test]
    fn test_median_of_three_values() {
        let options = vec![
            option(24, "servings"),
            option(20, "servings"),
            option(15, "servings"),
        ];
        let resolved = resolve_yield(&options, "Party Platter");
        assert_eq!(resolved, Some((20, "servings".to_string())));
    }

    #[test]
    fn test_rounded_average_of_two_values() {
        let options = vec![option(24, "servings"), option(20, "servings")];
        let resolved = resolve_yield(&options, "Party Platter");
        assert_eq!(resolved, Some((22, "servings".to_string())));
    }

    #[test]
    fn test_empty_options() {
        assert_eq!(resolve_yield(&[], "Anything"), None);
    }

    #[test]
    fn test_parse_number_value() {
        let (count, unit) = parse_yield_value(&json!(6), "Soup");
        assert_eq!(count, Some(6));
        assert_eq!(unit, None);
    }

    #[test]
    fn test_parse_string_value() {
        let (count, unit) = parse_yield_value(&json!("24 cookies"), "Cookies");
        assert_eq!(count, Some(24));
        assert_eq!(unit, Some("cookies".to_string()));

        let (count, unit) = parse_yield_value(&json!("4"), "Soup");
        assert_eq!(count, Some(4));
        assert_eq!(unit, Some("servings".to_string()));
    }

    #[test]
    fn test_parse_array_value() {
        let (count, unit) = parse_yield_value(&json!(["24 cookies", "20 cookies"]), "Cookies");
        assert_eq!(count, Some(22));
        assert_eq!(unit, Some("cookies".to_string()));
    }
}
