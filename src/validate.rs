//! Validation of bound values against their properties.
//!
//! Every property is checked and every failure is reported; validation never
//! stops at the first problem.

use crate::bindings::{enumeration_name, Bindings};
use crate::path::OptionComparer;
use crate::property::{Property, Rule};
use crate::schema::DataType;
use regex::Regex;

/// Compile a `pattern` rule so that it must match the whole value.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

/// Check all bound values of `properties`, returning one message per failure.
pub fn validate(properties: &[Property], bindings: &Bindings, comparer: OptionComparer) -> Vec<String> {
    let mut messages = Vec::new();

    for property in properties {
        let entries = bindings.matching(property, comparer);
        let name = property.path.to_string();

        if entries.is_empty() {
            // Members of repeated structures are only required per entry, and
            // members of an optional object only once it is given.
            if property.meta.required
                && property.meta.default.is_none()
                && !property.path.has_wildcards()
                && !bindings.in_absent_parent(property, comparer)
            {
                messages.push(format!("The {} field is required.", name));
            }
            continue;
        }

        let is_list = property.data_type.is_simple_array();
        let element = match &property.data_type {
            DataType::Array { element } if is_list => element.as_ref(),
            other => other,
        };

        for (key, raw) in &entries {
            if let Err(detail) = coerce(raw, element) {
                messages.push(invalid_value(raw, key, &detail));
                continue;
            }
            for rule in &property.meta.rules {
                if is_list && matches!(rule, Rule::Length { .. }) {
                    continue;
                }
                if let Some(message) = check_rule(rule, key, raw) {
                    messages.push(message);
                }
            }
            for validator in &property.meta.validators {
                if let Err(detail) = validator.parse(raw) {
                    messages.push(invalid_value(raw, key, &detail));
                }
            }
        }

        if is_list {
            for rule in &property.meta.rules {
                if let Rule::Length { min, max } = rule {
                    if let Some(message) = check_length(&name, entries.len(), *min, *max, "entries") {
                        messages.push(message);
                    }
                }
            }
        }
    }

    messages
}

fn invalid_value(raw: &str, key: &str, detail: &str) -> String {
    format!("'{}' is not a valid value for {}: {}", raw, key, detail)
}

/// Check that `raw` converts to `data_type`.
fn coerce(raw: &str, data_type: &DataType) -> Result<(), String> {
    match data_type {
        DataType::Boolean => {
            if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
                Ok(())
            } else {
                Err("expected true or false".to_string())
            }
        }
        DataType::Number(number) => number
            .kind
            .check(raw)
            .map_err(|e| format!("expected {} ({})", data_type.describe(), e)),
        DataType::String(string) if string.is_enumeration() => {
            if enumeration_name(raw, string).is_some() {
                return Ok(());
            }
            let names: Vec<&str> = string
                .values
                .iter()
                .filter(|v| !v.hidden)
                .map(|v| v.name.as_str())
                .collect();
            Err(format!("expected one of {}", names.join(", ")))
        }
        DataType::String(string) => match &string.parser {
            Some(parser) => parser.parse(raw),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn check_rule(rule: &Rule, key: &str, raw: &str) -> Option<String> {
    match rule {
        Rule::Range { min, max } => {
            let Ok(value) = raw.parse::<f64>() else {
                return Some(format!("The field {} must be a number.", key));
            };
            let below = min.is_some_and(|min| value < min);
            let above = max.is_some_and(|max| value > max);
            if !(below || above) {
                return None;
            }
            Some(match (min, max) {
                (Some(min), Some(max)) => format!("The field {} must be between {} and {}.", key, min, max),
                (Some(min), None) => format!("The field {} must be at least {}.", key, min),
                (None, _) => format!("The field {} must be at most {}.", key, max.unwrap_or_default()),
            })
        }
        Rule::Length { min, max } => check_length(key, raw.chars().count(), *min, *max, "characters"),
        Rule::Pattern { pattern } => {
            let regex = compile_pattern(pattern).ok()?;
            (!regex.is_match(raw))
                .then(|| format!("The field {} must match the regular expression '{}'.", key, pattern))
        }
        Rule::OneOf { values } => {
            let allowed = values
                .iter()
                .any(|v| OptionComparer::IgnoreCase.equals(v, raw));
            (!allowed).then(|| format!("The field {} must be one of: {}.", key, values.join(", ")))
        }
    }
}

fn check_length(key: &str, length: usize, min: Option<usize>, max: Option<usize>, unit: &str) -> Option<String> {
    let short = min.is_some_and(|min| length < min);
    let long = max.is_some_and(|max| length > max);
    if !(short || long) {
        return None;
    }
    Some(match (min, max) {
        (Some(min), Some(max)) => format!(
            "The field {} must have between {} and {} {}.",
            key, min, max, unit
        ),
        (Some(min), None) => format!("The field {} must have at least {} {}.", key, min, unit),
        (None, _) => format!(
            "The field {} must have at most {} {}.",
            key,
            max.unwrap_or_default(),
            unit
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ConfigSection;
    use crate::schema::{EnumerationValue, NumberKind, StringType, ValueParser};

    fn prop(name: &str, data_type: DataType) -> Property {
        Property::new(ConfigSection::new(name).into(), data_type)
    }

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        let mut b = Bindings::new();
        for (k, v) in pairs {
            b.insert(*k, *v);
        }
        b
    }

    fn run(properties: &[Property], pairs: &[(&str, &str)]) -> Vec<String> {
        validate(properties, &bindings(pairs), OptionComparer::IgnoreCase)
    }

    #[test]
    fn test_required_missing() {
        let mut read = prop("Read", DataType::array(DataType::string()));
        read.meta.required = true;
        assert_eq!(run(&[read], &[]), vec!["The Read field is required."]);
    }

    #[test]
    fn test_default_satisfies_required() {
        let mut level = prop("Level", DataType::string());
        level.meta.required = true;
        level.meta.default = Some("info".to_string());
        assert!(run(&[level], &[]).is_empty());
    }

    #[test]
    fn test_number_range_of_kind() {
        let port = prop("Port", DataType::number(NumberKind::U16));
        assert!(run(&[port.clone()], &[("Port", "8080")]).is_empty());
        let messages = run(&[port], &[("Port", "70000")]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("'70000' is not a valid value for Port: expected non-negative integer"));
    }

    #[test]
    fn test_boolean_coercion() {
        let verbose = prop("Verbose", DataType::Boolean);
        assert!(run(&[verbose.clone()], &[("Verbose", "TRUE")]).is_empty());
        assert_eq!(run(&[verbose], &[("Verbose", "yes")]).len(), 1);
    }

    #[test]
    fn test_enumeration_membership() {
        let level = prop(
            "Level",
            DataType::String(StringType::enumeration(
                "Level",
                vec![
                    EnumerationValue { name: "Low".into(), value: 0, hidden: false, description: None },
                    EnumerationValue { name: "Secret".into(), value: 5, hidden: true, description: None },
                    EnumerationValue { name: "High".into(), value: 10, hidden: false, description: None },
                ],
            )),
        );
        assert!(run(&[level.clone()], &[("Level", "high")]).is_empty());
        assert!(run(&[level.clone()], &[("Level", "5")]).is_empty());
        assert_eq!(
            run(&[level], &[("Level", "medium")]),
            vec!["'medium' is not a valid value for Level: expected one of Low, High"]
        );
    }

    #[test]
    fn test_custom_parser_and_validator() {
        let mut bind = prop(
            "Bind",
            DataType::String(StringType::parsed("ip_addr", ValueParser::of::<std::net::IpAddr>("ip_addr"))),
        );
        assert_eq!(run(&[bind.clone()], &[("Bind", "nope")]).len(), 1);

        bind.meta.validators.push(ValueParser::new("loopback", |text| {
            if text.starts_with("127.") {
                Ok(())
            } else {
                Err("must be a loopback address".to_string())
            }
        }));
        assert_eq!(
            run(&[bind], &[("Bind", "10.0.0.1")]),
            vec!["'10.0.0.1' is not a valid value for Bind: must be a loopback address"]
        );
    }

    #[test]
    fn test_rules() {
        let mut count = prop("Count", DataType::number(NumberKind::I32));
        count.meta.rules.push(Rule::Range { min: Some(1.0), max: Some(10.0) });
        assert_eq!(
            run(&[count], &[("Count", "11")]),
            vec!["The field Count must be between 1 and 10."]
        );

        let mut name = prop("Name", DataType::string());
        name.meta.rules.push(Rule::Length { min: Some(2), max: None });
        name.meta.rules.push(Rule::Pattern { pattern: "[a-z]+".to_string() });
        assert_eq!(
            run(&[name], &[("Name", "A")]),
            vec![
                "The field Name must have at least 2 characters.",
                "The field Name must match the regular expression '[a-z]+'.",
            ]
        );

        let mut loose = prop("Loose", DataType::Any);
        loose.meta.rules.push(Rule::Range { min: Some(0.0), max: None });
        assert!(run(&[loose.clone()], &[("Loose", "3")]).is_empty());
        assert_eq!(
            run(&[loose], &[("Loose", "many")]),
            vec!["The field Loose must be a number."]
        );

        let mut format = prop("Format", DataType::string());
        format.meta.rules.push(Rule::OneOf { values: vec!["json".into(), "text".into()] });
        assert!(run(&[format.clone()], &[("Format", "JSON")]).is_empty());
        assert_eq!(run(&[format], &[("Format", "xml")]).len(), 1);
    }

    #[test]
    fn test_list_length_counts_entries() {
        let mut files = prop("Files", DataType::array(DataType::string()));
        files.meta.rules.push(Rule::Length { min: None, max: Some(1) });
        assert_eq!(
            run(&[files], &[("Files:0", "abc"), ("Files:1", "d")]),
            vec!["The field Files must have at most 1 entries."]
        );
    }

    #[test]
    fn test_failures_accumulate() {
        let mut read = prop("Read", DataType::array(DataType::string()));
        read.meta.required = true;
        let offset = prop("Offset", DataType::number(NumberKind::I64));
        let items = prop("Items", DataType::array(DataType::number(NumberKind::U8)));

        let messages = run(
            &[read, offset, items],
            &[("Offset", "x"), ("Items:0", "1"), ("Items:1", "-1")],
        );
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "The Read field is required.");
        assert!(messages[2].contains("Items:1"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let regex = compile_pattern("[0-9]+").unwrap();
        assert!(regex.is_match("123"));
        assert!(!regex.is_match("12a"));
    }
}
