//! Flattening of `/system/health` readings

use crate::record::Record;

/// Fold `{name, value}` health entries into a single `name -> value` record.
///
/// A typical listing is
/// `.id=*d;name=voltage;type=V;value=27.3;.id=*e;name=temperature;type=C;value=55;`
/// which reduces to `{voltage: 27.3, temperature: 55}`. Entries without a
/// name are skipped; a repeated name keeps the last value.
pub fn reduce_health(entries: Vec<Record>) -> Record {
    let mut flat = Record::new();
    for entry in &entries {
        let Some(name) = entry.get("name").to_text() else {
            continue;
        };
        flat.insert(name, entry.get("value").clone());
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::split_section;
    use crate::value::CoercedValue;

    #[test]
    fn test_reduce_health_listing() {
        let entries = split_section(
            ".id=*d;name=voltage;type=V;value=27.3;.id=*e;name=temperature;type=C;value=55;",
        );
        let health = reduce_health(entries);
        assert_eq!(health.len(), 2);
        assert_eq!(health.get("voltage"), &CoercedValue::Number(27.3));
        assert_eq!(health.get("temperature"), &CoercedValue::Number(55.0));
    }

    #[test]
    fn test_later_entries_overwrite() {
        let entries = vec![
            Record::tokenize("name=temperature;value=40;"),
            Record::tokenize("name=temperature;value=41;"),
        ];
        assert_eq!(
            reduce_health(entries).get("temperature"),
            &CoercedValue::Number(41.0)
        );
    }

    #[test]
    fn test_entries_without_name_skipped() {
        let entries = vec![
            Record::tokenize("value=12;"),
            Record::tokenize("name=;value=13;"),
            Record::tokenize("name=fan1-speed;value=3000;"),
        ];
        let health = reduce_health(entries);
        assert_eq!(health.len(), 1);
        assert_eq!(health.get("fan1-speed"), &CoercedValue::Number(3000.0));
    }

    #[test]
    fn test_missing_value_is_absent() {
        let health = reduce_health(vec![Record::tokenize("name=psu1-state;")]);
        assert!(health.contains("psu1-state"));
        assert!(health.get("psu1-state").is_absent());
    }
}
