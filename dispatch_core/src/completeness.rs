// dispatch_core/src/completeness.rs

//! Decides from a source file name alone whether its data is already in the store.
//! Names embed either a date (`..._YYYYMMDD.zip`) or an interval timestamp
//! (`..._YYYYMMDDHHMM....zip`); anything else is always ingested.

use crate::store;

static STAMP_PATTERN: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(?i)_([0-9_]+)\.zip").expect("static pattern is valid")
});

/// What a source file name says about the data it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStamp {
    Date(chrono::NaiveDate),
    Interval(chrono::NaiveDateTime),
    Unknown,
}

/// Extracts the date or interval encoded in `name`.
pub fn parse_source_stamp(name: &str) -> SourceStamp {
    let Some(captures) = STAMP_PATTERN.captures(name) else {
        return SourceStamp::Unknown;
    };
    let digits = &captures[1];

    if digits.len() == 8 {
        return chrono::NaiveDate::parse_from_str(digits, "%Y%m%d")
            .map(SourceStamp::Date)
            .unwrap_or(SourceStamp::Unknown);
    }
    if digits.len() >= 12 {
        return chrono::NaiveDateTime::parse_from_str(&digits[..12], "%Y%m%d%H%M")
            .map(SourceStamp::Interval)
            .unwrap_or(SourceStamp::Unknown);
    }
    SourceStamp::Unknown
}

/// True if the store already holds everything the named source file would provide.
pub fn is_source_complete(store: &store::DispatchStore, name: &str) -> bool {
    match parse_source_stamp(name) {
        SourceStamp::Date(date) => store.has_day_data(date),
        SourceStamp::Interval(timestamp) => store.has_slot_data(timestamp),
        SourceStamp::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_names_carry_a_date() {
        assert_eq!(
            parse_source_stamp("PUBLIC_DISPATCHSCADA_20140101.zip"),
            SourceStamp::Date(date(2014, 1, 1)),
        );
        assert_eq!(
            parse_source_stamp("archive/PUBLIC_DISPATCHSCADA_20140215.ZIP"),
            SourceStamp::Date(date(2014, 2, 15)),
        );
    }

    #[test]
    fn interval_names_carry_a_timestamp() {
        assert_eq!(
            parse_source_stamp("PUBLIC_DISPATCHSCADA_201401010005_0000000254372891.zip"),
            SourceStamp::Interval(date(2014, 1, 1).and_hms_opt(0, 5, 0).unwrap()),
        );
        assert_eq!(
            parse_source_stamp("PUBLIC_DISPATCHSCADA_201401011330.zip"),
            SourceStamp::Interval(date(2014, 1, 1).and_hms_opt(13, 30, 0).unwrap()),
        );
    }

    #[test]
    fn other_names_are_unknown() {
        for name in [
            "PUBLIC_DISPATCHSCADA.zip",
            "PUBLIC_DISPATCHSCADA_2014010.zip",
            "PUBLIC_DISPATCHSCADA_201401011.zip",
            "PUBLIC_DISPATCHSCADA_20141340.zip",
            "PUBLIC_DISPATCHSCADA_20140101.csv",
            "notes.txt",
        ] {
            assert_eq!(parse_source_stamp(name), SourceStamp::Unknown, "{}", name);
        }
    }

    #[test]
    fn oracle_consults_slot_and_day_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store::DispatchStore::open(
            dir.path().join("dispatch.cdf"),
            crate::settings::DayCompleteness::Aligned,
        ).unwrap();
        let start = date(2014, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let values = std::collections::BTreeMap::new();
        for i in 0..crate::grid::SLOTS_PER_DAY as i64 {
            store.write_row(start + chrono::TimeDelta::minutes(5 * i), &values).unwrap();
        }
        store.write_row(start + chrono::TimeDelta::minutes(5 * 289), &values).unwrap();

        assert!(is_source_complete(&store, "PUBLIC_DISPATCHSCADA_20140101.zip"));
        assert!(!is_source_complete(&store, "PUBLIC_DISPATCHSCADA_20140102.zip"));
        assert!(is_source_complete(&store, "PUBLIC_DISPATCHSCADA_201401020005_000.zip"));
        assert!(!is_source_complete(&store, "PUBLIC_DISPATCHSCADA_201401020000_000.zip"));
        assert!(!is_source_complete(&store, "PUBLIC_DISPATCHSCADA_201401030000_000.zip"));
        assert!(!is_source_complete(&store, "whatever.zip"));
    }
}
