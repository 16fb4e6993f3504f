use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tillscan_config::StoreConfig;

use crate::regions::Regions;

fn re_datetime_ampm() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(\d{2})/(\d{2})/(\d{2,4})\s+(\d{1,2}):(\d{2}):(\d{2})\s*([AP]M)")
            .expect("invalid regex")
    })
}

fn re_datetime_24h() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)DATE:\s*(\d{2})/(\d{2})/(\d{4})\s+TIME:\s*(\d{2}):(\d{2}):(\d{2})")
            .expect("invalid regex")
    })
}

fn re_phone() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\(?\d{3}\)?[\s\-]\d{3}[\s\-]\d{4}").expect("invalid regex"))
}

fn re_url() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)(https?://|www\.)\S+").expect("invalid regex"))
}

/// Recover the merchant display name and the purchase timestamp from the
/// header region. Both are best-effort; absence is not an error.
pub fn extract_header_metadata(
    regions: &Regions,
    config: &StoreConfig,
) -> (Option<String>, Option<NaiveDateTime>) {
    (find_store_name(regions, config), find_purchase_time(regions))
}

fn find_store_name(regions: &Regions, config: &StoreConfig) -> Option<String> {
    if config.identification.primary_name.is_some() {
        for row in &regions.header {
            if config.identification.matches(&row.text) {
                return config.identification.primary_name.clone();
            }
        }
    }

    // No chain match: pick the most name-looking header line. All-caps
    // store banners outrank addresses and slogans.
    regions
        .header
        .iter()
        .map(|r| r.text.trim())
        .filter(|t| t.len() >= 3 && t.len() <= 50)
        .filter(|t| !t.starts_with(|c: char| c.is_ascii_digit()))
        .filter(|t| !re_phone().is_match(t) && !re_url().is_match(t))
        .filter(|t| !re_datetime_ampm().is_match(t) && !re_datetime_24h().is_match(t))
        .max_by_key(|t| {
            let all_caps = t.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
            (if all_caps { 2i32 } else { 0 }) + (t.len() as i32).min(20)
        })
        .map(String::from)
}

fn find_purchase_time(regions: &Regions) -> Option<NaiveDateTime> {
    regions
        .header
        .iter()
        .find_map(|row| parse_ampm(&row.text).or_else(|| parse_24h(&row.text)))
}

fn parse_ampm(text: &str) -> Option<NaiveDateTime> {
    let c = re_datetime_ampm().captures(text)?;
    let month: u32 = c.get(1)?.as_str().parse().ok()?;
    let day: u32 = c.get(2)?.as_str().parse().ok()?;
    let year = expand_year(c.get(3)?.as_str().parse().ok()?);
    let mut hour: u32 = c.get(4)?.as_str().parse().ok()?;
    let minute: u32 = c.get(5)?.as_str().parse().ok()?;
    let second: u32 = c.get(6)?.as_str().parse().ok()?;
    match c.get(7)?.as_str() {
        "PM" if hour != 12 => hour += 12,
        "AM" if hour == 12 => hour = 0,
        _ => {}
    }
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn parse_24h(text: &str) -> Option<NaiveDateTime> {
    let c = re_datetime_24h().captures(text)?;
    let month: u32 = c.get(1)?.as_str().parse().ok()?;
    let day: u32 = c.get(2)?.as_str().parse().ok()?;
    let year: i32 = c.get(3)?.as_str().parse().ok()?;
    let hour: u32 = c.get(4)?.as_str().parse().ok()?;
    let minute: u32 = c.get(5)?.as_str().parse().ok()?;
    let second: u32 = c.get(6)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 {
        2000 + y
    } else {
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillscan_core::{Fragment, PhysicalRow, RowType};

    fn header_row(id: usize, text: &str, y: f64) -> PhysicalRow {
        PhysicalRow {
            id,
            fragments: vec![Fragment::new(id, text, 0.3, y)],
            y_top: y,
            y_bottom: y,
            center_y: y,
            text: text.to_string(),
            row_type: RowType::Header,
        }
    }

    fn regions_with_header(texts: &[&str]) -> Regions {
        Regions {
            header: texts
                .iter()
                .enumerate()
                .map(|(i, t)| header_row(i, t, 0.05 + i as f64 * 0.03))
                .collect(),
            ..Regions::default()
        }
    }

    #[test]
    fn identification_match_wins() {
        let mut cfg = StoreConfig::default();
        cfg.identification.primary_name = Some("T&T Supermarket US".to_string());
        cfg.identification.aliases = vec!["T AND T".to_string()];
        let regions = regions_with_header(&["Welcome to T&T SUPERMARKET US", "123 Pine St"]);
        let (store, _) = extract_header_metadata(&regions, &cfg);
        assert_eq!(store.as_deref(), Some("T&T Supermarket US"));
    }

    #[test]
    fn all_caps_banner_beats_address() {
        let regions = regions_with_header(&["123 Main Street", "ISLAND GOURMET MARKETS", "(555) 123-4567"]);
        let (store, _) = extract_header_metadata(&regions, &StoreConfig::default());
        assert_eq!(store.as_deref(), Some("ISLAND GOURMET MARKETS"));
    }

    #[test]
    fn ampm_timestamp_with_two_digit_year() {
        let regions = regions_with_header(&["STORE", "01/10/26 1:45:58 PM MeiChen"]);
        let (_, time) = extract_header_metadata(&regions, &StoreConfig::default());
        let expected = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(13, 45, 58)
            .unwrap();
        assert_eq!(time, Some(expected));
    }

    #[test]
    fn midnight_twelve_am_is_hour_zero() {
        let regions = regions_with_header(&["02/03/26 12:05:00 AM"]);
        let (_, time) = extract_header_metadata(&regions, &StoreConfig::default());
        assert_eq!(
            time,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap().and_hms_opt(0, 5, 0)
        );
    }

    #[test]
    fn twenty_four_hour_format_parses() {
        let regions = regions_with_header(&["DATE: 01/10/2026 TIME: 14:47:15"]);
        let (_, time) = extract_header_metadata(&regions, &StoreConfig::default());
        assert_eq!(
            time,
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap().and_hms_opt(14, 47, 15)
        );
    }

    #[test]
    fn no_header_yields_nothing() {
        let regions = Regions::default();
        let (store, time) = extract_header_metadata(&regions, &StoreConfig::default());
        assert!(store.is_none());
        assert!(time.is_none());
    }
}
