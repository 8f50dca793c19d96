// src/view.rs
//
// Text the user sees, plus the `?patente=` round trip of the page URL.

use chrono::{DateTime, FixedOffset, Utc};
use url::Url;

use crate::lookup::BalanceRecord;
use crate::number::format_locale_number;

/// Query parameters that carry the key, preferred first.
const KEY_PARAMS: &[&str] = &["patente", "key"];

/// Uppercase and drop all whitespace, as typed into the plate field.
pub fn sanitize_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Key from `?patente=` (or `?key=`), uppercased. Empty values count as absent.
pub fn key_from_url(url: &Url) -> Option<String> {
    KEY_PARAMS.iter().find_map(|name| {
        url.query_pairs()
            .find(|(k, _)| &**k == *name)
            .map(|(_, v)| v.trim().to_uppercase())
            .filter(|v| !v.is_empty())
    })
}

/// `url` with `patente=<key>` set, other parameters kept. An empty key
/// removes the key parameters instead.
pub fn url_with_key(url: &Url, key: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !KEY_PARAMS.contains(&&**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = url.clone();
    out.set_query(None);
    let key = key.trim();
    if kept.is_empty() && key.is_empty() {
        return out;
    }
    {
        let mut pairs = out.query_pairs_mut();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        if !key.is_empty() {
            pairs.append_pair("patente", &key.to_uppercase());
        }
    }
    out
}

pub fn result_title(key: &str) -> String {
    format!("Saldo de la patente: {}", key)
}

pub fn not_found_message(key: &str) -> String {
    format!(
        "No encontramos registros para la patente “{}”. Verificá que esté sin espacios y tal como figura en tu vehículo.",
        key
    )
}

/// Argentina does not observe DST; UTC-3 all year.
fn argentina() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).expect("UTC-3 is a valid offset")
}

/// `*Última actualización: 21/10/2015 04:28`
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    let local = dt.with_timezone(&argentina());
    format!("*Última actualización: {}", local.format("%d/%m/%Y %H:%M"))
}

/// Title, balance and optional timestamp, one per line.
pub fn render_record(key: &str, rec: &BalanceRecord, modified: Option<&DateTime<Utc>>) -> String {
    let mut out = format!("{}\n{}", result_title(key), format_locale_number(rec.balance));
    if let Some(dt) = modified {
        out.push('\n');
        out.push_str(&format_timestamp(dt));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Tier;
    use chrono::TimeZone;

    fn page(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input(" ab 123\tcd "), "AB123CD");
        assert_eq!(sanitize_input(""), "");
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url(&page("https://x.test/?patente=ab123cd")).as_deref(),
            Some("AB123CD")
        );
        assert_eq!(
            key_from_url(&page("https://x.test/?key=%20xyz9&patente=")).as_deref(),
            Some("XYZ9")
        );
        assert_eq!(key_from_url(&page("https://x.test/?other=1")), None);
    }

    #[test]
    fn test_url_with_key() {
        let url = url_with_key(&page("https://x.test/saldo?lang=es&patente=OLD"), "ab1");
        assert_eq!(url.as_str(), "https://x.test/saldo?lang=es&patente=AB1");

        let cleared = url_with_key(&page("https://x.test/saldo?patente=OLD"), "");
        assert_eq!(cleared.as_str(), "https://x.test/saldo");
    }

    #[test]
    fn test_format_timestamp_in_argentina() {
        let dt = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "*Última actualización: 21/10/2015 04:28");

        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 1, 5, 0).unwrap();
        assert_eq!(format_timestamp(&midnight), "*Última actualización: 31/12/2023 22:05");
    }

    #[test]
    fn test_render_record() {
        let rec = BalanceRecord {
            customer_label: "ABC123".into(),
            balance: 1234.5,
            tier: Tier::FullQuery,
        };
        assert_eq!(
            render_record("ABC123", &rec, None),
            "Saldo de la patente: ABC123\n1.234,5"
        );
        assert!(not_found_message("ZZ1").contains("“ZZ1”"));
    }
}
