// src/tide.rs
//
// KHOA tide-table client for the Gunsan station. One request per KST day,
// three days ahead; rows decode into typed high/low entries. Credential and
// failure handling mirror the weather client.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::feed::kst_offset;

/// Gunsan tide observation station.
pub const STATION_CODE: &str = "DT_0018";

const DEFAULT_BASE_URL: &str = "http://www.khoa.go.kr/api/oceangrid/tideObsPreTab/search.do";

pub const FORECAST_DAYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TideKind {
    High,
    Low,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TideEntry {
    /// "HH:MM" local time.
    pub time: String,
    #[serde(rename = "type")]
    pub kind: TideKind,
    /// Water level in centimeters.
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TideDay {
    /// "M.D" display date.
    pub date: String,
    /// Korean weekday, e.g. "화".
    pub day: String,
    pub tides: Vec<TideEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TideOutcome {
    Ready { days: Vec<TideDay> },
    Unconfigured,
    Unavailable { detail: String },
}

#[derive(Debug, Deserialize)]
struct KhoaEnvelope {
    result: Option<KhoaResult>,
}

#[derive(Debug, Deserialize)]
struct KhoaResult {
    #[serde(default)]
    data: Vec<KhoaRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KhoaRow {
    /// "2025-06-10 04:30:00"
    pub tph_time: Option<String>,
    /// Level in cm, serialized as a string.
    pub tph_level: Option<String>,
    /// "고조" for high water, anything else is low.
    pub hl_code: Option<String>,
}

/// Decode one upstream row; rows without a time or level are dropped.
pub fn row_to_entry(row: &KhoaRow) -> Option<TideEntry> {
    let time = row
        .tph_time
        .as_deref()?
        .split_whitespace()
        .nth(1)?
        .get(0..5)?
        .to_string();
    let height = row.tph_level.as_deref()?.trim().parse::<f64>().ok()?;
    let kind = if row.hl_code.as_deref() == Some("고조") {
        TideKind::High
    } else {
        TideKind::Low
    };
    Some(TideEntry { time, kind, height })
}

fn display_day(date: NaiveDate) -> TideDay {
    TideDay {
        date: format!("{}.{}", date.month(), date.day()),
        day: short_korean_weekday(date.weekday()).to_string(),
        tides: Vec::new(),
    }
}

fn short_korean_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "월",
        Weekday::Tue => "화",
        Weekday::Wed => "수",
        Weekday::Thu => "목",
        Weekday::Fri => "금",
        Weekday::Sat => "토",
        Weekday::Sun => "일",
    }
}

pub struct TideService {
    http: reqwest::Client,
    base_url: String,
    station_code: String,
    service_key: Option<String>,
}

impl TideService {
    pub fn new(service_key: Option<String>, station_code: String) -> Self {
        Self::with_base_url(service_key, station_code, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        service_key: Option<String>,
        station_code: String,
        base_url: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("gunsan-info-hub/0.1 (+github.com/gunsan-hub/gunsan-info-hub)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            station_code,
            service_key: service_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub async fn fetch(&self) -> TideOutcome {
        let Some(key) = self.service_key.clone() else {
            tracing::warn!("tide credential missing; serving unconfigured state");
            return TideOutcome::Unconfigured;
        };

        let today = Utc::now().with_timezone(&kst_offset()).date_naive();
        let mut days = Vec::with_capacity(FORECAST_DAYS);
        for offset in 0..FORECAST_DAYS {
            let date = today + chrono::Duration::days(offset as i64);
            match self.fetch_day(&key, date).await {
                Ok(day) => days.push(day),
                Err(detail) => return TideOutcome::Unavailable { detail },
            }
        }
        TideOutcome::Ready { days }
    }

    async fn fetch_day(&self, key: &str, date: NaiveDate) -> Result<TideDay, String> {
        let date_param = date.format("%Y%m%d").to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("ServiceKey", key),
                ("ObsCode", &self.station_code),
                ("Date", &date_param),
                ("ResultType", "json"),
            ])
            .send()
            .await
            .map_err(|e| format!("tide transport: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("tide upstream status {}", resp.status()));
        }
        let envelope: KhoaEnvelope = resp
            .json()
            .await
            .map_err(|e| format!("tide payload shape: {e}"))?;

        // A day with no table is served empty rather than failing the set.
        let mut day = display_day(date);
        if let Some(result) = envelope.result {
            day.tides = result.data.iter().filter_map(row_to_entry).collect();
        }
        Ok(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_decode_into_typed_entries() {
        let row = KhoaRow {
            tph_time: Some("2025-06-10 04:30:00".into()),
            tph_level: Some("612".into()),
            hl_code: Some("고조".into()),
        };
        let entry = row_to_entry(&row).unwrap();
        assert_eq!(entry.time, "04:30");
        assert_eq!(entry.kind, TideKind::High);
        assert_eq!(entry.height, 612.0);

        let low = KhoaRow {
            hl_code: Some("저조".into()),
            ..row.clone()
        };
        assert_eq!(row_to_entry(&low).unwrap().kind, TideKind::Low);
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let row = KhoaRow {
            tph_time: None,
            tph_level: Some("100".into()),
            hl_code: Some("고조".into()),
        };
        assert!(row_to_entry(&row).is_none());

        let bad_level = KhoaRow {
            tph_time: Some("2025-06-10 04:30:00".into()),
            tph_level: Some("n/a".into()),
            hl_code: None,
        };
        assert!(row_to_entry(&bad_level).is_none());
    }

    #[test]
    fn day_labels_use_korean_weekdays() {
        let day = display_day(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_eq!(day.date, "6.10");
        assert_eq!(day.day, "화");
    }
}
