// src/weather.rs
//
// KMA village-forecast client for the Gunsan grid cell. Two endpoints: live
// observations (UltraSrtNcst) and the short-term forecast (VilageFcst), both
// keyed by a grid coordinate and a credential query parameter. A missing
// credential degrades to `Unconfigured`; upstream trouble to `Unavailable`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::feed::kst_offset;

/// Gunsan grid coordinates in the KMA LCC grid.
pub const GRID_NX: u32 = 63;
pub const GRID_NY: u32 = 126;

const DEFAULT_BASE_URL: &str = "http://apis.data.go.kr/1360000/VilageFcstInfoService_2.0";

/// Forecast publication hours (KST). A run becomes available ~15 minutes
/// past the hour.
const FORECAST_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationBase {
    pub base_date: String,
    pub base_time: String,
}

/// Base date/time for the live-observation endpoint: the current hour once
/// minute 45 has passed, the previous hour before that.
pub fn ultra_srt_base(now_kst: DateTime<FixedOffset>) -> ObservationBase {
    let t = if now_kst.minute() < 45 {
        now_kst - chrono::Duration::hours(1)
    } else {
        now_kst
    };
    ObservationBase {
        base_date: t.format("%Y%m%d").to_string(),
        base_time: format!("{:02}00", t.hour()),
    }
}

/// Base date/time for the forecast endpoint: the latest publication hour at
/// or before now (minus the 15-minute lag), rolling to 23:00 of the previous
/// day in the small hours.
pub fn vilage_base(now_kst: DateTime<FixedOffset>) -> ObservationBase {
    let mut hour = now_kst.hour() as i32;
    if now_kst.minute() < 15 {
        hour -= 1;
    }
    let mut date = now_kst.date_naive();
    let base_hour = match FORECAST_HOURS.iter().rev().find(|&&h| (h as i32) <= hour) {
        Some(&h) => h,
        None => {
            date = date.pred_opt().unwrap_or(date);
            23
        }
    };
    ObservationBase {
        base_date: date.format("%Y%m%d").to_string(),
        base_time: format!("{base_hour:02}00"),
    }
}

// ------------------------------------------------------------
// Report types
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentWeather {
    pub temp: f64,
    pub condition: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyForecast {
    pub day: String,
    pub date: String,
    pub high: f64,
    pub low: f64,
    pub condition: String,
    pub rain_probability: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherReport {
    pub current: CurrentWeather,
    pub forecast: Vec<DailyForecast>,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherOutcome {
    Ready { report: WeatherReport },
    Unconfigured,
    Unavailable { detail: String },
}

// ------------------------------------------------------------
// Upstream payload shape
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KmaEnvelope {
    response: KmaResponse,
}

#[derive(Debug, Deserialize)]
struct KmaResponse {
    body: Option<KmaBody>,
}

#[derive(Debug, Deserialize)]
struct KmaBody {
    items: KmaItems,
}

#[derive(Debug, Deserialize)]
struct KmaItems {
    #[serde(default)]
    item: Vec<KmaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KmaItem {
    pub category: String,
    #[serde(rename = "obsrValue", default)]
    pub obsr_value: Option<String>,
    #[serde(rename = "fcstValue", default)]
    pub fcst_value: Option<String>,
    #[serde(rename = "fcstDate", default)]
    pub fcst_date: Option<String>,
}

// ------------------------------------------------------------
// Mapping
// ------------------------------------------------------------

/// Precipitation-type code → condition label (UltraSrtNcst PTY).
pub fn condition_from_pty(code: &str) -> &'static str {
    match code {
        "1" | "5" => "비",
        "2" | "6" => "비/눈",
        "3" | "7" => "눈",
        _ => "맑음",
    }
}

fn parse_value(v: &Option<String>) -> Option<f64> {
    v.as_deref().and_then(|s| s.trim().parse::<f64>().ok())
}

pub fn fold_current(items: &[KmaItem]) -> CurrentWeather {
    let mut temp = 0.0;
    let mut humidity = 0.0;
    let mut wind_speed = 0.0;
    let mut rain_code = "0".to_string();
    for it in items {
        match it.category.as_str() {
            "T1H" => temp = parse_value(&it.obsr_value).unwrap_or(0.0),
            "REH" => humidity = parse_value(&it.obsr_value).unwrap_or(0.0),
            "WSD" => wind_speed = parse_value(&it.obsr_value).unwrap_or(0.0),
            "PTY" => {
                rain_code = it.obsr_value.clone().unwrap_or_else(|| "0".to_string());
            }
            _ => {}
        }
    }
    let condition = condition_from_pty(rain_code.trim()).to_string();
    CurrentWeather {
        temp,
        humidity,
        wind_speed,
        description: condition.clone(),
        condition,
    }
}

#[derive(Default)]
struct DayAcc {
    temps: Vec<f64>,
    high: Option<f64>,
    low: Option<f64>,
    sky: Vec<f64>,
    rain: bool,
    pop: Vec<i64>,
}

/// Fold forecast rows into at most three daily summaries, ordered by date.
pub fn fold_forecast(items: &[KmaItem]) -> Vec<DailyForecast> {
    let mut days: BTreeMap<String, DayAcc> = BTreeMap::new();
    for it in items {
        let Some(date) = it.fcst_date.clone() else {
            continue;
        };
        let acc = days.entry(date).or_default();
        let value = parse_value(&it.fcst_value);
        match it.category.as_str() {
            "TMP" => {
                if let Some(v) = value {
                    acc.temps.push(v);
                }
            }
            "TMX" => acc.high = value.or(acc.high),
            "TMN" => acc.low = value.or(acc.low),
            "SKY" => {
                if let Some(v) = value {
                    acc.sky.push(v);
                }
            }
            "PTY" => {
                if value.unwrap_or(0.0) > 0.0 {
                    acc.rain = true;
                }
            }
            "POP" => {
                if let Some(v) = value {
                    acc.pop.push(v as i64);
                }
            }
            _ => {}
        }
    }

    days.into_iter()
        .take(3)
        .map(|(date_str, acc)| {
            let high = acc
                .high
                .or_else(|| acc.temps.iter().cloned().fold(None, fold_max))
                .unwrap_or(0.0);
            let low = acc
                .low
                .or_else(|| acc.temps.iter().cloned().fold(None, fold_min))
                .unwrap_or(0.0);

            let condition = if acc.rain {
                "비"
            } else {
                let avg = if acc.sky.is_empty() {
                    0.0
                } else {
                    acc.sky.iter().sum::<f64>() / acc.sky.len() as f64
                };
                if avg > 3.5 {
                    "흐림"
                } else if avg > 2.5 {
                    "구름많음"
                } else {
                    "맑음"
                }
            };

            let (display_date, day) = display_date_and_day(&date_str);
            DailyForecast {
                day,
                date: display_date,
                high,
                low,
                condition: condition.to_string(),
                rain_probability: acc.pop.iter().copied().max().unwrap_or(0),
            }
        })
        .collect()
}

fn fold_max(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |a| a.max(v)))
}

fn fold_min(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |a| a.min(v)))
}

/// "20250610" → ("6.10", "화")
fn display_date_and_day(yyyymmdd: &str) -> (String, String) {
    let parsed = chrono::NaiveDate::parse_from_str(yyyymmdd, "%Y%m%d").ok();
    match parsed {
        Some(d) => (
            format!("{}.{}", d.month(), d.day()),
            short_korean_weekday(d.weekday()).to_string(),
        ),
        None => (yyyymmdd.to_string(), String::new()),
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

// ------------------------------------------------------------
// Service
// ------------------------------------------------------------

pub struct WeatherService {
    http: reqwest::Client,
    base_url: String,
    service_key: Option<String>,
}

impl WeatherService {
    pub fn new(service_key: Option<String>) -> Self {
        Self::with_base_url(service_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(service_key: Option<String>, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("gunsan-info-hub/0.1 (+github.com/gunsan-hub/gunsan-info-hub)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            service_key: service_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub async fn fetch(&self) -> WeatherOutcome {
        let Some(key) = self.service_key.clone() else {
            tracing::warn!("weather credential missing; serving unconfigured state");
            return WeatherOutcome::Unconfigured;
        };

        let now = Utc::now().with_timezone(&kst_offset());
        let ncst = ultra_srt_base(now);
        let fcst = vilage_base(now);

        let current_items = match self.get_items("getUltraSrtNcst", &key, &ncst, 10).await {
            Ok(items) => items,
            Err(detail) => return WeatherOutcome::Unavailable { detail },
        };
        let forecast_items = match self.get_items("getVilageFcst", &key, &fcst, 300).await {
            Ok(items) => items,
            Err(detail) => return WeatherOutcome::Unavailable { detail },
        };

        WeatherOutcome::Ready {
            report: WeatherReport {
                current: fold_current(&current_items),
                forecast: fold_forecast(&forecast_items),
                source_url: "https://www.weather.go.kr".to_string(),
            },
        }
    }

    async fn get_items(
        &self,
        path: &str,
        key: &str,
        base: &ObservationBase,
        rows: u32,
    ) -> Result<Vec<KmaItem>, String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("serviceKey", key),
                ("pageNo", "1"),
                ("numOfRows", &rows.to_string()),
                ("dataType", "JSON"),
                ("base_date", &base.base_date),
                ("base_time", &base.base_time),
                ("nx", &GRID_NX.to_string()),
                ("ny", &GRID_NY.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("weather transport: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("weather upstream status {}", resp.status()));
        }
        let envelope: KmaEnvelope = resp
            .json()
            .await
            .map_err(|e| format!("weather payload shape: {e}"))?;
        let body = envelope
            .response
            .body
            .ok_or_else(|| "weather response missing body".to_string())?;
        Ok(body.items.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        kst_offset()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("valid test time")
    }

    #[test]
    fn observation_base_uses_previous_hour_before_minute_45() {
        let b = ultra_srt_base(kst(2025, 6, 10, 14, 30));
        assert_eq!(b.base_time, "1300");
        assert_eq!(b.base_date, "20250610");

        let b = ultra_srt_base(kst(2025, 6, 10, 14, 45));
        assert_eq!(b.base_time, "1400");
    }

    #[test]
    fn observation_base_rolls_over_midnight() {
        let b = ultra_srt_base(kst(2025, 6, 10, 0, 10));
        assert_eq!(b.base_date, "20250609");
        assert_eq!(b.base_time, "2300");
    }

    #[test]
    fn forecast_base_picks_latest_published_run() {
        let b = vilage_base(kst(2025, 6, 10, 14, 20));
        assert_eq!(b.base_time, "1400");

        // Before the publication lag the 14:00 run is not out yet.
        let b = vilage_base(kst(2025, 6, 10, 14, 10));
        assert_eq!(b.base_time, "1100");

        // Small hours roll back to yesterday's 23:00 run.
        let b = vilage_base(kst(2025, 6, 10, 1, 30));
        assert_eq!(b.base_date, "20250609");
        assert_eq!(b.base_time, "2300");
    }

    fn obs(category: &str, value: &str) -> KmaItem {
        KmaItem {
            category: category.to_string(),
            obsr_value: Some(value.to_string()),
            fcst_value: None,
            fcst_date: None,
        }
    }

    fn fc(category: &str, date: &str, value: &str) -> KmaItem {
        KmaItem {
            category: category.to_string(),
            obsr_value: None,
            fcst_value: Some(value.to_string()),
            fcst_date: Some(date.to_string()),
        }
    }

    #[test]
    fn current_conditions_follow_precipitation_code() {
        let current = fold_current(&[
            obs("T1H", "23.5"),
            obs("REH", "60"),
            obs("WSD", "3.2"),
            obs("PTY", "1"),
        ]);
        assert_eq!(current.temp, 23.5);
        assert_eq!(current.condition, "비");

        assert_eq!(condition_from_pty("0"), "맑음");
        assert_eq!(condition_from_pty("6"), "비/눈");
        assert_eq!(condition_from_pty("7"), "눈");
    }

    #[test]
    fn forecast_folds_per_day_and_caps_at_three() {
        let mut items = Vec::new();
        for (i, date) in ["20250610", "20250611", "20250612", "20250613"]
            .iter()
            .enumerate()
        {
            items.push(fc("TMP", date, "20"));
            items.push(fc("TMP", date, "26"));
            items.push(fc("SKY", date, if i == 1 { "4" } else { "1" }));
            items.push(fc("PTY", date, if i == 2 { "1" } else { "0" }));
            items.push(fc("POP", date, "30"));
            items.push(fc("POP", date, "60"));
        }
        items.push(fc("TMX", "20250610", "27.0"));
        items.push(fc("TMN", "20250610", "18.0"));

        let days = fold_forecast(&items);
        assert_eq!(days.len(), 3);

        // Explicit TMX/TMN win over the TMP extremes.
        assert_eq!(days[0].high, 27.0);
        assert_eq!(days[0].low, 18.0);
        assert_eq!(days[0].condition, "맑음");
        assert_eq!(days[0].rain_probability, 60);
        assert_eq!(days[0].date, "6.10");
        assert_eq!(days[0].day, "화");

        // Overcast sky without rain.
        assert_eq!(days[1].condition, "흐림");
        assert_eq!(days[1].high, 26.0);

        // Any precipitation code wins over sky cover.
        assert_eq!(days[2].condition, "비");
    }
}
