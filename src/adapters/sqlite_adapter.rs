//! SQLite adapter for prices, policy rates and position state.
//!
//! Tables:
//! - `daily_ohlcv(ticker, date, open, high, low, close, volume)`
//! - `policy_rate(date, value)`
//! - `positions(ticker PRIMARY KEY, position)`

use crate::domain::error::RegimeError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::Position;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::macro_port::{MacroPort, RatePoint};
use crate::ports::state_port::StatePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn pool_error(e: r2d2::Error) -> RegimeError {
    RegimeError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> RegimeError {
    RegimeError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(date_str: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            date_str.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RegimeError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| RegimeError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::debug!(path = %db_path, pool_size, "sqlite pool ready");
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, RegimeError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, RegimeError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), RegimeError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS daily_ohlcv (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL,
                    high REAL,
                    low REAL,
                    close REAL,
                    volume REAL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE TABLE IF NOT EXISTS policy_rate (
                    date TEXT PRIMARY KEY,
                    value REAL NOT NULL
                );
                CREATE TABLE IF NOT EXISTS positions (
                    ticker TEXT PRIMARY KEY,
                    position TEXT NOT NULL
                );",
            )
            .map_err(query_error)
    }

    pub fn insert_bars(&self, ticker: &str, bars: &[OhlcvBar]) -> Result<(), RegimeError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO daily_ohlcv (ticker, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ticker,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }

    pub fn insert_rates(&self, rates: &[RatePoint]) -> Result<(), RegimeError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for rate in rates {
            tx.execute(
                "INSERT OR REPLACE INTO policy_rate (date, value) VALUES (?1, ?2)",
                params![rate.date.format(DATE_FORMAT).to_string(), rate.value],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_daily_ohlcv(&self, ticker: &str) -> Result<Vec<OhlcvBar>, RegimeError> {
        let conn = self.conn()?;

        let query = "SELECT date, open, high, low, close, volume
                     FROM daily_ohlcv
                     WHERE ticker = ?1
                     ORDER BY date ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![ticker], |row| {
                let date_str: String = row.get(0)?;
                let value = |i: usize| -> rusqlite::Result<f64> {
                    Ok(row.get::<_, Option<f64>>(i)?.unwrap_or(f64::NAN))
                };
                Ok(OhlcvBar {
                    date: parse_date(&date_str)?,
                    open: value(1)?,
                    high: value(2)?,
                    low: value(3)?,
                    close: value(4)?,
                    volume: value(5)?,
                })
            })
            .map_err(query_error)?;

        let bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?;
        if bars.is_empty() {
            return Err(RegimeError::NoData {
                ticker: ticker.to_string(),
            });
        }
        Ok(bars)
    }
}

impl MacroPort for SqliteAdapter {
    fn fetch_policy_rate(&self) -> Result<Vec<RatePoint>, RegimeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT date, value FROM policy_rate ORDER BY date ASC")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| {
                let date_str: String = row.get(0)?;
                Ok(RatePoint {
                    date: parse_date(&date_str)?,
                    value: row.get(1)?,
                })
            })
            .map_err(query_error)?;

        let points = rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?;
        if points.is_empty() {
            return Err(RegimeError::NoData {
                ticker: "policy_rate".to_string(),
            });
        }
        Ok(points)
    }
}

impl StatePort for SqliteAdapter {
    fn load(&self) -> Result<BTreeMap<String, String>, RegimeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT ticker, position FROM positions")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(query_error)?;

        rows.collect::<Result<BTreeMap<String, String>, _>>()
            .map_err(query_error)
    }

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), RegimeError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute("DELETE FROM positions", []).map_err(query_error)?;
        for (ticker, position) in positions {
            tx.execute(
                "INSERT INTO positions (ticker, position) VALUES (?1, ?2)",
                params![ticker, position.as_str()],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        tracing::info!(positions = positions.len(), "state saved to sqlite");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn bars_come_back_sorted() {
        let adapter = setup();
        adapter
            .insert_bars("BHP", &[bar(17, 3.0), bar(15, 1.0), bar(16, 2.0)])
            .unwrap();
        adapter.insert_bars("CBA", &[bar(15, 9.0)]).unwrap();

        let bars = adapter.fetch_daily_ohlcv("BHP").unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert_eq!(bars[0].open, 0.0);
    }

    #[test]
    fn null_prices_become_nan() {
        let adapter = setup();
        adapter
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO daily_ohlcv (ticker, date, open, high, low, close, volume)
                 VALUES ('X', '2024-01-02', NULL, 2.0, 1.0, 1.5, NULL)",
                [],
            )
            .unwrap();
        let bars = adapter.fetch_daily_ohlcv("X").unwrap();
        assert!(bars[0].open.is_nan());
        assert!(bars[0].volume.is_nan());
        assert_eq!(bars[0].close, 1.5);
    }

    #[test]
    fn unknown_ticker_is_no_data() {
        let adapter = setup();
        assert!(matches!(
            adapter.fetch_daily_ohlcv("NOPE"),
            Err(RegimeError::NoData { .. })
        ));
    }

    #[test]
    fn rates_round_trip() {
        let adapter = setup();
        assert!(adapter.fetch_policy_rate().is_err());

        let rates = vec![
            RatePoint {
                date: NaiveDate::from_ymd_opt(2024, 9, 19).unwrap(),
                value: 5.0,
            },
            RatePoint {
                date: NaiveDate::from_ymd_opt(2024, 9, 17).unwrap(),
                value: 5.5,
            },
        ];
        adapter.insert_rates(&rates).unwrap();

        let loaded = adapter.fetch_policy_rate().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].value, 5.5);
        assert_eq!(loaded[1].value, 5.0);
    }

    #[test]
    fn state_save_replaces_previous() {
        let adapter = setup();
        assert!(adapter.load().unwrap().is_empty());

        let first = BTreeMap::from([
            ("AAA".to_string(), Position::In),
            ("BBB".to_string(), Position::In),
        ]);
        adapter.save(&first).unwrap();

        let second = BTreeMap::from([("AAA".to_string(), Position::Out)]);
        adapter.save(&second).unwrap();

        let loaded = adapter.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["AAA"], "OUT");
    }
}
