//! File-backed position state.
//!
//! CSV (`Ticker,Position`, sorted by ticker) or a JSON object of
//! ticker -> `"IN"`/`"OUT"`. A missing file loads as an empty map; saves
//! replace the whole file atomically.

use crate::adapters::atomic_file::write_atomic;
use crate::adapters::csv_adapter::column_index;
use crate::domain::error::RegimeError;
use crate::domain::position::Position;
use crate::ports::state_port::StatePort;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCodec {
    Csv,
    Json,
}

impl StateCodec {
    pub fn name(&self) -> &'static str {
        match self {
            StateCodec::Csv => "csv",
            StateCodec::Json => "json",
        }
    }

    fn codec_error(&self, reason: impl ToString) -> RegimeError {
        RegimeError::Codec {
            format: format!("{} state", self.name()),
            reason: reason.to_string(),
        }
    }

    pub fn encode(&self, positions: &BTreeMap<String, Position>) -> Result<String, RegimeError> {
        match self {
            StateCodec::Json => {
                serde_json::to_string_pretty(positions).map_err(|e| self.codec_error(e))
            }
            StateCodec::Csv => {
                let mut wtr = csv::Writer::from_writer(Vec::new());
                wtr.write_record(["Ticker", "Position"])
                    .map_err(|e| self.codec_error(e))?;
                for (ticker, position) in positions {
                    wtr.write_record([ticker.as_str(), position.as_str()])
                        .map_err(|e| self.codec_error(e))?;
                }
                let bytes = wtr.into_inner().map_err(|e| self.codec_error(e))?;
                String::from_utf8(bytes).map_err(|e| self.codec_error(e))
            }
        }
    }

    /// Raw values are returned unvalidated.
    pub fn decode(&self, text: &str) -> Result<BTreeMap<String, String>, RegimeError> {
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match self {
            StateCodec::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| self.codec_error(e))?;
                let object = value
                    .as_object()
                    .ok_or_else(|| self.codec_error("expected an object of ticker to position"))?;
                Ok(object
                    .iter()
                    .map(|(ticker, v)| {
                        let raw = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                        (ticker.clone(), raw)
                    })
                    .collect())
            }
            StateCodec::Csv => {
                let mut rdr = csv::Reader::from_reader(text.as_bytes());
                let headers = rdr.headers().map_err(|e| self.codec_error(e))?.clone();
                let ticker_col = column_index(&headers, "ticker")
                    .ok_or_else(|| self.codec_error("missing Ticker column"))?;
                let position_col = column_index(&headers, "position")
                    .ok_or_else(|| self.codec_error("missing Position column"))?;

                let mut map = BTreeMap::new();
                for result in rdr.records() {
                    let record = result.map_err(|e| self.codec_error(e))?;
                    let ticker = record.get(ticker_col).unwrap_or_default();
                    let position = record.get(position_col).unwrap_or_default();
                    map.insert(ticker.to_string(), position.to_string());
                }
                Ok(map)
            }
        }
    }
}

pub struct FileStateStore {
    path: PathBuf,
    codec: StateCodec,
}

impl FileStateStore {
    pub fn new(path: PathBuf, codec: StateCodec) -> Self {
        Self { path, codec }
    }
}

impl StatePort for FileStateStore {
    fn load(&self) -> Result<BTreeMap<String, String>, RegimeError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => self.codec.decode(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no stored state, starting empty");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), RegimeError> {
        write_atomic(&self.path, &self.codec.encode(positions)?)?;
        tracing::info!(path = %self.path.display(), positions = positions.len(), "state saved");
        Ok(())
    }
}
