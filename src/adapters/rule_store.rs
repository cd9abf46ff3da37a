//! Rule document codec.
//!
//! Current document: `{schema_version: 1, rules: [TickerRule...]}` in JSON or
//! TOML. Decoding goes through a permissive raw layer so documents written by
//! older tooling (no `schema_version`, `"3M"` timeframe labels, plain-string
//! signals, singular `gate`/`confirm` keys, `"kind:1M"` confirm strings,
//! `raw_text`/`raw_result` annotations) migrate into the current shape.

use crate::adapters::atomic_file::write_atomic;
use crate::domain::error::RegimeError;
use crate::domain::rule::{
    ConfirmKind, ConfirmSpec, Direction, GateName, RuleSide, SignalKind, SignalSpec, TickerRule,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Toml,
}

impl RuleFormat {
    pub fn from_name(name: &str) -> Result<Self, RegimeError> {
        match name.trim().to_lowercase().as_str() {
            "json" => Ok(RuleFormat::Json),
            "toml" => Ok(RuleFormat::Toml),
            other => Err(RegimeError::ConfigInvalid {
                section: "rules".to_string(),
                key: "format".to_string(),
                reason: format!("unknown rule format '{}'", other),
            }),
        }
    }

    /// Guess from a file extension; anything other than `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => RuleFormat::Toml,
            _ => RuleFormat::Json,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleFormat::Json => "json",
            RuleFormat::Toml => "toml",
        }
    }

    fn codec_error(&self, reason: impl ToString) -> RegimeError {
        RegimeError::Codec {
            format: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Serialize)]
struct RuleDocument<'a> {
    schema_version: u32,
    rules: &'a [TickerRule],
}

pub fn encode(rules: &[TickerRule], format: RuleFormat) -> Result<String, RegimeError> {
    let doc = RuleDocument {
        schema_version: SCHEMA_VERSION,
        rules,
    };
    match format {
        RuleFormat::Json => serde_json::to_string_pretty(&doc).map_err(|e| format.codec_error(e)),
        RuleFormat::Toml => toml::to_string_pretty(&doc).map_err(|e| format.codec_error(e)),
    }
}

pub fn decode(text: &str, format: RuleFormat) -> Result<Vec<TickerRule>, RegimeError> {
    let (version, raw) = match format {
        RuleFormat::Json => decode_json(text)?,
        RuleFormat::Toml => decode_toml(text)?,
    };

    if version != Some(SCHEMA_VERSION) {
        tracing::info!(rules = raw.rules.len(), "migrating legacy rule document");
    }

    raw.rules.into_iter().map(RawRule::migrate).collect()
}

pub fn load(path: &Path, format: RuleFormat) -> Result<Vec<TickerRule>, RegimeError> {
    let text = fs::read_to_string(path)?;
    let rules = decode(&text, format)?;
    tracing::info!(path = %path.display(), rules = rules.len(), "loaded rules");
    Ok(rules)
}

pub fn save(rules: &[TickerRule], path: &Path, format: RuleFormat) -> Result<(), RegimeError> {
    write_atomic(path, &encode(rules, format)?)?;
    tracing::info!(path = %path.display(), rules = rules.len(), "saved rules");
    Ok(())
}

fn version_of(value: Option<i64>, format: RuleFormat) -> Result<Option<u32>, RegimeError> {
    value
        .map(|v| u32::try_from(v).map_err(|_| format.codec_error(format!("bad schema_version {}", v))))
        .transpose()
}

fn decode_json(text: &str) -> Result<(Option<u32>, RawDocument), RegimeError> {
    let format = RuleFormat::Json;
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| format.codec_error(e))?;

    // Oldest documents are a bare array of rules.
    let value = match value {
        serde_json::Value::Array(rules) => serde_json::json!({ "rules": rules }),
        other => other,
    };
    let version = version_of(value.get("schema_version").and_then(|v| v.as_i64()), format)?;
    if let Some(v) = version.filter(|v| *v > SCHEMA_VERSION) {
        return Err(RegimeError::UnsupportedSchema { version: v });
    }

    let raw = serde_json::from_value(value).map_err(|e| format.codec_error(e))?;
    Ok((version, raw))
}

fn decode_toml(text: &str) -> Result<(Option<u32>, RawDocument), RegimeError> {
    let format = RuleFormat::Toml;
    let table: toml::Table = toml::from_str(text).map_err(|e| format.codec_error(e))?;

    let version = version_of(table.get("schema_version").and_then(|v| v.as_integer()), format)?;
    if let Some(v) = version.filter(|v| *v > SCHEMA_VERSION) {
        return Err(RegimeError::UnsupportedSchema { version: v });
    }

    let raw = toml::Value::Table(table)
        .try_into()
        .map_err(|e| format.codec_error(e))?;
    Ok((version, raw))
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    ticker: String,
    #[serde(default, alias = "raw_text")]
    raw_annotation: Option<String>,
    #[serde(default)]
    raw_result: Option<String>,
    entry: RawSide,
    exit: RawSide,
}

#[derive(Debug, Deserialize)]
struct RawSide {
    timeframe: RawTimeframe,
    signal: RawSignal,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default, alias = "confirm")]
    confirms: Option<OneOrMany<RawConfirm>>,
    #[serde(default, alias = "gate")]
    gates: Option<OneOrMany<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTimeframe {
    Months(u32),
    Label(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSignal {
    Spec {
        kind: String,
        #[serde(default)]
        direction: Option<String>,
    },
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawConfirm {
    Spec {
        kind: String,
        #[serde(default)]
        timeframe: Option<RawTimeframe>,
    },
    Name(String),
}

// `Many` first: a derived struct also accepts a sequence.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Entry,
    Exit,
}

fn invalid(reason: String) -> RegimeError {
    RegimeError::RuleInvalid { reason }
}

impl RawTimeframe {
    /// Integer months, or a label such as `"3M"`, `"3mo"`, `"3"`.
    fn months(&self) -> Result<u32, RegimeError> {
        match self {
            RawTimeframe::Months(n) => Ok(*n),
            RawTimeframe::Label(label) => {
                let trimmed = label.trim();
                let digits = trimmed
                    .strip_suffix("mo")
                    .or_else(|| trimmed.strip_suffix('M'))
                    .or_else(|| trimmed.strip_suffix('m'))
                    .unwrap_or(trimmed);
                digits
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("unrecognized timeframe '{}'", label)))
            }
        }
    }
}

fn parse_kind(name: &str) -> Option<SignalKind> {
    match name {
        "macd_state" => Some(SignalKind::MacdState),
        "macd_hist_delta" | "hist_delta" => Some(SignalKind::MacdHistDelta),
        _ => None,
    }
}

fn parse_direction(name: &str) -> Option<Direction> {
    match name {
        "above_signal" | "macd_above_signal" => Some(Direction::AboveSignal),
        "below_signal" | "macd_below_signal" => Some(Direction::BelowSignal),
        "increasing" | "positive" => Some(Direction::Increasing),
        "decreasing" | "negative" => Some(Direction::Decreasing),
        _ => None,
    }
}

fn default_direction(kind: SignalKind, role: Role) -> Direction {
    match (kind, role) {
        (SignalKind::MacdState, Role::Entry) => Direction::AboveSignal,
        (SignalKind::MacdState, Role::Exit) => Direction::BelowSignal,
        (SignalKind::MacdHistDelta, Role::Entry) => Direction::Increasing,
        (SignalKind::MacdHistDelta, Role::Exit) => Direction::Decreasing,
    }
}

fn unsupported(kind: &str, direction: Option<&str>) -> RegimeError {
    RegimeError::UnsupportedSignal {
        kind: kind.to_string(),
        direction: direction.unwrap_or("-").to_string(),
    }
}

/// Resolve a signal from its kind name and optional direction name.
fn migrate_signal(kind: &str, direction: Option<&str>, role: Role) -> Result<SignalSpec, RegimeError> {
    // Full legacy names carry their own direction.
    let (kind, implied) = match kind {
        "macd_above_signal" => (SignalKind::MacdState, Some(Direction::AboveSignal)),
        "macd_below_signal" => (SignalKind::MacdState, Some(Direction::BelowSignal)),
        name => (parse_kind(name).ok_or_else(|| unsupported(name, direction))?, None),
    };

    let direction = match direction {
        Some(name) => parse_direction(name).ok_or_else(|| unsupported(&kind.to_string(), Some(name)))?,
        None => implied.unwrap_or_else(|| default_direction(kind, role)),
    };

    // Legal-as-a-pair is checked at evaluation time.
    Ok(SignalSpec { kind, direction })
}

fn parse_confirm_kind(name: &str) -> Option<ConfirmKind> {
    match name {
        "momentum_delta_positive" | "zqzmom_delta_positive" => Some(ConfirmKind::MomentumDeltaPositive),
        _ => None,
    }
}

fn migrate_confirm(raw: RawConfirm, fallback_timeframe: u32) -> Result<ConfirmSpec, RegimeError> {
    let (kind_name, timeframe) = match raw {
        RawConfirm::Spec { kind, timeframe } => {
            let months = timeframe.map(|t| t.months()).transpose()?;
            (kind, months)
        }
        RawConfirm::Name(text) => match text.split_once(':') {
            Some((kind, tf)) => {
                let months = RawTimeframe::Label(tf.to_string()).months()?;
                (kind.trim().to_string(), Some(months))
            }
            None => (text.trim().to_string(), None),
        },
    };

    let kind = parse_confirm_kind(&kind_name)
        .ok_or_else(|| invalid(format!("unrecognized confirm kind '{}'", kind_name)))?;
    Ok(ConfirmSpec {
        kind,
        timeframe: timeframe.unwrap_or(fallback_timeframe),
    })
}

fn parse_gate(name: &str) -> Result<GateName, RegimeError> {
    match name.trim() {
        "MACRO_GATE_ON" | "SPX_GATE_ON" => Ok(GateName::MacroGateOn),
        other => Err(invalid(format!("unrecognized gate '{}'", other))),
    }
}

impl RawSide {
    fn migrate(self, role: Role) -> Result<RuleSide, RegimeError> {
        let timeframe = self.timeframe.months()?;

        let signal = match &self.signal {
            RawSignal::Spec { kind, direction } => {
                // A sibling direction overrides the nested one.
                let direction = self.direction.as_deref().or(direction.as_deref());
                migrate_signal(kind, direction, role)?
            }
            RawSignal::Name(kind) => migrate_signal(kind, self.direction.as_deref(), role)?,
        };

        let confirms = self
            .confirms
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|c| migrate_confirm(c, timeframe))
            .collect::<Result<Vec<_>, _>>()?;

        let gates = self
            .gates
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|g| parse_gate(g))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(RuleSide {
            timeframe,
            signal,
            confirms,
            gates,
        })
    }
}

impl RawRule {
    fn migrate(self) -> Result<TickerRule, RegimeError> {
        let ticker = self.ticker;
        let context = |e: RegimeError| match e {
            RegimeError::RuleInvalid { reason } => invalid(format!("{}: {}", ticker, reason)),
            other => other,
        };

        Ok(TickerRule {
            raw_annotation: self.raw_annotation.or(self.raw_result).unwrap_or_default(),
            entry: self.entry.migrate(Role::Entry).map_err(context)?,
            exit: self.exit.migrate(Role::Exit).map_err(context)?,
            ticker,
        })
    }
}
