//! Annotation parser.
//!
//! Compiles a free-text trading note into a [`TickerRule`]. Grammar elements
//! are matched independently and by presence, so word order does not matter
//! and anything unrecognized is ignored. Parsing never fails: a note with no
//! recognized markers yields the default rule (1-month MACD state crossover
//! on both sides, no confirms, no gates).
//!
//! Recognized elements (Korean / English spellings):
//! - entry timeframe: `매수 (3달봉)`, `BUY(3mo)`
//! - exit timeframe: `매도 (1달봉)`, `SELL(1mo)`
//! - oscillator mode: `오실`, `OSC`
//! - macro gate: `침체`, `금리인하`, `SPX 기준`, `RECESSION`, `RATE-CUT`, `RATE_CUT`, `SPX-REF`
//! - confirm: `ZQ`, with an optional timeframe `1달봉 ZQ`, `1mo-ZQ`

use crate::domain::indicator::resample::MAX_MONTHS;
use crate::domain::rule::{ConfirmKind, ConfirmSpec, GateName, RuleSide, SignalSpec, TickerRule};

pub const DEFAULT_TIMEFRAME: u32 = 1;

const ENTRY_MARKERS: &[&str] = &["매수", "BUY"];
const EXIT_MARKERS: &[&str] = &["매도", "SELL"];
const OSCILLATOR_MARKERS: &[&str] = &["오실", "OSC"];
const MACRO_GATE_MARKERS: &[&str] = &[
    "침체",
    "금리인하",
    "SPX 기준",
    "RECESSION",
    "RATE-CUT",
    "RATE_CUT",
    "SPX-REF",
];
const CONFIRM_MARKER: &str = "ZQ";
const NOISE_TOKENS: &[&str] = &["중국", "CHINA", "NOISE_TOKEN"];
// Longest first so "months" is not cut short by "mo".
const MONTH_UNITS: &[&str] = &["달봉", "months", "month", "mo", "M"];

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn at(input: &'a str, pos: usize) -> Self {
        Self { input, pos }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn consume_any(&mut self, options: &[&str]) -> bool {
        options.iter().any(|s| self.consume_exact(s))
    }

    fn parse_count(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return None;
        }
        self.input[start..self.pos].parse::<u32>().ok()
    }

    /// `( N unit )` following a side marker.
    fn side_timeframe(&mut self) -> Option<u32> {
        self.skip_whitespace();
        if !self.consume_exact("(") {
            return None;
        }
        self.skip_whitespace();
        let months = self.parse_count()?;
        self.skip_whitespace();
        if !self.consume_any(MONTH_UNITS) {
            return None;
        }
        self.skip_whitespace();
        if !self.consume_exact(")") {
            return None;
        }
        Some(months)
    }

    /// `N unit [-] ZQ`
    fn confirm_timeframe(&mut self) -> Option<u32> {
        let months = self.parse_count()?;
        self.skip_whitespace();
        if !self.consume_any(MONTH_UNITS) {
            return None;
        }
        self.skip_whitespace();
        self.consume_exact("-");
        self.skip_whitespace();
        if !self.consume_exact(CONFIRM_MARKER) {
            return None;
        }
        Some(months)
    }
}

fn in_range(months: u32) -> bool {
    (1..=MAX_MONTHS).contains(&months)
}

fn strip_noise(text: &str) -> String {
    NOISE_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

fn find_side_timeframe(text: &str, markers: &[&str]) -> Option<u32> {
    text.char_indices().find_map(|(start, _)| {
        let mut scanner = Scanner::at(text, start);
        if !scanner.consume_any(markers) {
            return None;
        }
        scanner.side_timeframe().filter(|m| in_range(*m))
    })
}

fn find_confirm_timeframe(text: &str) -> Option<u32> {
    let mut prev_digit = false;
    text.char_indices().find_map(|(start, ch)| {
        let starts_number = ch.is_ascii_digit() && !prev_digit;
        prev_digit = ch.is_ascii_digit();
        if !starts_number {
            return None;
        }
        Scanner::at(text, start)
            .confirm_timeframe()
            .filter(|m| in_range(*m))
    })
}

pub fn parse(ticker: &str, annotation: &str) -> TickerRule {
    let cleaned = strip_noise(annotation);

    let entry_tf = find_side_timeframe(&cleaned, ENTRY_MARKERS).unwrap_or(DEFAULT_TIMEFRAME);
    let exit_tf = find_side_timeframe(&cleaned, EXIT_MARKERS).unwrap_or(DEFAULT_TIMEFRAME);

    let (entry_signal, exit_signal) = if contains_any(&cleaned, OSCILLATOR_MARKERS) {
        (SignalSpec::HIST_INCREASING, SignalSpec::HIST_DECREASING)
    } else {
        (SignalSpec::MACD_ABOVE_SIGNAL, SignalSpec::MACD_BELOW_SIGNAL)
    };

    let mut entry = RuleSide::new(entry_tf, entry_signal);
    if cleaned.contains(CONFIRM_MARKER) {
        entry.confirms.push(ConfirmSpec {
            kind: ConfirmKind::MomentumDeltaPositive,
            timeframe: find_confirm_timeframe(&cleaned).unwrap_or(entry_tf),
        });
    }

    let mut exit = RuleSide::new(exit_tf, exit_signal);
    if contains_any(&cleaned, MACRO_GATE_MARKERS) {
        exit.gates.insert(GateName::MacroGateOn);
    }

    let rule = TickerRule {
        ticker: ticker.to_string(),
        raw_annotation: annotation.to_string(),
        entry,
        exit,
    };

    if rule.entry == RuleSide::default_entry() && rule.exit == RuleSide::default_exit() {
        tracing::debug!(ticker, "no recognized markers, using default rule");
    }

    rule
}

/// Parse `(ticker, annotation)` pairs, preserving order and duplicates.
pub fn parse_bulk<I, T, A>(rows: I) -> Vec<TickerRule>
where
    I: IntoIterator<Item = (T, A)>,
    T: AsRef<str>,
    A: AsRef<str>,
{
    rows.into_iter()
        .map(|(ticker, annotation)| parse(ticker.as_ref(), annotation.as_ref()))
        .collect()
}
