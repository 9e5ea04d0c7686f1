//! Textual representation of spans, boxes, and temporal values.
//!
//! The grammar follows the conventional forms: `value@timestamp` for
//! instants, `{...}` for sets, `[...]` / `(...)` for sequences with
//! inclusivity bounds, and an `Interp=Step;` prefix for step-interpolated
//! sequences over a base type whose default is linear. The prefix is
//! emitted on output whenever it is needed for the round-trip
//! `parse(print(x)) == x` to hold. Timestamp and interval formats honor
//! the engine configuration.

use crate::base::{BaseValue, Text};
use crate::boxes::{STBox, TBox};
use crate::engine::{self, DateOrder, DateStyle, Engine};
use crate::error::{Result, TemporalError};
use crate::point::{PointValue, WGS84_SRID};
use crate::span::{Span, SpanBound};
use crate::spanset::SpanSet;
use crate::temporal::{TInstant, TInstantSet, TInterpolation, TSequence, TSequenceSet, Temporal};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Format a timestamp according to the engine configuration.
pub fn format_timestamp(t: DateTime<Utc>, engine: &Engine) -> String {
    let local = t.with_timezone(&engine.timezone());
    let micros = local.timestamp_subsec_micros();
    let frac = if micros == 0 {
        String::new()
    } else {
        let s = format!("{:06}", micros);
        format!(".{}", s.trim_end_matches('0'))
    };
    let offset_secs = local.offset().fix().local_minus_utc();
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let off = offset_secs.abs();
    let offset = if off % 3600 == 0 {
        format!("{}{:02}", sign, off / 3600)
    } else {
        format!("{}{:02}:{:02}", sign, off / 3600, (off % 3600) / 60)
    };

    let config = engine.config();
    match config.date_style {
        DateStyle::Iso => format!("{}{}{}", local.format("%Y-%m-%d %H:%M:%S"), frac, offset),
        DateStyle::Xsd => format!("{}{}{}", local.format("%Y-%m-%dT%H:%M:%S"), frac, offset),
        DateStyle::Postgres => {
            format!("{}{}{}", local.format("%a %b %d %H:%M:%S %Y"), frac, offset)
        }
        DateStyle::Sql => {
            let date = match config.date_order {
                DateOrder::Dmy => local.format("%d/%m/%Y"),
                _ => local.format("%m/%d/%Y"),
            };
            format!("{} {}{}{}", date, local.format("%H:%M:%S"), frac, offset)
        }
        DateStyle::German => format!(
            "{} {}{}{}",
            local.format("%d.%m.%Y"),
            local.format("%H:%M:%S"),
            frac,
            offset
        ),
    }
}

/// Parse a timestamp literal, honoring the configured date order and
/// timezone for literals that lack an explicit offset.
pub fn parse_timestamp(s: &str, engine: &Engine) -> Result<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() {
        return Err(TemporalError::InvalidInput(
            "empty timestamp literal".to_string(),
        ));
    }
    let bad = || TemporalError::InvalidInput(format!("cannot parse timestamp: {}", s));

    // Forms carrying an explicit offset.
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%a %b %d %H:%M:%S%.f %Y%#z",
    ] {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Ok(t.with_timezone(&Utc));
        }
    }

    // Offset-less forms are interpreted in the configured timezone.
    let (dmy, mdy) = match engine.config().date_order {
        DateOrder::Dmy => (true, false),
        DateOrder::Mdy => (false, true),
        DateOrder::Ymd => (false, true),
    };
    let mut naive: Option<NaiveDateTime> = None;
    let mut datetime_formats = vec![
        "%Y-%m-%d %H:%M:%S%.f".to_string(),
        "%Y-%m-%dT%H:%M:%S%.f".to_string(),
        "%a %b %d %H:%M:%S%.f %Y".to_string(),
        "%b %d %H:%M:%S%.f %Y".to_string(),
        "%d.%m.%Y %H:%M:%S%.f".to_string(),
    ];
    if dmy {
        datetime_formats.push("%d/%m/%Y %H:%M:%S%.f".to_string());
    }
    if mdy {
        datetime_formats.push("%m/%d/%Y %H:%M:%S%.f".to_string());
    }
    for fmt in &datetime_formats {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            naive = Some(t);
            break;
        }
    }
    if naive.is_none() {
        let mut date_formats = vec!["%Y-%m-%d".to_string(), "%d.%m.%Y".to_string()];
        if dmy {
            date_formats.push("%d/%m/%Y".to_string());
        }
        if mdy {
            date_formats.push("%m/%d/%Y".to_string());
        }
        for fmt in &date_formats {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                naive = d.and_hms_opt(0, 0, 0);
                break;
            }
        }
    }
    let naive = naive.ok_or_else(bad)?;
    match engine.timezone().from_local_datetime(&naive) {
        chrono::LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(t, _) => Ok(t.with_timezone(&Utc)),
        chrono::LocalResult::None => Err(bad()),
    }
}

/// Cursor over a literal being parsed.
pub(crate) struct Parser<'a> {
    rest: &'a str,
    pub(crate) srid: Option<i32>,
    pub(crate) geodetic: bool,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(s: &'a str, geodetic: bool) -> Self {
        Self {
            rest: s,
            srid: None,
            geodetic,
        }
    }

    fn error(&self, msg: &str) -> TemporalError {
        TemporalError::InvalidInput(format!("{} at: {:.40}", msg, self.rest))
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let mut chars = self.rest.chars();
        let c = chars.next()?;
        self.rest = chars.as_str();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    fn try_eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a case-insensitive keyword if present.
    fn try_keyword(&mut self, word: &str) -> bool {
        self.skip_ws();
        match self.rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => {
                self.rest = &self.rest[word.len()..];
                true
            }
            _ => false,
        }
    }

    /// Take characters until one of `delims` (or the end).
    fn take_until(&mut self, delims: &[char]) -> &'a str {
        let end = self
            .rest
            .find(|c| delims.contains(&c))
            .unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        token
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    /// Parse an optional `SRID=n;` prefix.
    fn parse_srid_prefix(&mut self) -> Result<()> {
        if self.try_keyword("SRID=") {
            let token = self.take_until(&[';']);
            let srid: i32 = token
                .trim()
                .parse()
                .map_err(|_| self.error("invalid SRID"))?;
            self.eat(';')?;
            self.srid = Some(srid);
        }
        Ok(())
    }

    /// Parse an optional `Interp=...;` prefix.
    fn parse_interp_prefix(&mut self) -> Result<Option<TInterpolation>> {
        if self.try_keyword("Interp=") {
            let token = self.take_until(&[';']);
            let interp: TInterpolation = token.trim().parse()?;
            self.eat(';')?;
            return Ok(Some(interp));
        }
        Ok(None)
    }

    fn parse_timestamp_token(&mut self, engine: &Engine) -> Result<DateTime<Utc>> {
        self.skip_ws();
        let token = self.take_until(&[',', ')', ']', '}']);
        parse_timestamp(token, engine)
    }

    fn parse_f64(&mut self) -> Result<f64> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_digit() || "+-.eE".contains(c)))
            .unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        let value = token
            .parse()
            .map_err(|_| self.error("invalid number"))?;
        self.rest = rest;
        Ok(value)
    }
}

/// Base values that can be printed and parsed inside temporal literals.
pub trait ValueFormat: BaseValue {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    #[doc(hidden)]
    fn parse_value(p: &mut Parser<'_>) -> Result<Self>;

    /// Prefix emitted once before the whole literal.
    fn literal_prefix(&self) -> Option<String> {
        None
    }
}

impl ValueFormat for bool {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if *self { "t" } else { "f" })
    }

    fn parse_value(p: &mut Parser<'_>) -> Result<Self> {
        p.skip_ws();
        for (word, value) in [("true", true), ("false", false), ("t", true), ("f", false)] {
            if p.try_keyword(word) {
                return Ok(value);
            }
        }
        Err(p.error("expected a boolean"))
    }
}

impl ValueFormat for i64 {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn parse_value(p: &mut Parser<'_>) -> Result<Self> {
        Ok(p.parse_f64()? as i64)
    }
}

impl ValueFormat for f64 {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn parse_value(p: &mut Parser<'_>) -> Result<Self> {
        p.parse_f64()
    }
}

impl ValueFormat for Text {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\"",
            self.as_str().replace('\\', "\\\\").replace('"', "\\\"")
        )
    }

    fn parse_value(p: &mut Parser<'_>) -> Result<Self> {
        p.eat('"')?;
        let mut out = String::new();
        loop {
            match p.bump() {
                Some('\\') => match p.bump() {
                    Some(c) => out.push(c),
                    None => return Err(p.error("unterminated escape")),
                },
                Some('"') => return Ok(Text::new(out)),
                Some(c) => out.push(c),
                None => return Err(p.error("unterminated string")),
            }
        }
    }
}

impl ValueFormat for PointValue {
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.z() {
            Some(z) => write!(f, "POINT Z ({} {} {})", self.x(), self.y(), z),
            None => write!(f, "POINT({} {})", self.x(), self.y()),
        }
    }

    fn parse_value(p: &mut Parser<'_>) -> Result<Self> {
        p.try_keyword("POINT");
        let has_z = p.try_keyword("Z");
        p.eat('(')?;
        let x = p.parse_f64()?;
        let y = p.parse_f64()?;
        let z = if has_z { Some(p.parse_f64()?) } else { None };
        p.eat(')')?;
        let srid = p.srid.unwrap_or(if p.geodetic { WGS84_SRID } else { 0 });
        let mut point = match (p.geodetic, z) {
            (true, Some(z)) => PointValue::geog_z(x, y, z),
            (true, None) => PointValue::geog(x, y),
            (false, Some(z)) => PointValue::new_z(x, y, z),
            (false, None) => PointValue::new(x, y),
        };
        point = point.with_srid(srid);
        point.validate()?;
        Ok(point)
    }

    fn literal_prefix(&self) -> Option<String> {
        (self.srid() != 0).then(|| format!("SRID={};", self.srid()))
    }
}

/// Bounds that can appear in span literals.
pub trait BoundFormat: SpanBound {
    fn fmt_bound(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn parse_bound(p: &mut Parser<'_>, engine: &Engine) -> Result<Self>;
}

impl BoundFormat for i64 {
    fn fmt_bound(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn parse_bound(p: &mut Parser<'_>, _engine: &Engine) -> Result<Self> {
        Ok(p.parse_f64()? as i64)
    }
}

impl BoundFormat for f64 {
    fn fmt_bound(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn parse_bound(p: &mut Parser<'_>, _engine: &Engine) -> Result<Self> {
        p.parse_f64()
    }
}

impl BoundFormat for DateTime<Utc> {
    fn fmt_bound(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_timestamp(*self, &engine::global()))
    }

    fn parse_bound(p: &mut Parser<'_>, engine: &Engine) -> Result<Self> {
        p.parse_timestamp_token(engine)
    }
}

impl<T: BoundFormat> fmt::Display for Span<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.lower_inc() { "[" } else { "(" })?;
        self.lower().fmt_bound(f)?;
        f.write_str(", ")?;
        self.upper().fmt_bound(f)?;
        f.write_str(if self.upper_inc() { "]" } else { ")" })
    }
}

fn parse_span_body<T: BoundFormat>(p: &mut Parser<'_>, engine: &Engine) -> Result<Span<T>> {
    p.skip_ws();
    let lower_inc = match p.bump() {
        Some('[') => true,
        Some('(') => false,
        _ => return Err(p.error("expected '[' or '('")),
    };
    let lower = T::parse_bound(p, engine)?;
    p.eat(',')?;
    let upper = T::parse_bound(p, engine)?;
    p.skip_ws();
    let upper_inc = match p.bump() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err(p.error("expected ']' or ')'")),
    };
    Span::new(lower, upper, lower_inc, upper_inc)
}

impl<T: BoundFormat> FromStr for Span<T> {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        let engine = engine::global();
        let mut p = Parser::new(s, false);
        let span = parse_span_body(&mut p, &engine)?;
        p.expect_end()?;
        Ok(span)
    }
}

impl<T: BoundFormat> fmt::Display for SpanSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, span) in self.spans().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", span)?;
        }
        f.write_str("}")
    }
}

impl<T: BoundFormat> FromStr for SpanSet<T> {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        let engine = engine::global();
        let mut p = Parser::new(s, false);
        p.eat('{')?;
        let mut spans = Vec::new();
        loop {
            spans.push(parse_span_body::<T>(&mut p, &engine)?);
            p.skip_ws();
            if !p.try_eat(',') {
                break;
            }
        }
        p.eat('}')?;
        p.expect_end()?;
        SpanSet::new(spans)
    }
}

impl fmt::Display for TBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.span(), self.period()) {
            (Some(span), Some(period)) => write!(f, "TBOX XT({},{})", span, period),
            (Some(span), None) => write!(f, "TBOX X({})", span),
            (None, Some(period)) => write!(f, "TBOX T({})", period),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for TBox {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        let engine = engine::global();
        let mut p = Parser::new(s, false);
        if !p.try_keyword("TBOX") {
            return Err(p.error("expected TBOX"));
        }
        let (has_x, has_t) = if p.try_keyword("XT") {
            (true, true)
        } else if p.try_keyword("X") {
            (true, false)
        } else if p.try_keyword("T") {
            (false, true)
        } else {
            return Err(p.error("expected X, T, or XT"));
        };
        p.eat('(')?;
        let span = if has_x {
            Some(parse_span_body::<f64>(&mut p, &engine)?)
        } else {
            None
        };
        if has_x && has_t {
            p.eat(',')?;
        }
        let period = if has_t {
            Some(parse_span_body::<DateTime<Utc>>(&mut p, &engine)?)
        } else {
            None
        };
        p.eat(')')?;
        p.expect_end()?;
        TBox::new(span, period)
    }
}

impl fmt::Display for STBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.srid() != 0 {
            write!(f, "SRID={};", self.srid())?;
        }
        f.write_str(if self.is_geodetic() { "GEODSTBOX" } else { "STBOX" })?;
        let dims = match (self.has_x(), self.has_z(), self.has_t()) {
            (true, true, true) => " ZT(",
            (true, true, false) => " Z(",
            (true, false, true) => " XT(",
            (true, false, false) => " X(",
            (false, _, true) => " T(",
            _ => " (",
        };
        f.write_str(dims)?;
        if self.has_x() {
            f.write_str("(")?;
            match (self.xmin(), self.ymin(), self.zmin()) {
                (Some(x), Some(y), Some(z)) => write!(f, "({},{},{})", x, y, z)?,
                (Some(x), Some(y), None) => write!(f, "({},{})", x, y)?,
                _ => {}
            }
            f.write_str(",")?;
            match (self.xmax(), self.ymax(), self.zmax()) {
                (Some(x), Some(y), Some(z)) => write!(f, "({},{},{})", x, y, z)?,
                (Some(x), Some(y), None) => write!(f, "({},{})", x, y)?,
                _ => {}
            }
            f.write_str(")")?;
            if self.has_t() {
                f.write_str(",")?;
            }
        }
        if let Some(period) = self.period() {
            write!(f, "{}", period)?;
        }
        f.write_str(")")
    }
}

impl FromStr for STBox {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        let engine = engine::global();
        let mut p = Parser::new(s, false);
        p.parse_srid_prefix()?;
        let geodetic = if p.try_keyword("GEODSTBOX") {
            true
        } else if p.try_keyword("STBOX") {
            false
        } else {
            return Err(p.error("expected STBOX or GEODSTBOX"));
        };
        let (has_x, has_z, has_t) = if p.try_keyword("ZT") {
            (true, true, true)
        } else if p.try_keyword("XT") {
            (true, false, true)
        } else if p.try_keyword("Z") {
            (true, true, false)
        } else if p.try_keyword("X") {
            (true, false, false)
        } else if p.try_keyword("T") {
            (false, false, true)
        } else {
            return Err(p.error("expected X, Z, T, XT, or ZT"));
        };
        p.eat('(')?;
        let mut bbox = if has_x {
            p.eat('(')?;
            p.eat('(')?;
            let xmin = p.parse_f64()?;
            p.eat(',')?;
            let ymin = p.parse_f64()?;
            let zmin = if has_z {
                p.eat(',')?;
                Some(p.parse_f64()?)
            } else {
                None
            };
            p.eat(')')?;
            p.eat(',')?;
            p.eat('(')?;
            let xmax = p.parse_f64()?;
            p.eat(',')?;
            let ymax = p.parse_f64()?;
            let zmax = if has_z {
                p.eat(',')?;
                Some(p.parse_f64()?)
            } else {
                None
            };
            p.eat(')')?;
            p.eat(')')?;
            let bbox = match (zmin, zmax) {
                (Some(zmin), Some(zmax)) => {
                    STBox::space_z(xmin, xmax, ymin, ymax, zmin, zmax)?
                }
                _ => STBox::space(xmin, xmax, ymin, ymax)?,
            };
            if has_t {
                p.eat(',')?;
                bbox.with_period(parse_span_body::<DateTime<Utc>>(&mut p, &engine)?)
            } else {
                bbox
            }
        } else {
            STBox::from_period(parse_span_body::<DateTime<Utc>>(&mut p, &engine)?)
        };
        p.eat(')')?;
        p.expect_end()?;
        bbox = bbox.with_geodetic(geodetic);
        if let Some(srid) = p.srid {
            bbox = bbox.with_srid(srid);
        } else if geodetic {
            bbox = bbox.with_srid(WGS84_SRID);
        }
        Ok(bbox)
    }
}

/// Whether the literal needs an `Interp=Step;` marker to round-trip.
fn needs_step_marker<B: BaseValue>(interp: TInterpolation) -> bool {
    B::CONTINUOUS && interp == TInterpolation::Step
}

fn fmt_instant<B: ValueFormat>(
    inst: &TInstant<B>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    inst.value().fmt_value(f)?;
    f.write_str("@")?;
    f.write_str(&format_timestamp(inst.timestamp(), &engine::global()))
}

fn fmt_sequence_body<B: ValueFormat>(
    seq: &TSequence<B>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.write_str(if seq.lower_inc() { "[" } else { "(" })?;
    for (i, inst) in seq.instants().iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt_instant(inst, f)?;
    }
    f.write_str(if seq.upper_inc() { "]" } else { ")" })
}

impl<B: ValueFormat> fmt::Display for Temporal<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.start_instant().value().literal_prefix() {
            f.write_str(&prefix)?;
        }
        match self {
            Temporal::Instant(i) => fmt_instant(i, f),
            Temporal::InstantSet(s) => {
                f.write_str("{")?;
                for (i, inst) in s.instants().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_instant(inst, f)?;
                }
                f.write_str("}")
            }
            Temporal::Sequence(s) => {
                if needs_step_marker::<B>(s.interpolation()) {
                    f.write_str("Interp=Step;")?;
                }
                fmt_sequence_body(s, f)
            }
            Temporal::SequenceSet(s) => {
                if needs_step_marker::<B>(s.interpolation()) {
                    f.write_str("Interp=Step;")?;
                }
                f.write_str("{")?;
                for (i, seq) in s.sequences().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_sequence_body(seq, f)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn parse_instant_body<B: ValueFormat>(
    p: &mut Parser<'_>,
    engine: &Engine,
) -> Result<TInstant<B>> {
    let value = B::parse_value(p)?;
    p.eat('@')?;
    let t = p.parse_timestamp_token(engine)?;
    TInstant::new(value, t)
}

fn parse_sequence_body<B: ValueFormat>(
    p: &mut Parser<'_>,
    engine: &Engine,
    interp: TInterpolation,
) -> Result<TSequence<B>> {
    p.skip_ws();
    let lower_inc = match p.bump() {
        Some('[') => true,
        Some('(') => false,
        _ => return Err(p.error("expected '[' or '('")),
    };
    let mut instants = Vec::new();
    loop {
        instants.push(parse_instant_body::<B>(p, engine)?);
        p.skip_ws();
        if !p.try_eat(',') {
            break;
        }
    }
    p.skip_ws();
    let upper_inc = match p.bump() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err(p.error("expected ']' or ')'")),
    };
    TSequence::new(instants, lower_inc, upper_inc, interp)
}

/// Parse a temporal literal, geodetic or planar.
pub(crate) fn parse_temporal<B: ValueFormat>(s: &str, geodetic: bool) -> Result<Temporal<B>> {
    let engine = engine::global();
    let mut p = Parser::new(s, geodetic);
    p.parse_srid_prefix()?;
    let marked = p.parse_interp_prefix()?;
    let default_interp = if B::CONTINUOUS {
        TInterpolation::Linear
    } else {
        TInterpolation::Step
    };
    let interp = marked.unwrap_or(default_interp);

    p.skip_ws();
    let result = match p.peek() {
        Some('{') => {
            p.bump();
            p.skip_ws();
            match p.peek() {
                Some('[') | Some('(') => {
                    let mut sequences = Vec::new();
                    loop {
                        sequences.push(parse_sequence_body::<B>(&mut p, &engine, interp)?);
                        p.skip_ws();
                        if !p.try_eat(',') {
                            break;
                        }
                    }
                    p.eat('}')?;
                    Temporal::SequenceSet(TSequenceSet::new(sequences)?)
                }
                _ => {
                    let mut instants = Vec::new();
                    loop {
                        instants.push(parse_instant_body::<B>(&mut p, &engine)?);
                        p.skip_ws();
                        if !p.try_eat(',') {
                            break;
                        }
                    }
                    p.eat('}')?;
                    if instants.len() == 1 {
                        Temporal::Instant(instants.swap_remove(0))
                    } else {
                        Temporal::InstantSet(TInstantSet::new(instants)?)
                    }
                }
            }
        }
        Some('[') | Some('(') => {
            Temporal::Sequence(parse_sequence_body::<B>(&mut p, &engine, interp)?)
        }
        _ => Temporal::Instant(parse_instant_body::<B>(&mut p, &engine)?),
    };
    p.expect_end()?;
    Ok(result)
}

impl<B: ValueFormat> FromStr for Temporal<B> {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        parse_temporal(s, false)
    }
}

/// Parse a temporal point literal as geodetic (lon/lat) coordinates.
pub fn parse_tgeogpoint(s: &str) -> Result<Temporal<PointValue>> {
    parse_temporal(s, true)
}
