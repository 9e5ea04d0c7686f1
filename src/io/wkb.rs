//! Well-known binary encoding of temporal values.
//!
//! Layout: a header of four bytes — endianness (0x01 little, 0x00 big),
//! base type id, subtype id, and a flags byte (has-Z, geodetic,
//! SRID-present, interpolation) — then the optional SRID as an `i32`, then
//! the subtype body: an instant is a microsecond timestamp followed by the
//! value; sets and sequences carry a `u32` count, sequences additionally a
//! bounds byte. Endianness is honored per entity.

use crate::base::{BaseValue, Text};
use crate::error::{Result, TemporalError};
use crate::point::PointValue;
use crate::temporal::{TInstant, TInstantSet, TInterpolation, TSequence, TSequenceSet, Temporal};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, TimeZone, Utc};

const WKB_LITTLE_ENDIAN: u8 = 0x01;
const WKB_BIG_ENDIAN: u8 = 0x00;

const SUBTYPE_INSTANT: u8 = 1;
const SUBTYPE_INSTANT_SET: u8 = 2;
const SUBTYPE_SEQUENCE: u8 = 3;
const SUBTYPE_SEQUENCE_SET: u8 = 4;

const FLAG_HAS_Z: u8 = 0x01;
const FLAG_GEODETIC: u8 = 0x02;
const FLAG_HAS_SRID: u8 = 0x04;
const INTERP_SHIFT: u8 = 4;
const INTERP_MASK: u8 = 0x30;

const BOUND_LOWER_INC: u8 = 0x01;
const BOUND_UPPER_INC: u8 = 0x02;

pub(crate) struct WkbWriter {
    buf: BytesMut,
    le: bool,
}

impl WkbWriter {
    fn new(le: bool) -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
            le,
        }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    fn put_u32(&mut self, v: u32) {
        if self.le {
            self.buf.put_u32_le(v);
        } else {
            self.buf.put_u32(v);
        }
    }

    fn put_i32(&mut self, v: i32) {
        if self.le {
            self.buf.put_i32_le(v);
        } else {
            self.buf.put_i32(v);
        }
    }

    fn put_i64(&mut self, v: i64) {
        if self.le {
            self.buf.put_i64_le(v);
        } else {
            self.buf.put_i64(v);
        }
    }

    fn put_f64(&mut self, v: f64) {
        if self.le {
            self.buf.put_f64_le(v);
        } else {
            self.buf.put_f64(v);
        }
    }

    fn put_slice(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }
}

pub(crate) struct WkbReader<'a> {
    rest: &'a [u8],
    le: bool,
    has_z: bool,
    geodetic: bool,
    srid: Option<i32>,
}

impl<'a> WkbReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(TemporalError::InvalidInput(
                "truncated WKB payload".to_string(),
            ));
        }
        let (head, rest) = self.rest.split_at(n);
        self.rest = rest;
        Ok(head)
    }

    fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn get_u32(&mut self) -> Result<u32> {
        let raw: [u8; 4] = self.take(4)?.try_into().map_err(|_| {
            TemporalError::InvalidInput("truncated WKB payload".to_string())
        })?;
        Ok(if self.le {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn get_i32(&mut self) -> Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    fn get_i64(&mut self) -> Result<i64> {
        let raw: [u8; 8] = self.take(8)?.try_into().map_err(|_| {
            TemporalError::InvalidInput("truncated WKB payload".to_string())
        })?;
        Ok(if self.le {
            i64::from_le_bytes(raw)
        } else {
            i64::from_be_bytes(raw)
        })
    }

    fn get_f64(&mut self) -> Result<f64> {
        let raw: [u8; 8] = self.take(8)?.try_into().map_err(|_| {
            TemporalError::InvalidInput("truncated WKB payload".to_string())
        })?;
        Ok(if self.le {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }
}

/// Base values with a WKB encoding.
pub trait WkbValue: BaseValue {
    const WKB_ID: u8;

    #[doc(hidden)]
    fn write_value(&self, w: &mut WkbWriter);

    #[doc(hidden)]
    fn read_value(r: &mut WkbReader<'_>) -> Result<Self>;

    /// Extra flag bits contributed by the value (Z, geodetic, SRID).
    #[doc(hidden)]
    fn value_flags(&self) -> u8 {
        0
    }

    #[doc(hidden)]
    fn srid(&self) -> Option<i32> {
        None
    }
}

impl WkbValue for bool {
    const WKB_ID: u8 = 1;

    fn write_value(&self, w: &mut WkbWriter) {
        w.put_u8(u8::from(*self));
    }

    fn read_value(r: &mut WkbReader<'_>) -> Result<Self> {
        Ok(r.get_u8()? != 0)
    }
}

impl WkbValue for i64 {
    const WKB_ID: u8 = 2;

    fn write_value(&self, w: &mut WkbWriter) {
        w.put_i64(*self);
    }

    fn read_value(r: &mut WkbReader<'_>) -> Result<Self> {
        r.get_i64()
    }
}

impl WkbValue for f64 {
    const WKB_ID: u8 = 3;

    fn write_value(&self, w: &mut WkbWriter) {
        w.put_f64(*self);
    }

    fn read_value(r: &mut WkbReader<'_>) -> Result<Self> {
        r.get_f64()
    }
}

impl WkbValue for Text {
    const WKB_ID: u8 = 4;

    fn write_value(&self, w: &mut WkbWriter) {
        let bytes = self.as_str().as_bytes();
        w.put_u32(bytes.len() as u32);
        w.put_slice(bytes);
    }

    fn read_value(r: &mut WkbReader<'_>) -> Result<Self> {
        let len = r.get_u32()? as usize;
        let raw = r.take(len)?;
        let s = std::str::from_utf8(raw).map_err(|_| {
            TemporalError::InvalidInput("WKB text payload is not UTF-8".to_string())
        })?;
        Ok(Text::new(s))
    }
}

impl WkbValue for PointValue {
    const WKB_ID: u8 = 5;

    fn write_value(&self, w: &mut WkbWriter) {
        w.put_f64(self.x());
        w.put_f64(self.y());
        if let Some(z) = self.z() {
            w.put_f64(z);
        }
    }

    fn read_value(r: &mut WkbReader<'_>) -> Result<Self> {
        let x = r.get_f64()?;
        let y = r.get_f64()?;
        let z = if r.has_z { Some(r.get_f64()?) } else { None };
        let mut point = match (r.geodetic, z) {
            (true, Some(z)) => PointValue::geog_z(x, y, z),
            (true, None) => PointValue::geog(x, y),
            (false, Some(z)) => PointValue::new_z(x, y, z),
            (false, None) => PointValue::new(x, y),
        };
        if let Some(srid) = r.srid {
            point = point.with_srid(srid);
        } else if !r.geodetic {
            point = point.with_srid(0);
        }
        Ok(point)
    }

    fn value_flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_z() {
            flags |= FLAG_HAS_Z;
        }
        if self.is_geodetic() {
            flags |= FLAG_GEODETIC;
        }
        if self.srid() != 0 {
            flags |= FLAG_HAS_SRID;
        }
        flags
    }

    fn srid(&self) -> Option<i32> {
        (self.srid() != 0).then(|| self.srid())
    }
}

fn interp_bits(interp: TInterpolation) -> u8 {
    let code = match interp {
        TInterpolation::Discrete => 0,
        TInterpolation::Step => 1,
        TInterpolation::Linear => 2,
    };
    code << INTERP_SHIFT
}

fn interp_from_bits(flags: u8) -> Result<TInterpolation> {
    match (flags & INTERP_MASK) >> INTERP_SHIFT {
        0 => Ok(TInterpolation::Discrete),
        1 => Ok(TInterpolation::Step),
        2 => Ok(TInterpolation::Linear),
        other => Err(TemporalError::InvalidInput(format!(
            "invalid WKB interpolation code: {}",
            other
        ))),
    }
}

fn put_timestamp(w: &mut WkbWriter, t: DateTime<Utc>) {
    w.put_i64(t.timestamp_micros());
}

fn get_timestamp(r: &mut WkbReader<'_>) -> Result<DateTime<Utc>> {
    let micros = r.get_i64()?;
    Utc.timestamp_micros(micros).single().ok_or_else(|| {
        TemporalError::InvalidInput(format!("WKB timestamp out of range: {}", micros))
    })
}

fn put_instant<B: WkbValue>(w: &mut WkbWriter, inst: &TInstant<B>) {
    put_timestamp(w, inst.timestamp());
    inst.value().write_value(w);
}

fn get_instant<B: WkbValue>(r: &mut WkbReader<'_>) -> Result<TInstant<B>> {
    let t = get_timestamp(r)?;
    let value = B::read_value(r)?;
    TInstant::new(value, t)
}

fn put_sequence<B: WkbValue>(w: &mut WkbWriter, seq: &TSequence<B>) {
    w.put_u32(seq.num_instants() as u32);
    let mut bounds = 0;
    if seq.lower_inc() {
        bounds |= BOUND_LOWER_INC;
    }
    if seq.upper_inc() {
        bounds |= BOUND_UPPER_INC;
    }
    w.put_u8(bounds);
    for inst in seq.instants() {
        put_instant(w, inst);
    }
}

fn get_sequence<B: WkbValue>(
    r: &mut WkbReader<'_>,
    interp: TInterpolation,
) -> Result<TSequence<B>> {
    let count = r.get_u32()? as usize;
    let bounds = r.get_u8()?;
    let mut instants = Vec::with_capacity(count);
    for _ in 0..count {
        instants.push(get_instant(r)?);
    }
    TSequence::new(
        instants,
        bounds & BOUND_LOWER_INC != 0,
        bounds & BOUND_UPPER_INC != 0,
        interp,
    )
}

/// Entities encodable as WKB.
pub trait WkbWritable {
    /// Encode with the given endianness.
    fn as_wkb_with(&self, little_endian: bool) -> Vec<u8>;

    /// Encode as little-endian WKB.
    fn as_wkb(&self) -> Vec<u8> {
        self.as_wkb_with(true)
    }

    /// Hex-encoded little-endian WKB.
    fn as_hexwkb(&self) -> String {
        let mut out = String::new();
        for byte in self.as_wkb() {
            out.push_str(&format!("{:02X}", byte));
        }
        out
    }
}

/// Entities decodable from WKB.
pub trait WkbReadable: Sized {
    fn from_wkb(data: &[u8]) -> Result<Self>;

    fn from_hexwkb(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() % 2 != 0 {
            return Err(TemporalError::InvalidInput(
                "odd-length hex WKB".to_string(),
            ));
        }
        let mut bytes = Vec::with_capacity(s.len() / 2);
        for i in (0..s.len()).step_by(2) {
            let byte = u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| {
                TemporalError::InvalidInput("invalid hex WKB".to_string())
            })?;
            bytes.push(byte);
        }
        Self::from_wkb(&bytes)
    }
}

impl<B: WkbValue> WkbWritable for Temporal<B> {
    fn as_wkb_with(&self, little_endian: bool) -> Vec<u8> {
        let mut w = WkbWriter::new(little_endian);
        w.put_u8(if little_endian {
            WKB_LITTLE_ENDIAN
        } else {
            WKB_BIG_ENDIAN
        });
        w.put_u8(B::WKB_ID);
        let subtype = match self {
            Temporal::Instant(_) => SUBTYPE_INSTANT,
            Temporal::InstantSet(_) => SUBTYPE_INSTANT_SET,
            Temporal::Sequence(_) => SUBTYPE_SEQUENCE,
            Temporal::SequenceSet(_) => SUBTYPE_SEQUENCE_SET,
        };
        w.put_u8(subtype);
        let value = self.start_instant().value();
        let flags = value.value_flags() | interp_bits(self.interpolation());
        w.put_u8(flags);
        if let Some(srid) = WkbValue::srid(value) {
            w.put_i32(srid);
        }
        match self {
            Temporal::Instant(i) => put_instant(&mut w, i),
            Temporal::InstantSet(s) => {
                w.put_u32(s.num_instants() as u32);
                for inst in s.instants() {
                    put_instant(&mut w, inst);
                }
            }
            Temporal::Sequence(s) => put_sequence(&mut w, s),
            Temporal::SequenceSet(s) => {
                w.put_u32(s.num_sequences() as u32);
                for seq in s.sequences() {
                    put_sequence(&mut w, seq);
                }
            }
        }
        w.buf.to_vec()
    }
}

impl<B: WkbValue> WkbReadable for Temporal<B> {
    fn from_wkb(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(TemporalError::InvalidInput(
                "WKB payload too short".to_string(),
            ));
        }
        let le = match data[0] {
            WKB_LITTLE_ENDIAN => true,
            WKB_BIG_ENDIAN => false,
            other => {
                return Err(TemporalError::InvalidInput(format!(
                    "invalid WKB endianness byte: {:#04x}",
                    other
                )));
            }
        };
        let base_id = data[1];
        if base_id != B::WKB_ID {
            return Err(TemporalError::TypeMismatch(format!(
                "WKB base type id {} does not match expected {}",
                base_id,
                B::WKB_ID
            )));
        }
        let subtype = data[2];
        let flags = data[3];
        let mut r = WkbReader {
            rest: &data[4..],
            le,
            has_z: flags & FLAG_HAS_Z != 0,
            geodetic: flags & FLAG_GEODETIC != 0,
            srid: None,
        };
        if flags & FLAG_HAS_SRID != 0 {
            r.srid = Some(r.get_i32()?);
        }
        let interp = interp_from_bits(flags)?;
        match subtype {
            SUBTYPE_INSTANT => Ok(Temporal::Instant(get_instant(&mut r)?)),
            SUBTYPE_INSTANT_SET => {
                let count = r.get_u32()? as usize;
                let mut instants = Vec::with_capacity(count);
                for _ in 0..count {
                    instants.push(get_instant(&mut r)?);
                }
                Ok(Temporal::InstantSet(TInstantSet::new(instants)?))
            }
            SUBTYPE_SEQUENCE => Ok(Temporal::Sequence(get_sequence(&mut r, interp)?)),
            SUBTYPE_SEQUENCE_SET => {
                let count = r.get_u32()? as usize;
                let mut sequences = Vec::with_capacity(count);
                for _ in 0..count {
                    sequences.push(get_sequence(&mut r, interp)?);
                }
                Ok(Temporal::SequenceSet(TSequenceSet::new(sequences)?))
            }
            other => Err(TemporalError::InvalidInput(format!(
                "invalid WKB subtype: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn linear(values: &[(f64, u32)]) -> Temporal<f64> {
        Temporal::Sequence(
            TSequence::new(
                values
                    .iter()
                    .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                    .collect(),
                true,
                false,
                TInterpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_instant_roundtrip() {
        let x = Temporal::instant(1.5f64, ts(0)).unwrap();
        let wkb = x.as_wkb();
        assert_eq!(wkb[0], WKB_LITTLE_ENDIAN);
        assert_eq!(wkb[1], 3);
        assert_eq!(wkb[2], SUBTYPE_INSTANT);
        let back = Temporal::<f64>::from_wkb(&wkb).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_sequence_roundtrip_both_endians() {
        let x = linear(&[(10.0, 0), (20.0, 10)]);
        for le in [true, false] {
            let wkb = x.as_wkb_with(le);
            let back = Temporal::<f64>::from_wkb(&wkb).unwrap();
            assert_eq!(back, x, "endianness: le={}", le);
        }
    }

    #[test]
    fn test_hex_roundtrip() {
        let x = linear(&[(10.0, 0), (20.0, 10)]);
        let hex = x.as_hexwkb();
        let back = Temporal::<f64>::from_hexwkb(&hex).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_point_roundtrip_with_srid() {
        let x = Temporal::instant(
            crate::point::PointValue::new_z(1.0, 2.0, 3.0).with_srid(3857),
            ts(0),
        )
        .unwrap();
        let wkb = x.as_wkb();
        let back = Temporal::<PointValue>::from_wkb(&wkb).unwrap();
        assert_eq!(back, x);
        match &back {
            Temporal::Instant(i) => {
                assert_eq!(i.value().srid(), 3857);
                assert_eq!(i.value().z(), Some(3.0));
            }
            other => panic!("expected an instant, got {}", other.subtype_name()),
        }
    }

    #[test]
    fn test_geodetic_point_roundtrip() {
        let x = Temporal::instant(crate::point::PointValue::geog(-74.0, 40.7), ts(0)).unwrap();
        let back = Temporal::<PointValue>::from_wkb(&x.as_wkb()).unwrap();
        assert_eq!(back, x);
        assert!(back.is_geodetic());
    }

    #[test]
    fn test_text_and_bool_roundtrip() {
        let x = Temporal::instant(Text::from("déjà vu"), ts(0)).unwrap();
        let back = Temporal::<Text>::from_wkb(&x.as_wkb()).unwrap();
        assert_eq!(back, x);

        let instants = vec![
            TInstant::new(true, ts(0)).unwrap(),
            TInstant::new(false, ts(10)).unwrap(),
        ];
        let x = Temporal::InstantSet(TInstantSet::new(instants).unwrap());
        let back = Temporal::<bool>::from_wkb(&x.as_wkb()).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_step_interp_preserved() {
        let instants = vec![
            TInstant::new(1.0f64, ts(0)).unwrap(),
            TInstant::new(2.0, ts(10)).unwrap(),
        ];
        let x = Temporal::Sequence(
            TSequence::new(instants, true, true, TInterpolation::Step).unwrap(),
        );
        let back = Temporal::<f64>::from_wkb(&x.as_wkb()).unwrap();
        assert_eq!(back.interpolation(), TInterpolation::Step);
        assert_eq!(back, x);
    }

    #[test]
    fn test_rejects_corrupt_input() {
        assert!(Temporal::<f64>::from_wkb(&[]).is_err());
        assert!(Temporal::<f64>::from_wkb(&[0x05, 3, 1, 0]).is_err());
        let x = Temporal::instant(1.5f64, ts(0)).unwrap();
        let mut wkb = x.as_wkb();
        wkb.truncate(wkb.len() - 2);
        assert!(Temporal::<f64>::from_wkb(&wkb).is_err());
        // Base type id mismatch.
        assert!(Temporal::<i64>::from_wkb(&x.as_wkb()).is_err());
    }
}
