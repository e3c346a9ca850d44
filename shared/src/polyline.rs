//! Encoded polyline codec (signed delta, zig-zag, 5-bit chunks, base 63).
//!
//! Decoding yields `(lat, lon)` pairs in the order they appear in the
//! string. Turning them into [`Coordinate`](crate::Coordinate) values,
//! which are `(lon, lat)`, is left to the caller.

/// Digits of precision used by routing services by default (factor 1e5).
pub const DEFAULT_PRECISION: u32 = 5;

const MAX_PRECISION: u32 = 10;
const ALPHABET_START: u8 = 63;
const ALPHABET_END: u8 = 126;
const CONTINUATION: u64 = 0x20;
const CHUNK_MASK: u64 = 0x1f;
// 12 chunks carry 60 bits; anything longer cannot be a real coordinate.
const MAX_CHUNKS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid polyline character {character:?} at byte {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("polyline ends inside an unterminated value at byte {position}")]
    Truncated { position: usize },
    #[error("polyline value starting at byte {position} overflows")]
    Overflow { position: usize },
    #[error("polyline has a latitude without a longitude at byte {position}")]
    DanglingLatitude { position: usize },
    #[error("unsupported polyline precision {0}")]
    Precision(u32),
}

pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>, DecodeError> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

pub fn decode_with_precision(
    encoded: &str,
    precision: u32,
) -> Result<Vec<(f64, f64)>, DecodeError> {
    let factor = precision_factor(precision)?;
    let mut cursor = Cursor {
        text: encoded,
        index: 0,
    };
    let mut lat = 0i64;
    let mut lon = 0i64;
    let mut points = Vec::with_capacity(encoded.len() / 4);

    while !cursor.is_done() {
        let lat_start = cursor.index;
        lat = lat
            .checked_add(cursor.next_value()?)
            .ok_or(DecodeError::Overflow { position: lat_start })?;
        if cursor.is_done() {
            return Err(DecodeError::DanglingLatitude {
                position: lat_start,
            });
        }
        let lon_start = cursor.index;
        lon = lon
            .checked_add(cursor.next_value()?)
            .ok_or(DecodeError::Overflow { position: lon_start })?;
        points.push((lat as f64 / factor, lon as f64 / factor));
    }

    Ok(points)
}

/// Encodes `(lat, lon)` pairs. Values are rounded half away from zero at
/// the given precision before deltas are taken.
pub fn encode(points: &[(f64, f64)]) -> String {
    encode_with_precision(points, DEFAULT_PRECISION).unwrap_or_default()
}

pub fn encode_with_precision(points: &[(f64, f64)], precision: u32) -> Result<String, DecodeError> {
    let factor = precision_factor(precision)?;
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;

    for &(lat, lon) in points {
        let lat = (lat * factor).round() as i64;
        let lon = (lon * factor).round() as i64;
        push_value(lat - prev_lat, &mut out);
        push_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }

    Ok(out)
}

fn precision_factor(precision: u32) -> Result<f64, DecodeError> {
    if precision > MAX_PRECISION {
        return Err(DecodeError::Precision(precision));
    }
    Ok(10f64.powi(precision as i32))
}

fn push_value(delta: i64, out: &mut String) {
    let mut value = delta << 1;
    if delta < 0 {
        value = !value;
    }
    let mut value = value as u64;
    while value >= CONTINUATION {
        out.push(char::from((CONTINUATION | (value & CHUNK_MASK)) as u8 + ALPHABET_START));
        value >>= 5;
    }
    out.push(char::from(value as u8 + ALPHABET_START));
}

struct Cursor<'a> {
    text: &'a str,
    index: usize,
}

impl Cursor<'_> {
    fn is_done(&self) -> bool {
        self.index >= self.text.len()
    }

    fn next_value(&mut self) -> Result<i64, DecodeError> {
        let start = self.index;
        let bytes = self.text.as_bytes();
        let mut result = 0u64;
        let mut chunks = 0u32;

        loop {
            let Some(&byte) = bytes.get(self.index) else {
                return Err(DecodeError::Truncated {
                    position: self.index,
                });
            };
            if !(ALPHABET_START..=ALPHABET_END).contains(&byte) {
                // Every byte before this one was ASCII, so the index sits on
                // a char boundary.
                let character = self.text[self.index..].chars().next().unwrap_or('\u{fffd}');
                return Err(DecodeError::InvalidCharacter {
                    character,
                    position: self.index,
                });
            }
            if chunks == MAX_CHUNKS {
                return Err(DecodeError::Overflow { position: start });
            }

            let chunk = u64::from(byte - ALPHABET_START);
            result |= (chunk & CHUNK_MASK) << (chunks * 5);
            chunks += 1;
            self.index += 1;

            if chunk < CONTINUATION {
                break;
            }
        }

        let magnitude = (result >> 1) as i64;
        Ok(if result & 1 == 1 { !magnitude } else { magnitude })
    }
}
