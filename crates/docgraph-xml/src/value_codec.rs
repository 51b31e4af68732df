//! Text encoding of primitive values.
//!
//! Decoding never fails hard: a value that cannot be parsed is logged and treated as
//! absent, so one bad attribute does not abort a whole graph.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use docgraph_model::{EnumType, Scalar, ScalarKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Suffix of value-wrapper element names.
pub const WRAPPER_SUFFIX: &str = "-wrapper";

/// Element name wrapping a value of the named type.
pub fn wrapper_tag(type_name: &str) -> String {
    format!("{type_name}{WRAPPER_SUFFIX}")
}

/// The type name inside a `<name>-wrapper` tag.
pub fn strip_wrapper(tag: &str) -> Option<&str> {
    tag.strip_suffix(WRAPPER_SUFFIX)
}

/// Encode one scalar as text.
pub fn encode_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Integer(v) => v.to_string(),
        Scalar::Real(v) => v.to_string(),
        Scalar::Boolean(v) => v.to_string(),
        Scalar::String(v) => v.clone(),
        Scalar::Timestamp(v) => format_timestamp(*v),
        Scalar::Binary(v) => encode_binary(v),
    }
}

/// Decode one scalar, logging and returning `None` when the text does not parse.
pub fn decode_scalar(
    kind: ScalarKind,
    text: &str,
    trim_strings: bool,
    context: &str,
) -> Option<Scalar> {
    let trimmed = text.trim();
    let parsed = match kind {
        ScalarKind::Integer => trimmed.parse().ok().map(Scalar::Integer),
        ScalarKind::Real => trimmed.parse().ok().map(Scalar::Real),
        ScalarKind::Boolean => parse_boolean(trimmed).map(Scalar::Boolean),
        ScalarKind::String => Some(Scalar::String(if trim_strings {
            trimmed.to_string()
        } else {
            text.to_string()
        })),
        ScalarKind::Timestamp => parse_timestamp(trimmed).map(Scalar::Timestamp),
        ScalarKind::Binary => decode_binary(trimmed).map(Scalar::Binary),
    };
    if parsed.is_none() {
        tracing::warn!(field = context, value = text, %kind, "unparsable value, leaving it unset");
    }
    parsed
}

/// Space-delimited sequence of scalars.
pub fn encode_list(values: &[Scalar]) -> String {
    values
        .iter()
        .map(encode_scalar)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a space-delimited sequence, skipping items that do not parse.
pub fn decode_list(kind: ScalarKind, text: &str, context: &str) -> Vec<Scalar> {
    text.split_whitespace()
        .filter_map(|token| decode_scalar(kind, token, true, context))
        .collect()
}

/// Flatten rows into one space-delimited sequence.
pub fn encode_matrix(rows: &[Vec<Scalar>]) -> String {
    rows.iter()
        .flatten()
        .map(encode_scalar)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Re-chunk a flattened sequence into rows of `columns` values.
pub fn decode_matrix(
    kind: ScalarKind,
    columns: usize,
    text: &str,
    context: &str,
) -> Vec<Vec<Scalar>> {
    chunk_rows(decode_list(kind, text, context), columns, context)
}

pub(crate) fn chunk_rows(flat: Vec<Scalar>, columns: usize, context: &str) -> Vec<Vec<Scalar>> {
    let columns = columns.max(1);
    if flat.len() % columns != 0 {
        tracing::warn!(
            field = context,
            values = flat.len(),
            columns,
            "incomplete trailing row dropped"
        );
    }
    let mut rows: Vec<Vec<Scalar>> = flat.chunks(columns).map(<[Scalar]>::to_vec).collect();
    rows.retain(|row| row.len() == columns);
    rows
}

/// Lower-cased symbol, as written on the wire.
pub fn encode_enum(symbol: &str) -> String {
    symbol.to_ascii_lowercase()
}

/// Map wire text back to the enumeration's own spelling.
pub fn decode_enum(enumeration: &EnumType, text: &str, context: &str) -> Option<String> {
    let symbol = enumeration.symbol(text.trim()).map(str::to_string);
    if symbol.is_none() {
        tracing::warn!(
            field = context,
            value = text,
            enumeration = %enumeration.name,
            "unknown enumeration symbol, leaving it unset"
        );
    }
    symbol
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp, also accepting offsets and bare dates.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Modulus digit followed by upper-case hex pairs.
pub fn encode_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(1 + bytes.len() * 2);
    out.push('0');
    out.push_str(&hex::encode_upper(bytes));
    out
}

/// Decode binary text; an odd digit count after the modulus means a leading half byte.
pub fn decode_binary(text: &str) -> Option<Vec<u8>> {
    let mut chars = text.chars();
    let modulus = chars.next()?;
    if !matches!(modulus, '0'..='3') {
        return None;
    }
    let digits = chars.as_str();
    if !digits.is_ascii() {
        return None;
    }
    if digits.len() % 2 == 1 {
        let (head, rest) = digits.split_at(1);
        let lead = u8::from_str_radix(head, 16).ok()?;
        let mut bytes = vec![lead];
        bytes.extend(hex::decode(rest).ok()?);
        Some(bytes)
    } else {
        hex::decode(digits).ok()
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}
