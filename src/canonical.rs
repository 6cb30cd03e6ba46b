//! Canonical JSON (RFC 8785, JCS).
//!
//! Signed request bodies and action hashes must be byte-identical across the
//! Rust, TypeScript, Go and Python implementations. JCS pins that encoding:
//!
//! - object members sorted by the UTF-16 code units of their names
//! - no insignificant whitespace
//! - numbers rendered like ECMAScript `Number.prototype.toString`
//! - strings escaped minimally (`"`, `\`, and controls below U+0020 only)

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hashing::sha256_hex;

/// Canonicalizes a JSON value.
///
/// # Errors
///
/// Returns [`Error::Encoding`] for numbers that JSON cannot represent.
///
/// ```
/// let value = serde_json::json!({"b": [1.0, "x"], "a": null});
/// assert_eq!(openleash::canonicalize(&value).unwrap(), r#"{"a":null,"b":[1,"x"]}"#);
/// ```
pub fn canonicalize(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Serializes any `Serialize` value to canonical JSON.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the value cannot be represented as JSON.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    // serde_json maps NaN and infinities to null; catch them first.
    value
        .serialize(finite::FiniteCheck)
        .map_err(|e| Error::Encoding { reason: e.0 })?;
    canonicalize(&serde_json::to_value(value)?)
}

/// The action hash: lowercase hex SHA-256 of the canonical JSON encoding.
///
/// This is the `action_hash` claim a proof token carries for the action it
/// approves.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the action cannot be canonicalized.
pub fn action_hash<T: Serialize + ?Sized>(action: &T) -> Result<String> {
    Ok(sha256_hex(to_canonical_json(action)?.as_bytes()))
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&canonical_number(n)?),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut members: Vec<_> = map.iter().collect();
            members.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (idx, (name, member)) in members.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(out, name);
                out.push(':');
                write_value(out, member)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\u{20}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Largest integer magnitude an IEEE-754 double holds exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

#[allow(clippy::cast_precision_loss)]
fn canonical_number(n: &serde_json::Number) -> Result<String> {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_EXACT_INTEGER {
            return Ok(i.to_string());
        }
        return canonical_f64(i as f64);
    }
    if let Some(u) = n.as_u64() {
        if u <= MAX_EXACT_INTEGER {
            return Ok(u.to_string());
        }
        return canonical_f64(u as f64);
    }
    match n.as_f64() {
        Some(f) => canonical_f64(f),
        None => Err(Error::Encoding {
            reason: format!("unsupported JSON number {n}"),
        }),
    }
}

/// ECMAScript `Number::toString` for finite doubles.
fn canonical_f64(v: f64) -> Result<String> {
    if !v.is_finite() {
        return Err(Error::Encoding {
            reason: "non-finite numbers are not valid JSON".into(),
        });
    }
    if v == 0.0 {
        // -0 renders as 0
        return Ok("0".into());
    }

    let mut buf = ryu::Buffer::new();
    let (digits, n) = shortest_digits(buf.format_finite(v.abs()));
    let k = i64::try_from(digits.len()).unwrap_or(i64::MAX);

    let mut out = String::new();
    if v.is_sign_negative() {
        out.push('-');
    }

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', usize::try_from(n - k).unwrap_or(0)));
    } else if 0 < n && n <= 21 {
        let split = usize::try_from(n).unwrap_or(0);
        out.push_str(&digits[..split]);
        out.push('.');
        out.push_str(&digits[split..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', usize::try_from(-n).unwrap_or(0)));
        out.push_str(&digits);
    } else {
        let exp = n - 1;
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp >= 0 { '+' } else { '-' });
        out.push_str(&exp.abs().to_string());
    }
    Ok(out)
}

/// Splits a rendered positive float into its significant digits and the
/// exponent `n` such that the value is `0.<digits> * 10^n`.
fn shortest_digits(rendered: &str) -> (String, i64) {
    let (mantissa, exp) = match rendered.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().unwrap_or(0)),
        None => (rendered, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let mut n = i64::try_from(int_part.len()).unwrap_or(0) + exp;
    let all = format!("{int_part}{frac_part}");
    let trimmed = all.trim_start_matches('0');
    n -= i64::try_from(all.len() - trimmed.len()).unwrap_or(0);

    (trimmed.trim_end_matches('0').to_string(), n)
}

/// A serializer that produces nothing and fails on non-finite floats.
mod finite {
    use serde::Serialize;
    use serde::ser::{
        self, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
        SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
    };

    #[derive(Debug)]
    pub(super) struct NonFinite(pub(super) String);

    impl std::fmt::Display for NonFinite {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for NonFinite {}

    impl ser::Error for NonFinite {
        fn custom<T: std::fmt::Display>(msg: T) -> Self {
            Self(msg.to_string())
        }
    }

    type Done = Result<(), NonFinite>;

    #[derive(Clone, Copy)]
    pub(super) struct FiniteCheck;

    fn check(v: f64) -> Done {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite(format!(
                "non-finite number {v} has no JSON representation"
            )))
        }
    }

    impl Serializer for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        fn serialize_bool(self, _: bool) -> Done {
            Ok(())
        }
        fn serialize_i8(self, _: i8) -> Done {
            Ok(())
        }
        fn serialize_i16(self, _: i16) -> Done {
            Ok(())
        }
        fn serialize_i32(self, _: i32) -> Done {
            Ok(())
        }
        fn serialize_i64(self, _: i64) -> Done {
            Ok(())
        }
        fn serialize_i128(self, _: i128) -> Done {
            Ok(())
        }
        fn serialize_u8(self, _: u8) -> Done {
            Ok(())
        }
        fn serialize_u16(self, _: u16) -> Done {
            Ok(())
        }
        fn serialize_u32(self, _: u32) -> Done {
            Ok(())
        }
        fn serialize_u64(self, _: u64) -> Done {
            Ok(())
        }
        fn serialize_u128(self, _: u128) -> Done {
            Ok(())
        }
        fn serialize_f32(self, v: f32) -> Done {
            check(f64::from(v))
        }
        fn serialize_f64(self, v: f64) -> Done {
            check(v)
        }
        fn serialize_char(self, _: char) -> Done {
            Ok(())
        }
        fn serialize_str(self, _: &str) -> Done {
            Ok(())
        }
        fn serialize_bytes(self, _: &[u8]) -> Done {
            Ok(())
        }
        fn serialize_none(self) -> Done {
            Ok(())
        }
        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Done {
            value.serialize(self)
        }
        fn serialize_unit(self) -> Done {
            Ok(())
        }
        fn serialize_unit_struct(self, _: &'static str) -> Done {
            Ok(())
        }
        fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Done {
            Ok(())
        }
        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            value: &T,
        ) -> Done {
            value.serialize(self)
        }
        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            value: &T,
        ) -> Done {
            value.serialize(self)
        }
        fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple(self, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_struct_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
    }

    impl SerializeSeq for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeTuple for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeTupleStruct for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeTupleVariant for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeMap for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Done {
            key.serialize(*self)
        }
        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeStruct for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }

    impl SerializeStructVariant for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Done {
            value.serialize(*self)
        }
        fn end(self) -> Done {
            Ok(())
        }
    }
}
