use std::{borrow::Cow, collections::BTreeMap};

use textdef::{ActionError, Value};

use crate::json::Json;

fn shape() -> ActionError {
    Cow::Borrowed("unexpected result shape")
}

/// `"0"`..`"9"` or an already decoded digit.
pub(crate) fn digit(value: Value) -> Result<Value, ActionError> {
    match value {
        Value::Number(_) => Ok(value),
        Value::Text(text) => text
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| Value::Number(d as f64))
            .ok_or_else(|| format!("{text:?} is not a decimal digit").into()),
        _ => Err(shape()),
    }
}

pub(crate) fn hex_digit(value: Value) -> Result<Value, ActionError> {
    match value {
        Value::Number(_) => Ok(value),
        Value::Text(text) => text
            .chars()
            .next()
            .and_then(|c| c.to_digit(16))
            .map(|d| Value::Number(d as f64))
            .ok_or_else(|| format!("{text:?} is not a hexadecimal digit").into()),
        _ => Err(shape()),
    }
}

/// Flattens `first repeat(rest)` into the digits it matched.
fn digits(value: &Value) -> Result<Vec<f64>, ActionError> {
    let [first, rest] = value.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };
    let mut digits = vec![first.as_number().ok_or_else(shape)?];
    for digit in rest.as_slice().ok_or_else(shape)? {
        digits.push(digit.as_number().ok_or_else(shape)?);
    }
    Ok(digits)
}

fn integer(digits: &[f64]) -> f64 {
    digits.iter().fold(0.0, |acc, d| acc * 10.0 + d)
}

/// `[sign, integer, fraction, exponent]` into a single number.
pub(crate) fn number(value: Value) -> Result<Value, ActionError> {
    let [sign, int, fraction, exponent] = value.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };

    let sign = match sign.as_str() {
        Some("-") => -1.0,
        _ => 1.0,
    };

    let int = match int.as_str() {
        Some(_) => 0.0,
        None => integer(&digits(int)?),
    };

    // accumulate from the last digit so that each one is divided the right number of times
    let fraction = match fraction.as_slice() {
        Some([_, digits_value]) => digits(digits_value)?
            .iter()
            .rev()
            .fold(0.0, |acc, d| (acc + d) / 10.0),
        Some(_) => return Err(shape()),
        None => 0.0,
    };

    let exponent = match exponent.as_slice() {
        Some([_, sign, digits_value]) => {
            let magnitude = integer(&digits(digits_value)?);
            match sign.as_str() {
                Some("-") => -magnitude,
                _ => magnitude,
            }
        }
        Some(_) => return Err(shape()),
        None => 0.0,
    };

    // out of range exponents saturate to infinity or zero instead of failing
    Ok(Value::Number(sign * (int + fraction) * 10f64.powf(exponent)))
}

enum Piece<'a> {
    Text(&'a str),
    Unit(u32),
}

fn piece(item: &Value) -> Result<Piece<'_>, ActionError> {
    if let Some(text) = item.as_str() {
        return Ok(Piece::Text(text));
    }

    let [_, escape] = item.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };
    if let Some(escape) = escape.as_str() {
        let text = match escape {
            "\"" => "\"",
            "\\" => "\\",
            "/" => "/",
            "b" => "\u{8}",
            "f" => "\u{c}",
            "n" => "\n",
            "r" => "\r",
            "t" => "\t",
            _ => return Err(format!("unknown escape \\{escape}").into()),
        };
        return Ok(Piece::Text(text));
    }

    let [_, hex] = escape.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };
    let unit = hex
        .as_slice()
        .ok_or_else(shape)?
        .iter()
        .try_fold(0u32, |acc, d| d.as_number().map(|d| acc * 16 + d as u32))
        .ok_or_else(shape)?;
    Ok(Piece::Unit(unit))
}

/// `[quote, repeat(character), quote]` into the decoded text.
pub(crate) fn string(value: Value) -> Result<Value, ActionError> {
    let [_, characters, _] = value.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };
    let pieces = characters
        .as_slice()
        .ok_or_else(shape)?
        .iter()
        .map(piece)
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = String::new();
    let mut pieces = pieces.into_iter().peekable();
    while let Some(piece) = pieces.next() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Unit(high @ 0xD800..=0xDBFF) => {
                let Some(&Piece::Unit(low @ 0xDC00..=0xDFFF)) = pieces.peek() else {
                    return Err(format!("unpaired surrogate \\u{high:04X}").into());
                };
                pieces.next();
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                out.push(char::from_u32(code).ok_or_else(shape)?);
            }
            Piece::Unit(unit) => match char::from_u32(unit) {
                Some(c) => out.push(c),
                None => return Err(format!("unpaired surrogate \\u{unit:04X}").into()),
            },
        }
    }

    Ok(Value::Text(out))
}

/// Items of `first repeat([separator, item])`.
fn separated(value: &Value) -> Result<Vec<&Value>, ActionError> {
    let [first, rest] = value.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };
    let mut items = vec![first];
    for pair in rest.as_slice().ok_or_else(shape)? {
        let [_, item] = pair.as_slice().ok_or_else(shape)? else {
            return Err(shape());
        };
        items.push(item);
    }
    Ok(items)
}

fn convert(value: &Value) -> Result<Json, ActionError> {
    let [_, inner, _] = value.as_slice().ok_or_else(shape)? else {
        return Err(shape());
    };

    if let Some(keyword) = inner.as_str() {
        return match keyword {
            "true" => Ok(Json::Bool(true)),
            "false" => Ok(Json::Bool(false)),
            "null" => Ok(Json::Null),
            _ => Err(format!("unknown keyword {keyword:?}").into()),
        };
    }

    let (label, value) = inner.as_capture().ok_or_else(shape)?;
    match label {
        "number" => value.as_number().map(Json::Number).ok_or_else(shape),
        "string" => value
            .as_str()
            .map(|s| Json::String(s.to_owned()))
            .ok_or_else(shape),
        "array" => {
            let [_, items, _] = value.as_slice().ok_or_else(shape)? else {
                return Err(shape());
            };
            match items.as_capture() {
                Some(("items", items)) => separated(items)?
                    .into_iter()
                    .map(convert)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Json::Array),
                Some(("empty", _)) => Ok(Json::Array(Vec::new())),
                _ => Err(shape()),
            }
        }
        "object" => {
            let [_, pairs, _] = value.as_slice().ok_or_else(shape)? else {
                return Err(shape());
            };
            let mut fields = BTreeMap::new();
            match pairs.as_capture() {
                Some(("pair", pairs)) => {
                    for pair in separated(pairs)? {
                        let [_, key, _, _, value] = pair.as_slice().ok_or_else(shape)? else {
                            return Err(shape());
                        };
                        let key = key.as_str().ok_or_else(shape)?;
                        fields.insert(key.to_owned(), convert(value)?);
                    }
                }
                Some(("empty", _)) => {}
                _ => return Err(shape()),
            }
            Ok(Json::Object(fields))
        }
        _ => Err(format!("unknown capture {label:?}").into()),
    }
}

/// `[whitespace, inner, whitespace]` into a [`Json`] document.
pub(crate) fn json(value: Value) -> Result<Value, ActionError> {
    convert(&value).map(Value::custom)
}
