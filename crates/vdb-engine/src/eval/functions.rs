//! Built-in scalar functions and the LIKE matcher.

use chrono::Local;

use crate::error::{EngineError, Result};
use crate::value::Value;

/// Returns true when `name` is a built-in scalar function.
#[must_use]
pub(crate) fn is_builtin_scalar(name: &str) -> bool {
    matches!(
        name,
        "UPPER"
            | "LOWER"
            | "LENGTH"
            | "TRIM"
            | "SUBSTR"
            | "REPLACE"
            | "INSTR"
            | "CONCAT"
            | "ABS"
            | "ROUND"
            | "FLOOR"
            | "CEIL"
            | "COALESCE"
            | "IFNULL"
            | "NULLIF"
    )
}

/// Calls a built-in scalar function. Out-of-range string indexing yields
/// NULL rather than an error.
pub(crate) fn call_scalar(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "UPPER" => Ok(text_fn(args, 1, |s| Value::Text(s.to_uppercase()))),
        "LOWER" => Ok(text_fn(args, 1, |s| Value::Text(s.to_lowercase()))),
        "LENGTH" => Ok(text_fn(args, 1, |s| {
            Value::Integer(s.chars().count() as i64)
        })),
        "TRIM" => Ok(text_fn(args, 1, |s| Value::Text(String::from(s.trim())))),
        "SUBSTR" => substr(args),
        "REPLACE" => replace(args),
        "INSTR" => instr(args),
        "CONCAT" => concat(args),
        "ABS" => abs(args),
        "ROUND" => round(args),
        "FLOOR" => Ok(float_fn(args, f64::floor)),
        "CEIL" => Ok(float_fn(args, f64::ceil)),
        "COALESCE" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        "IFNULL" => {
            expect_arity(name, args, 2)?;
            Ok(if args[0].is_null() {
                args[1].clone()
            } else {
                args[0].clone()
            })
        }
        "NULLIF" => {
            expect_arity(name, args, 2)?;
            Ok(if args[0].sql_eq(&args[1]).is_true() {
                Value::Null
            } else {
                args[0].clone()
            })
        }
        other => Err(EngineError::Resolution(format!(
            "unknown function: {other}"
        ))),
    }
}

/// Formats the current date per `CURRENT_DATE`.
pub(crate) fn current_date() -> Value {
    Value::Text(Local::now().format("%Y-%m-%d").to_string())
}

/// Formats the current time per `CURRENT_TIME`.
pub(crate) fn current_time() -> Value {
    Value::Text(Local::now().format("%H:%M:%S").to_string())
}

/// Formats the current timestamp per `CURRENT_TIMESTAMP`.
pub(crate) fn current_timestamp() -> Value {
    Value::Text(Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
}

fn expect_arity(name: &str, args: &[Value], arity: usize) -> Result<()> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(EngineError::Type(format!(
            "{name} expects {arity} argument(s), got {}",
            args.len()
        )))
    }
}

fn text_fn(args: &[Value], arity: usize, f: impl Fn(&str) -> Value) -> Value {
    if args.len() != arity {
        return Value::Null;
    }
    match args[0].to_text() {
        Some(s) => f(&s),
        None => Value::Null,
    }
}

fn float_fn(args: &[Value], f: fn(f64) -> f64) -> Value {
    match args.first() {
        Some(Value::Integer(i)) => Value::Integer(*i),
        Some(Value::Float(v)) => {
            let rounded = f(*v);
            Value::Integer(rounded as i64)
        }
        _ => Value::Null,
    }
}

fn substr(args: &[Value]) -> Result<Value> {
    if !(2..=3).contains(&args.len()) {
        return Err(EngineError::Type(String::from(
            "SUBSTR expects 2 or 3 arguments",
        )));
    }
    let Some(s) = args[0].to_text() else {
        return Ok(Value::Null);
    };
    let Some(start) = args[1].as_integer() else {
        return Ok(Value::Null);
    };
    let len = match args.get(2) {
        Some(v) => match v.as_integer() {
            Some(n) => Some(n),
            None => return Ok(Value::Null),
        },
        None => None,
    };

    let chars: Vec<char> = s.chars().collect();
    // 1-indexed start; non-positive or past-the-end starts yield NULL.
    if start < 1 || start as usize > chars.len() {
        return Ok(Value::Null);
    }
    let begin = (start - 1) as usize;
    let end = match len {
        Some(n) if n < 0 => return Ok(Value::Null),
        Some(n) => usize::min(begin + n as usize, chars.len()),
        None => chars.len(),
    };
    Ok(Value::Text(chars[begin..end].iter().collect()))
}

fn replace(args: &[Value]) -> Result<Value> {
    expect_arity("REPLACE", args, 3)?;
    match (args[0].to_text(), args[1].to_text(), args[2].to_text()) {
        (Some(s), Some(from), Some(to)) if !from.is_empty() => {
            Ok(Value::Text(s.replace(&from, &to)))
        }
        (Some(s), Some(_), Some(_)) => Ok(Value::Text(s)),
        _ => Ok(Value::Null),
    }
}

fn instr(args: &[Value]) -> Result<Value> {
    expect_arity("INSTR", args, 2)?;
    match (args[0].to_text(), args[1].to_text()) {
        (Some(s), Some(needle)) => {
            let position = s.find(&needle).map_or(0, |byte_pos| {
                // 1-indexed character position.
                s[..byte_pos].chars().count() as i64 + 1
            });
            Ok(Value::Integer(position))
        }
        _ => Ok(Value::Null),
    }
}

fn concat(args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for arg in args {
        match arg.to_text() {
            Some(s) => out.push_str(&s),
            None => return Ok(Value::Null),
        }
    }
    Ok(Value::Text(out))
}

fn abs(args: &[Value]) -> Result<Value> {
    expect_arity("ABS", args, 1)?;
    Ok(match &args[0] {
        Value::Integer(i) => Value::Integer(i.abs()),
        Value::Float(v) => Value::Float(v.abs()),
        _ => Value::Null,
    })
}

fn round(args: &[Value]) -> Result<Value> {
    if !(1..=2).contains(&args.len()) {
        return Err(EngineError::Type(String::from(
            "ROUND expects 1 or 2 arguments",
        )));
    }
    let digits = match args.get(1) {
        Some(v) => match v.as_integer() {
            Some(n) => n,
            None => return Ok(Value::Null),
        },
        None => 0,
    };
    Ok(match &args[0] {
        Value::Integer(i) => {
            if digits >= 0 {
                Value::Integer(*i)
            } else {
                Value::Float((*i as f64 / 10f64.powi(-digits as i32)).round()
                    * 10f64.powi(-digits as i32))
            }
        }
        Value::Float(v) => {
            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
            Value::Float((v * factor).round() / factor)
        }
        _ => Value::Null,
    })
}

/// SQL LIKE: `%` matches any run (including empty), `_` matches exactly
/// one character; matching is ASCII case-insensitive.
#[must_use]
pub(crate) fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    like_rec(&text, &pattern)
}

fn like_rec(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            // Greedy backtracking over the rest of the text.
            (0..=text.len()).any(|skip| like_rec(&text[skip..], &pattern[1..]))
        }
        Some('_') => !text.is_empty() && like_rec(&text[1..], &pattern[1..]),
        Some(c) => text.first() == Some(c) && like_rec(&text[1..], &pattern[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substr_one_indexed() {
        assert_eq!(
            call_scalar("SUBSTR", &[Value::from("hello"), Value::Integer(2)]).unwrap(),
            Value::from("ello")
        );
        assert_eq!(
            call_scalar(
                "SUBSTR",
                &[Value::from("hello"), Value::Integer(2), Value::Integer(3)]
            )
            .unwrap(),
            Value::from("ell")
        );
        // Out of range yields NULL.
        assert_eq!(
            call_scalar("SUBSTR", &[Value::from("hi"), Value::Integer(9)]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_instr() {
        assert_eq!(
            call_scalar("INSTR", &[Value::from("hello"), Value::from("ll")]).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            call_scalar("INSTR", &[Value::from("hello"), Value::from("z")]).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_coalesce_and_friends() {
        assert_eq!(
            call_scalar("COALESCE", &[Value::Null, Value::Null, Value::Integer(3)]).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            call_scalar("IFNULL", &[Value::Null, Value::Integer(7)]).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            call_scalar("NULLIF", &[Value::Integer(1), Value::Integer(1)]).unwrap(),
            Value::Null
        );
        assert_eq!(
            call_scalar("NULLIF", &[Value::Integer(1), Value::Integer(2)]).unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_round() {
        assert_eq!(
            call_scalar("ROUND", &[Value::Float(3.456), Value::Integer(2)]).unwrap(),
            Value::Float(3.46)
        );
        assert_eq!(
            call_scalar("ROUND", &[Value::Float(3.5)]).unwrap(),
            Value::Float(4.0)
        );
    }

    #[test]
    fn test_null_in_propagates() {
        assert_eq!(
            call_scalar("UPPER", &[Value::Null]).unwrap(),
            Value::Null
        );
        assert_eq!(
            call_scalar("CONCAT", &[Value::from("a"), Value::Null]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_like() {
        assert!(like_match("hello", "h%"));
        assert!(like_match("hello", "%LLO"));
        assert!(like_match("hello", "h_llo"));
        assert!(!like_match("hello", "h_lo"));
        assert!(like_match("", "%"));
        assert!(!like_match("", "_"));
        assert!(like_match("abc", "abc"));
    }

    #[test]
    fn test_current_timestamp_shape() {
        let Value::Text(ts) = current_timestamp() else {
            panic!("expected text");
        };
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
