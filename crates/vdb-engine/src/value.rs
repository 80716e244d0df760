//! Cell values and their SQL semantics.

use core::cmp::Ordering;
use core::fmt;

/// A single cell value.
///
/// NULL is a distinguished tag, never conflated with the zero of another
/// type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed 64-bit integer.
    Integer(i64),
    /// IEEE-754 double.
    Float(f64),
    /// Unicode text.
    Text(String),
    /// Opaque bytes.
    Blob(Vec<u8>),
    /// Boolean; surfaces as 0/1 in projected rows.
    Boolean(bool),
}

/// Three-valued logic truth value for predicate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    /// Definitely true.
    True,
    /// Definitely false.
    False,
    /// NULL / unknown.
    Unknown,
}

impl Truth {
    /// Kleene AND.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Kleene OR.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Kleene NOT.
    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }

    /// Returns true only for [`Truth::True`]; WHERE keeps only such rows.
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Converts to a value: TRUE/FALSE become booleans, Unknown is NULL.
    #[must_use]
    pub const fn into_value(self) -> Value {
        match self {
            Self::True => Value::Boolean(true),
            Self::False => Value::Boolean(false),
            Self::Unknown => Value::Null,
        }
    }

    /// Converts a boolean.
    #[must_use]
    pub const fn from_bool(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}

impl Value {
    /// Returns true if this is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interprets this value as a predicate result.
    ///
    /// NULL is Unknown; numbers are true when non-zero; text and blobs are
    /// true when non-empty.
    #[must_use]
    pub fn truth(&self) -> Truth {
        match self {
            Self::Null => Truth::Unknown,
            Self::Boolean(b) => Truth::from_bool(*b),
            Self::Integer(i) => Truth::from_bool(*i != 0),
            Self::Float(f) => Truth::from_bool(*f != 0.0),
            Self::Text(s) => Truth::from_bool(!s.is_empty()),
            Self::Blob(b) => Truth::from_bool(!b.is_empty()),
        }
    }

    /// Returns the numeric interpretation, if any. Booleans count as 0/1.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Returns the integer interpretation, if the value is an integer or
    /// boolean.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Converts to text for `||` and the string functions. NULL has no
    /// text form.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Self::Boolean(b) => Some(if *b { String::from("1") } else { String::from("0") }),
        }
    }

    /// The form a value takes in a projected result row: booleans surface
    /// as 0/1 integers, everything else is unchanged.
    #[must_use]
    pub fn surfaced(self) -> Self {
        match self {
            Self::Boolean(b) => Self::Integer(i64::from(b)),
            other => other,
        }
    }

    /// SQL equality with three-valued logic. NULL operands yield Unknown;
    /// numerics compare across integer/float/boolean.
    #[must_use]
    pub fn sql_eq(&self, other: &Self) -> Truth {
        match self.sql_cmp(other) {
            Some(ordering) => Truth::from_bool(ordering == Ordering::Equal),
            None => Truth::Unknown,
        }
    }

    /// SQL ordering comparison. Returns `None` when either side is NULL or
    /// the types are incomparable.
    #[must_use]
    pub fn sql_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Blob(a), Self::Blob(b)) => Some(a.cmp(b)),
            (a, b) => {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                x.partial_cmp(&y)
            }
        }
    }

    /// Total ordering used for ORDER BY and grouping: NULL sorts first,
    /// then numerics, then text, then blobs. NULLs compare equal to each
    /// other here (they group together).
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => 1,
                Value::Text(_) => 2,
                Value::Blob(_) => 3,
            }
        }

        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (
                    a.as_f64().expect("rank 1 is numeric"),
                    b.as_f64().expect("rank 1 is numeric"),
                );
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    // ---- arithmetic ------------------------------------------------------

    /// Addition. NULL or non-numeric operands yield NULL.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.numeric_op(other, i64::checked_add, |a, b| a + b)
    }

    /// Subtraction.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.numeric_op(other, i64::checked_sub, |a, b| a - b)
    }

    /// Multiplication.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        self.numeric_op(other, i64::checked_mul, |a, b| a * b)
    }

    /// Division. Integer division yields an integer only when the
    /// remainder is zero, otherwise a float. Division by zero yields NULL.
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            if b == 0 {
                return Self::Null;
            }
            if a % b == 0 {
                return Self::Integer(a / b);
            }
            return Self::Float(a as f64 / b as f64);
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Self::Null,
            (Some(a), Some(b)) => Self::Float(a / b),
            _ => Self::Null,
        }
    }

    /// Modulus. Zero divisor yields NULL.
    #[must_use]
    pub fn rem(&self, other: &Self) -> Self {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            if b == 0 {
                return Self::Null;
            }
            return Self::Integer(a % b);
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Self::Null,
            (Some(a), Some(b)) => Self::Float(a % b),
            _ => Self::Null,
        }
    }

    /// Exponentiation. Integer bases with non-negative integer exponents
    /// stay integers when the result is exact; everything else is a float.
    #[must_use]
    pub fn pow(&self, other: &Self) -> Self {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            if (0..=u32::MAX as i64).contains(&b) {
                if let Ok(exp) = u32::try_from(b) {
                    if let Some(result) = a.checked_pow(exp) {
                        return Self::Integer(result);
                    }
                }
            }
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Self::Float(a.powf(b)),
            _ => Self::Null,
        }
    }

    /// String concatenation: operands convert to text, NULL propagates.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        match (self.to_text(), other.to_text()) {
            (Some(a), Some(b)) => Self::Text(a + &b),
            _ => Self::Null,
        }
    }

    /// Arithmetic negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        match self {
            Self::Integer(i) => Self::Integer(-i),
            Self::Float(f) => Self::Float(-f),
            Self::Boolean(b) => Self::Integer(-i64::from(*b)),
            _ => Self::Null,
        }
    }

    /// Integer-preserving binary arithmetic: integer operands stay
    /// integers (widening to float on overflow), any float operand makes
    /// the result a float, NULL or non-numeric operands yield NULL.
    fn numeric_op(
        &self,
        other: &Self,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Self {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return match int_op(a, b) {
                Some(result) => Self::Integer(result),
                None => Self::Float(float_op(a as f64, b as f64)),
            };
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Self::Float(float_op(a, b)),
            _ => Self::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            Self::Boolean(b) => f.write_str(if *b { "1" } else { "0" }),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(String::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A dedup/grouping key over a tuple of values, ordered by
/// [`Value::total_cmp`] so NULLs group together and `1` equals `1.0`.
#[derive(Debug, Clone)]
pub struct ValueKey(pub Vec<Value>);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.0.iter();
        let mut right = other.0.iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => match a.total_cmp(b) {
                    Ordering::Equal => {}
                    non_eq => return non_eq,
                },
            }
        }
    }
}
