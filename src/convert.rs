//! Conversion between raw secret bytes and typed field values.

use std::str;
use std::time::Duration;

use crate::error::ConvertError;

/// Conversion between raw secret bytes and a field value.
///
/// `from_bytes` parses the fetched (post-fragment) bytes; `to_bytes` renders
/// the value back for snapshot comparison and is the inverse of
/// `from_bytes` for values the type can represent.
///
/// Implement this for custom field types (the equivalent of a textual
/// unmarshaler), then register the type with
/// [`value_slot!`](crate::value_slot) so the walker accepts it:
///
/// ```
/// use secretfill::{ConvertError, SecretValue};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Fingerprint(String);
///
/// impl SecretValue for Fingerprint {
///     fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
///         Ok(Fingerprint(String::from_bytes(raw)?.to_lowercase()))
///     }
///
///     fn to_bytes(&self) -> Vec<u8> {
///         self.0.clone().into_bytes()
///     }
/// }
///
/// secretfill::value_slot!(Fingerprint);
/// ```
pub trait SecretValue: Sized {
    /// Parses the raw secret bytes into a value.
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError>;

    /// Renders the value back to bytes for snapshot comparison.
    fn to_bytes(&self) -> Vec<u8>;
}

fn utf8(raw: &[u8]) -> Result<&str, ConvertError> {
    Ok(str::from_utf8(raw)?)
}

impl SecretValue for String {
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
        Ok(utf8(raw)?.to_owned())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.clone().into_bytes()
    }
}

impl SecretValue for Vec<u8> {
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
        // Owned copy; must not alias the provider's buffer.
        Ok(raw.to_vec())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }
}

impl SecretValue for bool {
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
        let s = utf8(raw)?.trim();
        match s.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(ConvertError::Bool(s.to_string())),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        if *self { b"true".to_vec() } else { b"false".to_vec() }
    }
}

macro_rules! integer_value {
    ($($t:ty),* $(,)?) => {$(
        impl SecretValue for $t {
            fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
                Ok(utf8(raw)?.trim().parse::<$t>()?)
            }

            fn to_bytes(&self) -> Vec<u8> {
                self.to_string().into_bytes()
            }
        }
    )*};
}

integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_value {
    ($($t:ty),* $(,)?) => {$(
        impl SecretValue for $t {
            fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
                Ok(utf8(raw)?.trim().parse::<$t>()?)
            }

            fn to_bytes(&self) -> Vec<u8> {
                self.to_string().into_bytes()
            }
        }
    )*};
}

float_value!(f32, f64);

impl SecretValue for Duration {
    /// Parses a human duration literal such as `"1m30s"` or `"250ms"`.
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
        Ok(humantime::parse_duration(utf8(raw)?.trim())?)
    }

    fn to_bytes(&self) -> Vec<u8> {
        humantime::format_duration(*self).to_string().into_bytes()
    }
}

impl<T: SecretValue> SecretValue for Option<T> {
    fn from_bytes(raw: &[u8]) -> Result<Self, ConvertError> {
        Ok(Some(T::from_bytes(raw)?))
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Some(value) => value.to_bytes(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_verbatim() {
        assert_eq!(String::from_bytes(b"s3cret").unwrap(), "s3cret");
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        assert!(matches!(
            String::from_bytes(&[0xff, 0xfe]),
            Err(ConvertError::Utf8(_))
        ));
    }

    #[test]
    fn bytes_copied() {
        let raw = b"\x00\x01\x02";
        assert_eq!(Vec::<u8>::from_bytes(raw).unwrap(), raw.to_vec());
    }

    #[test]
    fn bool_literals() {
        for s in ["true", "TRUE", "True", "t", "1", " true\n"] {
            assert!(bool::from_bytes(s.as_bytes()).unwrap(), "{s:?}");
        }
        for s in ["false", "FALSE", "f", "0", "\tfalse "] {
            assert!(!bool::from_bytes(s.as_bytes()).unwrap(), "{s:?}");
        }
        assert!(matches!(
            bool::from_bytes(b"yes"),
            Err(ConvertError::Bool(_))
        ));
    }

    #[test]
    fn integer_widths() {
        assert_eq!(i8::from_bytes(b"-128").unwrap(), -128);
        assert_eq!(i64::from_bytes(b" 9000000000 ").unwrap(), 9_000_000_000);
        assert_eq!(u16::from_bytes(b"65535").unwrap(), 65535);
        assert!(matches!(i8::from_bytes(b"300"), Err(ConvertError::Int(_))));
        assert!(matches!(u8::from_bytes(b"-1"), Err(ConvertError::Int(_))));
    }

    #[test]
    fn floats() {
        assert_eq!(f64::from_bytes(b"0.25").unwrap(), 0.25);
        assert_eq!(f32::from_bytes(b"1.5").unwrap(), 1.5);
        assert!(matches!(
            f64::from_bytes(b"nope"),
            Err(ConvertError::Float(_))
        ));
    }

    #[test]
    fn duration_literals() {
        assert_eq!(
            Duration::from_bytes(b"1m30s").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            Duration::from_bytes(b"250ms").unwrap(),
            Duration::from_millis(250)
        );
        assert!(matches!(
            Duration::from_bytes(b"90"),
            Err(ConvertError::Duration(_))
        ));
    }

    #[test]
    fn option_allocates() {
        assert_eq!(Option::<i32>::from_bytes(b"7").unwrap(), Some(7));
        assert_eq!(Option::<i32>::None.to_bytes(), Vec::<u8>::new());
    }

    #[test]
    fn render_round_trips() {
        fn check<T: SecretValue + PartialEq + std::fmt::Debug>(value: T) {
            let rendered = value.to_bytes();
            assert_eq!(T::from_bytes(&rendered).unwrap(), value);
        }
        check("hello".to_string());
        check(b"\x01\x02".to_vec());
        check(true);
        check(-42i32);
        check(42u64);
        check(0.5f64);
        check(Duration::from_secs(90));
        check(Duration::ZERO);
        check(Some(7i64));
    }
}
