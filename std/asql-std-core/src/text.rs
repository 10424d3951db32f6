///
/// Text/encoding adapter
///
/// Host strings are Rust `String`s; the database side speaks UTF-8 bytes.
/// SQL text is already UTF-8 and passes through unchanged. Column bytes that
/// are not valid UTF-8 are decoded lossily.
///

use crate::value::ScriptValue;

/// Convert one column of a fetched row into a host string.
///
/// SQL NULL becomes an empty string so rows stay a sequence of strings.
pub fn to_host(column: Option<&[u8]>) -> ScriptValue {
    match column {
        Some(bytes) => ScriptValue::String(String::from_utf8_lossy(bytes).into_owned()),
        None => ScriptValue::String(String::new()),
    }
}

pub fn row_to_host(row: &[Option<Vec<u8>>]) -> ScriptValue {
    ScriptValue::Array(row.iter().map(|col| to_host(col.as_deref())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let row = vec![Some(b"1".to_vec()), None, Some("h\u{e9}".as_bytes().to_vec())];
        assert_eq!(
            row_to_host(&row),
            ScriptValue::Array(vec!["1".into(), "".into(), "h\u{e9}".into()])
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let value = to_host(Some(&[0x66, 0xff, 0x6f]));
        assert_eq!(value, ScriptValue::String("f\u{fffd}o".to_string()));
    }
}
