//! Query string encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes `encodeURIComponent` escapes: everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a component the way `encodeURIComponent` does.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Encodes key/value pairs as `k1=v1&k2=v2`, preserving order.
pub fn url_encode<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                encode_component(k.as_ref()),
                encode_component(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreserved_passthrough() {
        assert_eq!(encode_component("MAT_1961-1990.x"), "MAT_1961-1990.x");
        assert_eq!(encode_component("!~*'()"), "!~*'()");
    }

    #[test]
    fn test_reserved_characters_encoded() {
        assert_eq!(encode_component("-123,45"), "-123%2C45");
        assert_eq!(encode_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(
            encode_component(r#"{"x":1}"#),
            "%7B%22x%22%3A1%7D"
        );
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(encode_component("é"), "%C3%A9");
    }

    #[test]
    fn test_url_encode_preserves_order() {
        let query = url_encode(&[("point", "-123,45"), ("variable", "MAT")]);
        assert_eq!(query, "point=-123%2C45&variable=MAT");
    }

    #[test]
    fn test_url_encode_empty() {
        let pairs: [(&str, &str); 0] = [];
        assert_eq!(url_encode(&pairs), "");
    }
}
