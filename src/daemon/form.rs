//! Strict form decoding for request query strings

use crate::error::{GatewayError, Result};
use url::form_urlencoded;

/// Decoded form values, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pairs: Vec<(String, String)>,
}

impl Form {
    /// Parse a raw query string.
    ///
    /// Unlike lenient decoders, this rejects malformed percent escapes and
    /// `;` separators, which engine clients expect to see reported.
    pub fn parse(query: &str) -> Result<Self> {
        validate(query)?;

        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self { pairs })
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Boolean flag, set only by the exact value `1`
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }
}

fn validate(query: &str) -> Result<()> {
    if query.contains(';') {
        return Err(GatewayError::InvalidSemicolon);
    }

    let bytes = query.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => i += 3,
                _ => {
                    let end = (i + 3).min(bytes.len());
                    let bad = String::from_utf8_lossy(&bytes[i..end]).into_owned();
                    return Err(GatewayError::InvalidEscape(bad));
                }
            }
        } else {
            i += 1;
        }
    }
    Ok(())
}
