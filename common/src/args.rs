//! Per-transport key/value options.
//!
//! Options arrive from the controlling process in
//! `TOR_PT_SERVER_TRANSPORT_OPTIONS` and may be echoed back in the `ARGS:`
//! token of an `SMETHOD` line.

use std::collections::HashMap;

use thiserror::Error;

/// Errors from parsing `TOR_PT_SERVER_TRANSPORT_OPTIONS`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("no colon in {0:?}")]
    MissingColon(String),
    #[error("no equals sign in {0:?}")]
    MissingEquals(String),
    #[error("empty method name in {0:?}")]
    EmptyMethodName(String),
    #[error("empty key in {0:?}")]
    EmptyKey(String),
    #[error("terminal backslash at end of {0:?}")]
    TerminalBackslash(String),
}

/// An ordered multimap from option keys to their values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    entries: Vec<(String, Vec<String>)>,
}

impl Args {
    /// Creates an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`, keeping earlier values
    pub fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// The first value stored for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Every value stored for `key`, in insertion order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode for the `ARGS:` token of an `SMETHOD` line.
    ///
    /// Keys and values have `\`, `=` and `,` backslash-escaped; pairs are
    /// joined with commas. The result still goes through ordinary argument
    /// escaping when the line is written.
    pub fn encode(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", backslash_escape(k, b"=,"), backslash_escape(v, b"=,")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn backslash_escape(s: &str, special: &[u8]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || (c.is_ascii() && special.contains(&(c as u8))) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Scan `s` until the first unescaped byte in `stops`, removing escapes.
/// Returns the consumed length and the unescaped text.
fn index_unescaped(s: &str, stops: &[u8]) -> Result<(usize, String), ArgsError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if stops.contains(&b) {
            break;
        }
        if b == b'\\' {
            i += 1;
            match bytes.get(i) {
                Some(&escaped) => out.push(escaped),
                None => return Err(ArgsError::TerminalBackslash(s.to_string())),
            }
        } else {
            out.push(b);
        }
        i += 1;
    }
    // Only ASCII delimiters are ever removed, so the result stays UTF-8.
    Ok((i, String::from_utf8_lossy(&out).into_owned()))
}

/// Parse `TOR_PT_SERVER_TRANSPORT_OPTIONS` into one option set per method.
///
/// The format is `method:key=value;method:key=value`, with `\` escaping
/// the following character anywhere in a name, key or value.
pub fn parse_server_transport_options(s: &str) -> Result<HashMap<String, Args>, ArgsError> {
    let mut opts: HashMap<String, Args> = HashMap::new();
    if s.is_empty() {
        return Ok(opts);
    }

    let mut i = 0;
    loop {
        let begin = i;

        let (offset, method_name) = index_unescaped(&s[i..], b":=;")?;
        i += offset;
        if s.as_bytes().get(i) != Some(&b':') {
            return Err(ArgsError::MissingColon(s[begin..i].to_string()));
        }
        i += 1;

        let (offset, key) = index_unescaped(&s[i..], b"=;")?;
        i += offset;
        if s.as_bytes().get(i) != Some(&b'=') {
            return Err(ArgsError::MissingEquals(s[begin..i].to_string()));
        }
        i += 1;

        let (offset, value) = index_unescaped(&s[i..], b";")?;
        i += offset;

        if method_name.is_empty() {
            return Err(ArgsError::EmptyMethodName(s[begin..i].to_string()));
        }
        if key.is_empty() {
            return Err(ArgsError::EmptyKey(s[begin..i].to_string()));
        }
        opts.entry(method_name).or_default().add(key, value);

        if i >= s.len() {
            break;
        }
        // skip ';'
        i += 1;
    }

    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Args {
        let mut a = Args::new();
        for (k, v) in pairs {
            a.add(*k, *v);
        }
        a
    }

    #[test]
    fn test_add_and_get() {
        let mut a = Args::new();
        assert!(a.is_empty());
        assert_eq!(a.get("a"), None);
        a.add("a", "1");
        a.add("b", "2");
        a.add("a", "3");
        assert_eq!(a.get("a"), Some("1"));
        assert_eq!(a.get_all("a"), ["1".to_string(), "3".to_string()]);
        assert_eq!(a.get("b"), Some("2"));
        assert_eq!(a.get("c"), None);
        assert!(a.get_all("c").is_empty());
    }

    #[test]
    fn test_encode() {
        assert_eq!(Args::new().encode(), "");
        assert_eq!(args(&[("a", "b")]).encode(), "a=b");
        assert_eq!(
            args(&[("shared-secret", "rahasia"), ("secrets-file", "/tmp/blob")]).encode(),
            "shared-secret=rahasia,secrets-file=/tmp/blob"
        );
        assert_eq!(args(&[("a", "1"), ("b", "x"), ("a", "2")]).encode(), "a=1,a=2,b=x");
        assert_eq!(args(&[("=,\\", "a=b,c\\d")]).encode(), "\\=\\,\\\\=a\\=b\\,c\\\\d");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_server_transport_options("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_good() {
        let opts = parse_server_transport_options(
            "t:k=v;t:k2=v2;u:k=v\\;x;w:a\\=b=c\\:d;t:k=again",
        )
        .unwrap();
        assert_eq!(opts.len(), 3);
        assert_eq!(opts["t"].get_all("k"), ["v".to_string(), "again".to_string()]);
        assert_eq!(opts["t"].get("k2"), Some("v2"));
        assert_eq!(opts["u"].get("k"), Some("v;x"));
        assert_eq!(opts["w"].get("a=b"), Some("c:d"));
    }

    #[test]
    fn test_parse_empty_value() {
        let opts = parse_server_transport_options("t:k=").unwrap();
        assert_eq!(opts["t"].get("k"), Some(""));
    }

    #[test]
    fn test_parse_bad() {
        assert!(matches!(
            parse_server_transport_options("t"),
            Err(ArgsError::MissingColon(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t=k:v"),
            Err(ArgsError::MissingColon(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t:k"),
            Err(ArgsError::MissingEquals(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t:k;u:k=v"),
            Err(ArgsError::MissingEquals(_))
        ));
        assert!(matches!(
            parse_server_transport_options(":k=v"),
            Err(ArgsError::EmptyMethodName(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t:=v"),
            Err(ArgsError::EmptyKey(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t:k=v\\"),
            Err(ArgsError::TerminalBackslash(_))
        ));
        assert!(matches!(
            parse_server_transport_options("t:k=v;"),
            Err(ArgsError::MissingColon(_))
        ));
    }
}
