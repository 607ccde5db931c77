/// `WITH key=value` option mini-language
///
/// DDL statements (and SELECT's trailing clause) carry their settings as a
/// run of `WITH key=value` clauses separated by whitespace or commas. Keys may
/// repeat: `WITH LSI=a:f:S, WITH LSI=b:g:N` yields two ordered `LSI` values.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref RE_WITH_OPT: Regex = Regex::new(
        r#"(?i)^(\s+|\s*,\s+|\s+,\s*)WITH\s+([\w\-]+)\s*=\s*([\w/\.\*,;:'"-]+)"#
    )
    .expect("option pattern is valid");
}

/// Ordered multimap of upper-cased option keys to their values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithOptions {
    opts: HashMap<String, Vec<String>>,
}

impl WithOptions {
    /// Parse a `WITH ...` fragment. The fragment must begin with a separator
    /// (whitespace or comma) before the first `WITH`. Parsing stops at the
    /// first clause that does not match; leftover text is not an error here.
    pub fn parse(fragment: &str) -> Self {
        let mut opts: HashMap<String, Vec<String>> = HashMap::new();
        let mut rest = fragment;
        while let Some(caps) = RE_WITH_OPT.captures(rest) {
            let key = caps[2].trim().to_uppercase();
            let value = caps[3].trim();
            let value = value.strip_suffix(',').unwrap_or(value);
            opts.entry(key).or_default().push(value.to_string());
            rest = &rest[caps[0].len()..];
        }
        Self { opts }
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.opts.contains_key(&key.to_uppercase())
    }

    /// All values recorded for `key`, in declaration order
    pub fn values(&self, key: &str) -> &[String] {
        self.opts
            .get(&key.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.opts.keys().map(String::as_str)
    }

    /// Value at position `i` for `key`, or `""` if there is none
    pub fn string_at(&self, key: &str, i: usize) -> &str {
        self.values(key).get(i).map(String::as_str).unwrap_or("")
    }

    pub fn first_string(&self, key: &str) -> &str {
        self.string_at(key, 0)
    }

    /// First value for `key` read as a boolean; unrecognized text is `false`.
    pub fn first_bool(&self, key: &str) -> bool {
        parse_bool(self.first_string(key)).unwrap_or(false)
    }

    /// First value for `key` as an integer. `None` when the key is absent,
    /// `Some(Err(raw))` when it is present but not an integer.
    pub fn first_int(&self, key: &str) -> Option<Result<i64, String>> {
        let values = self.values(key);
        let raw = values.first()?;
        Some(raw.trim().parse::<i64>().map_err(|_| raw.clone()))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_repeated_keys_in_order() {
        let opts = WithOptions::parse(" WITH LSI=idx1:f1:S, WITH LSI=idx2:f2:N:*");
        assert_eq!(opts.values("LSI"), &["idx1:f1:S", "idx2:f2:N:*"]);
        assert_eq!(opts.values("lsi").len(), 2);
    }

    #[test]
    fn test_parse_mixed_separators_and_case() {
        let opts = WithOptions::parse(" with pk=id:string ,WITH Rcu=3  WITH wcu = 5");
        assert_eq!(opts.first_string("PK"), "id:string");
        assert_eq!(opts.first_int("RCU"), Some(Ok(3)));
        assert_eq!(opts.first_int("WCU"), Some(Ok(5)));
        assert_eq!(opts.first_int("SK"), None);
    }

    #[test]
    fn test_projection_list_keeps_commas() {
        let opts = WithOptions::parse(" WITH LSI=i:f:S:a,b,c");
        assert_eq!(opts.first_string("LSI"), "i:f:S:a,b,c");
    }

    #[test]
    fn test_parse_stops_at_garbage() {
        let opts = WithOptions::parse(" WITH A=1 garbage WITH B=2");
        assert_eq!(opts.first_string("A"), "1");
        assert!(!opts.contains("B"));
    }

    #[test]
    fn test_missing_separator_yields_nothing() {
        assert!(WithOptions::parse("WITH A=1").is_empty());
        assert!(WithOptions::parse("").is_empty());
    }

    #[test]
    fn test_unknown_keys_are_retained() {
        let opts = WithOptions::parse(" WITH FOO=bar, WITH CONSISTENT_READ=true");
        assert!(opts.first_bool("CONSISTENT_READ"));
        assert_eq!(opts.first_string("FOO"), "bar");
        let mut keys: Vec<_> = opts.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["CONSISTENT_READ", "FOO"]);
    }

    #[test]
    fn test_bool_values() {
        let opts = WithOptions::parse(" WITH A=yes WITH B=0 WITH C=maybe");
        assert!(opts.first_bool("A"));
        assert!(!opts.first_bool("B"));
        assert!(!opts.first_bool("C"));
        assert!(!opts.first_bool("MISSING"));
    }

    #[test]
    fn test_non_integer_reports_raw_text() {
        let opts = WithOptions::parse(" WITH RCU=ten");
        assert_eq!(opts.first_int("RCU"), Some(Err("ten".to_string())));
    }

    proptest! {
        #[test]
        fn prop_repeated_values_keep_declaration_order(values in prop::collection::vec("[a-z0-9]{1,8}", 1..6)) {
            let fragment: String = values.iter().map(|v| format!(", WITH K={}", v)).collect();
            let fragment = format!(" {}", fragment.trim_start_matches(", "));
            let opts = WithOptions::parse(&fragment);
            prop_assert_eq!(opts.values("K"), values.as_slice());
        }
    }
}
