//! Backtick name mangling.
//!
//! Names that are not valid identifiers (for example nested dataset paths
//! such as `land_cover_data/landsat_treecover`) must be backtick-quoted in a
//! filter expression. The parser rewrites such a name into a plain
//! identifier by prefixing it with [`BACKTICK_PREFIX`] and replacing every
//! special character with `_<TOKEN>_`, so `a/b[0]` becomes
//! `BACKTICK_QUOTED_STRING_a_SLASH_b_LSQB_0_RSQB_`.
//!
//! A [`TokenTable`] is built once and shared by the parser and by every
//! table that has to recover the original name.

use std::collections::HashMap;

/// Prefix marking an identifier produced from a backtick-quoted name.
pub const BACKTICK_PREFIX: &str = "BACKTICK_QUOTED_STRING_";

/// Punctuation characters and the token names that stand in for them.
const TOKENS: &[(char, &str)] = &[
    ('(', "LPAR"),
    (')', "RPAR"),
    ('[', "LSQB"),
    (']', "RSQB"),
    (':', "COLON"),
    (',', "COMMA"),
    (';', "SEMI"),
    ('+', "PLUS"),
    ('-', "MINUS"),
    ('*', "STAR"),
    ('/', "SLASH"),
    ('|', "VBAR"),
    ('&', "AMPER"),
    ('<', "LESS"),
    ('>', "GREATER"),
    ('=', "EQUAL"),
    ('.', "DOT"),
    ('%', "PERCENT"),
    ('{', "LBRACE"),
    ('}', "RBRACE"),
    ('~', "TILDE"),
    ('^', "CIRCUMFLEX"),
    ('@', "AT"),
    ('?', "QUESTIONMARK"),
    ('!', "EXCLAMATIONMARK"),
    ('$', "DOLLARSIGN"),
    ('\'', "SINGLEQUOTE"),
    ('"', "DOUBLEQUOTE"),
];

/// Bidirectional mapping between punctuation and mangled tokens.
#[derive(Debug, Clone)]
pub struct TokenTable {
    by_char: HashMap<char, String>,
    by_token: Vec<(String, char)>,
}

impl TokenTable {
    /// Build the standard table.
    pub fn new() -> Self {
        let by_char = TOKENS
            .iter()
            .map(|&(c, name)| (c, format!("_{}_", name)))
            .collect();
        let by_token = TOKENS
            .iter()
            .map(|&(c, name)| (format!("_{}_", name), c))
            .collect();

        Self { by_char, by_token }
    }

    /// Mangle a backtick-quoted name into an identifier.
    ///
    /// Spaces become underscores; that replacement is not reversible.
    pub fn sanitize(&self, name: &str) -> String {
        let mut out = String::with_capacity(BACKTICK_PREFIX.len() + name.len() * 2);
        out.push_str(BACKTICK_PREFIX);
        for c in name.chars() {
            match self.by_char.get(&c) {
                Some(token) => out.push_str(token),
                None if c == ' ' => out.push('_'),
                None => out.push(c),
            }
        }
        out
    }

    /// Recover the original name from a mangled identifier.
    ///
    /// Names without the backtick prefix are returned unchanged.
    pub fn desanitize(&self, name: &str) -> String {
        let Some(rest) = name.strip_prefix(BACKTICK_PREFIX) else {
            return name.to_string();
        };

        let mut out = String::with_capacity(rest.len());
        let mut remaining = rest;
        'scan: while let Some(c) = remaining.chars().next() {
            if c == '_' {
                for (token, original) in &self.by_token {
                    if let Some(after) = remaining.strip_prefix(token.as_str()) {
                        out.push(*original);
                        remaining = after;
                        continue 'scan;
                    }
                }
            }
            out.push(c);
            remaining = &remaining[c.len_utf8()..];
        }
        out
    }

    /// Check if a name was produced by [`TokenTable::sanitize`].
    pub fn is_mangled(&self, name: &str) -> bool {
        name.starts_with(BACKTICK_PREFIX)
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        let table = TokenTable::new();
        assert_eq!(
            table.sanitize("path/to/dataset"),
            "BACKTICK_QUOTED_STRING_path_SLASH_to_SLASH_dataset"
        );
        assert_eq!(
            table.sanitize("rh[-1]"),
            "BACKTICK_QUOTED_STRING_rh_LSQB__MINUS_1_RSQB_"
        );
    }

    #[test]
    fn test_desanitize_round_trip() {
        let table = TokenTable::new();
        for name in [
            "land_cover_data/landsat_treecover",
            "geolocation/latitude_instrument",
            "rh[0]",
            "rh[-1]",
            "x/y[1:3]",
            "a_b/_c_",
        ] {
            assert_eq!(table.desanitize(&table.sanitize(name)), name);
        }
    }

    #[test]
    fn test_desanitize_plain_name() {
        let table = TokenTable::new();
        assert_eq!(table.desanitize("valid_identifier"), "valid_identifier");
        assert!(!table.is_mangled("valid_identifier"));
        assert!(table.is_mangled("BACKTICK_QUOTED_STRING_a_SLASH_b"));
    }
}
