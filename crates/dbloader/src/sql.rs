use std::fmt::{self, Write};

/// A table or column name rendered as a quoted Postgres identifier.
///
/// Embedded double quotes are doubled.
///
/// ```
/// use dbloader::Ident;
/// assert_eq!(Ident("order").to_string(), "\"order\"");
/// assert_eq!(Ident("a\"b").to_string(), "\"a\"\"b\"");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Ident<'a>(pub &'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        let mut parts = self.0.split('"');
        if let Some(first) = parts.next() {
            f.write_str(first)?;
        }
        for part in parts {
            f.write_str("\"\"")?;
            f.write_str(part)?;
        }
        f.write_char('"')
    }
}

/// Quote a Postgres identifier.
///
/// Always quotes, so declared names keep their exact case and reserved words
/// like `user` or `order` are safe as table and column names.
pub fn quote_ident(name: &str) -> String {
    Ident(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("sample_table1"), "\"sample_table1\"");
        assert_eq!(quote_ident("Number"), "\"Number\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_ident("\""), "\"\"\"\"");
    }
}
