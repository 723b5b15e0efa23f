//! SQL identifier quoting utilities
//!
//! Schema, table and column names are never interpolated into statement text
//! directly. They go through [`quote_ident`] (or one of the helpers built on
//! it), which wraps the name in double quotes and doubles any embedded double
//! quote. Literal values travel as bound parameters instead; the only literal
//! helper here, [`quote_literal`], exists for the psql `\copy` meta-command,
//! which cannot take parameters.

/// Quote a SQL identifier to prevent injection.
///
/// # Examples
/// ```
/// use pf_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("orders"), r#""orders""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a schema and table pair as `"schema"."table"`.
///
/// Unlike splitting a dotted string, this keeps dots inside either name intact.
///
/// # Examples
/// ```
/// use pf_core::sql_utils::quote_qualified;
/// assert_eq!(quote_qualified("sales", "orders"), r#""sales"."orders""#);
/// assert_eq!(quote_qualified("a.b", "c"), r#""a.b"."c""#);
/// ```
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Quote every name and join them with commas, e.g. for an INSERT column list.
pub fn quote_ident_list<S: AsRef<str>>(idents: &[S]) -> String {
    idents
        .iter()
        .map(|i| quote_ident(i.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wrap a value in single quotes, doubling embedded quotes.
///
/// Only for command text handed to psql; statements run through the catalog
/// bind their values as parameters.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
#[path = "sql_utils_test.rs"]
mod tests;
