/// Token-level inspection of executable statements
///
/// Statement text is forwarded to the store verbatim, so nothing here builds
/// an AST. The tokenizer is only used for the two facts the driver needs:
/// how many `?` placeholders a statement declares and which output columns a
/// SELECT enumerates.

use crate::{Error, Result};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Tokenize statement text, dropping whitespace and comments.
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| Error::InvalidQuery(format!("failed to tokenize <{}>: {}", sql, e)))?;
    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect())
}

/// Number of positional `?` placeholders outside string literals.
pub fn count_placeholders(sql: &str) -> Result<usize> {
    Ok(tokenize(sql)?
        .iter()
        .filter(|t| matches!(t, Token::Placeholder(p) if p.starts_with('?')))
        .count())
}

/// Output columns named by a `SELECT a, b, "c" FROM ...` projection.
///
/// Returns `None` for `SELECT *` and for any projection that is not a plain
/// list of attribute names (paths, functions, expressions), in which case the
/// columns are discovered from the returned items instead.
pub fn select_columns(sql: &str) -> Result<Option<Vec<String>>> {
    let tokens = tokenize(sql)?;
    let mut iter = tokens.iter();
    match iter.next() {
        Some(Token::Word(w)) if w.keyword == Keyword::SELECT => {}
        _ => return Ok(None),
    }

    let mut groups: Vec<Vec<&Token>> = vec![Vec::new()];
    let mut depth = 0usize;
    let mut saw_from = false;
    for token in iter {
        match token {
            Token::Word(w) if depth == 0 && w.quote_style.is_none() && w.keyword == Keyword::FROM => {
                saw_from = true;
                break;
            }
            Token::Comma if depth == 0 => groups.push(Vec::new()),
            _ => {
                match token {
                    Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                    Token::RParen | Token::RBracket | Token::RBrace => {
                        depth = depth.saturating_sub(1)
                    }
                    _ => {}
                }
                if let Some(group) = groups.last_mut() {
                    group.push(token);
                }
            }
        }
    }
    if !saw_from {
        return Ok(None);
    }

    let mut columns = Vec::with_capacity(groups.len());
    for group in groups {
        match group.as_slice() {
            [Token::Word(w)] => columns.push(w.value.clone()),
            _ => return Ok(None),
        }
    }
    Ok(Some(columns))
}
