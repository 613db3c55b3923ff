use crate::{
    error::{QueryError, Result},
    value::BindParam,
};
use serde::Serialize;
use std::{iter::Peekable, str::Chars};

/// SQL text with `?` placeholders plus the positionally matched parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BindParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<BindParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Fails when the placeholder count and the parameter count disagree.
    pub fn verify_arity(&self) -> Result<()> {
        let expected = placeholder_count(&self.sql);
        if expected != self.params.len() {
            return Err(QueryError::Internal(anyhow::anyhow!(
                "sql expects {expected} binds but {} were collected",
                self.params.len()
            )));
        }
        Ok(())
    }
}

/// Counts `?` placeholders outside quoted text and comments.
pub fn placeholder_count(sql: &str) -> usize {
    code_only(sql).matches('?').count()
}

/// Upper-cased keywords and identifiers outside parentheses, quoted text and comments.
pub(crate) fn top_level_words(sql: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut depth = 0usize;

    for ch in code_only(sql).chars() {
        if depth == 0 && (ch.is_ascii_alphanumeric() || ch == '_') {
            word.push(ch.to_ascii_uppercase());
            continue;
        }
        if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
}

/// Replaces quoted literals, quoted identifiers and comments with a single space.
fn code_only(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                skip_quoted(&mut chars, ch);
                out.push(' ');
            }
            '#' => {
                skip_line(&mut chars);
                out.push(' ');
            }
            // `--` only opens a comment when followed by whitespace
            '-' if chars.peek() == Some(&'-') => {
                let mut ahead = chars.clone();
                ahead.next();
                if ahead.peek().map_or(true, |next| next.is_whitespace()) {
                    skip_line(&mut chars);
                    out.push(' ');
                } else {
                    out.push(ch);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                out.push(' ');
            }
            other => out.push(other),
        }
    }

    out
}

fn skip_quoted(chars: &mut Peekable<Chars<'_>>, open: char) {
    while let Some(ch) = chars.next() {
        if ch == '\\' && open != '`' {
            chars.next();
        } else if ch == open {
            // doubled quote is an escaped quote
            if chars.peek() == Some(&open) {
                chars.next();
            } else {
                return;
            }
        }
    }
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    for ch in chars.by_ref() {
        if ch == '\n' {
            return;
        }
    }
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    let mut previous = None;
    for ch in chars.by_ref() {
        if previous == Some('*') && ch == '/' {
            return;
        }
        previous = Some(ch);
    }
}
