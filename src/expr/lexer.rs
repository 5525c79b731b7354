//! Tokenizer for visibility and calculated-value expressions

use super::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `${name}` interpolation, name trimmed
    Placeholder(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    Comma,
    Dot,
    Question,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    AndAnd,
    OrOr,
}

impl Token {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("'{s}'"),
            Token::Ident(name) => name.clone(),
            Token::Placeholder(name) => format!("${{{name}}}"),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::Null => "null".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Question => "?".into(),
            Token::Colon => ":".into(),
            Token::Bang => "!".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Lt => "<".into(),
            Token::Le => "<=".into(),
            Token::Gt => ">".into(),
            Token::Ge => ">=".into(),
            Token::EqEq => "==".into(),
            Token::NotEq => "!=".into(),
            Token::StrictEq => "===".into(),
            Token::StrictNotEq => "!==".into(),
            Token::AndAnd => "&&".into(),
            Token::OrOr => "||".into(),
        }
    }
}

/// A token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Two and three character operators first
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let third = chars.get(i + 2).map(|(_, c)| *c);
        let (token, width) = match (c, next, third) {
            ('=', Some('='), Some('=')) => (Some(Token::StrictEq), 3),
            ('!', Some('='), Some('=')) => (Some(Token::StrictNotEq), 3),
            ('=', Some('='), _) => (Some(Token::EqEq), 2),
            ('!', Some('='), _) => (Some(Token::NotEq), 2),
            ('<', Some('='), _) => (Some(Token::Le), 2),
            ('>', Some('='), _) => (Some(Token::Ge), 2),
            ('&', Some('&'), _) => (Some(Token::AndAnd), 2),
            ('|', Some('|'), _) => (Some(Token::OrOr), 2),
            ('(', _, _) => (Some(Token::LParen), 1),
            (')', _, _) => (Some(Token::RParen), 1),
            (',', _, _) => (Some(Token::Comma), 1),
            ('?', _, _) => (Some(Token::Question), 1),
            (':', _, _) => (Some(Token::Colon), 1),
            ('!', _, _) => (Some(Token::Bang), 1),
            ('+', _, _) => (Some(Token::Plus), 1),
            ('-', _, _) => (Some(Token::Minus), 1),
            ('*', _, _) => (Some(Token::Star), 1),
            ('/', _, _) => (Some(Token::Slash), 1),
            ('%', _, _) => (Some(Token::Percent), 1),
            ('<', _, _) => (Some(Token::Lt), 1),
            ('>', _, _) => (Some(Token::Gt), 1),
            _ => (None, 0),
        };
        if let Some(token) = token {
            tokens.push(Spanned { token, pos });
            i += width;
            continue;
        }

        if c == '.' && !next.is_some_and(|n| n.is_ascii_digit()) {
            tokens.push(Spanned {
                token: Token::Dot,
                pos,
            });
            i += 1;
            continue;
        }

        if c == '$' && next == Some('{') {
            let start = i + 2;
            let mut end = start;
            while end < chars.len() && chars[end].1 != '}' {
                end += 1;
            }
            if end >= chars.len() {
                return Err(ParseError::UnterminatedPlaceholder { pos });
            }
            let name: String = chars[start..end].iter().map(|(_, c)| c).collect();
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ParseError::EmptyPlaceholder { pos });
            }
            tokens.push(Spanned {
                token: Token::Placeholder(name),
                pos,
            });
            i = end + 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, consumed) = lex_string(&chars[i..], c).ok_or(ParseError::UnterminatedString { pos })?;
            tokens.push(Spanned {
                token: Token::Str(text),
                pos,
            });
            i += consumed;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let mut end = i;
            while end < chars.len() && (chars[end].1.is_ascii_digit() || chars[end].1 == '.') {
                end += 1;
            }
            let text: String = chars[i..end].iter().map(|(_, c)| c).collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber { text: text.clone(), pos })?;
            tokens.push(Spanned {
                token: Token::Number(value),
                pos,
            });
            i = end;
            continue;
        }

        if is_ident_start(c) {
            let mut end = i;
            while end < chars.len() && is_ident_continue(chars[end].1) {
                end += 1;
            }
            let word: String = chars[i..end].iter().map(|(_, c)| c).collect();
            let token = match word.as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" | "undefined" => Token::Null,
                _ => Token::Ident(word),
            };
            tokens.push(Spanned { token, pos });
            i = end;
            continue;
        }

        return Err(ParseError::UnexpectedChar { ch: c, pos });
    }

    Ok(tokens)
}

/// Lex a quoted string starting at the opening quote.
/// Returns the unescaped text and the number of chars consumed.
fn lex_string(chars: &[(usize, char)], quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i].1 {
            '\\' => {
                let escaped = chars.get(i + 1)?.1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Some((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
