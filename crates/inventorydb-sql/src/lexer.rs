//! Minimal SQL tokenizer used by the local discipline checks.
//!
//! It understands just enough of PostgreSQL's lexical rules to keep string
//! literals, quoted identifiers and comments from being mistaken for
//! keywords or table names. It is not a parser.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare identifier or keyword, as written.
    Word(String),
    /// `"quoted"` identifier with the quotes removed.
    Quoted(String),
    /// String literal contents (single-quoted or dollar-quoted).
    Str(String),
    Number(String),
    LParen,
    RParen,
    Symbol(char),
}

impl Token {
    /// Case-insensitive keyword match against a bare word.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// Identifier text for bare or quoted identifiers.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(word) | Token::Quoted(word) => Some(word),
            _ => None,
        }
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        matches!(self, Token::Symbol(c) if *c == symbol)
    }
}

pub fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
        } else if c == '\'' {
            let (text, next) = read_quoted(&chars, i, '\'');
            tokens.push(Token::Str(text));
            i = next;
        } else if c == '"' {
            let (text, next) = read_quoted(&chars, i, '"');
            tokens.push(Token::Quoted(text));
            i = next;
        } else if c == '$' {
            match read_dollar_quoted(&chars, i) {
                Some((text, next)) => {
                    tokens.push(Token::Str(text));
                    i = next;
                }
                None => {
                    tokens.push(Token::Symbol('$'));
                    i += 1;
                }
            }
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Symbol(c));
            i += 1;
        }
    }

    tokens
}

/// Read a quote-delimited run where a doubled quote escapes itself.
fn read_quoted(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return (text, i + 1);
        }
        text.push(chars[i]);
        i += 1;
    }
    (text, chars.len())
}

/// `$tag$ ... $tag$` bodies. Returns `None` for positional parameters like `$1`.
fn read_dollar_quoted(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        if i == start + 1 && chars[i].is_ascii_digit() {
            return None;
        }
        i += 1;
    }
    if chars.get(i) != Some(&'$') {
        return None;
    }
    let tag: Vec<char> = chars[start..=i].to_vec();
    let body_start = i + 1;
    let mut j = body_start;
    while j + tag.len() <= chars.len() {
        if chars[j..j + tag.len()] == tag[..] {
            return Some((chars[body_start..j].iter().collect(), j + tag.len()));
        }
        j += 1;
    }
    Some((chars[body_start..].iter().collect(), chars.len()))
}
