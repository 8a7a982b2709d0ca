//! Tokenizer for the authored expression language

use crate::error::EvalError;
use crate::value::Scope;

/// A single token of an authored expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// `$name` or `%name`
    Var(Scope, String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    AndAnd,
    OrOr,
    Not,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    LParen,
    RParen,
}

impl Token {
    /// Whether this token starts an assignment when it follows a variable
    pub fn is_assign(&self) -> bool {
        matches!(
            self,
            Token::Assign
                | Token::PlusAssign
                | Token::MinusAssign
                | Token::StarAssign
                | Token::SlashAssign
                | Token::PercentAssign
        )
    }
}

/// Split a sanitized expression string into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::PlusAssign);
                i += 2;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::MinusAssign);
                i += 2;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::StarAssign);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::SlashAssign);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '$' | '%' => {
                // % is remainder unless it introduces a local variable name
                if c == '%' && !chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic()) {
                    if chars.get(i + 1) == Some(&'=') {
                        tokens.push(Token::PercentAssign);
                        i += 2;
                    } else {
                        tokens.push(Token::Percent);
                        i += 1;
                    }
                    continue;
                }
                let scope = if c == '$' { Scope::Global } else { Scope::Local };
                i += 1;
                let start = i;
                if !chars.get(i).is_some_and(|n| n.is_ascii_alphabetic()) {
                    return Err(EvalError::syntax(format!(
                        "expected a variable name after '{c}'"
                    )));
                }
                while chars
                    .get(i)
                    .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_' || *n == '.')
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Var(scope, name));
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(EvalError::syntax("unterminated string literal"))
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') if chars.get(i + 1).is_some() => {
                            s.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while chars.get(i).is_some_and(|n| n.is_ascii_digit()) {
                    i += 1;
                }
                if chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
                {
                    is_float = true;
                    i += 1;
                    while chars.get(i).is_some_and(|n| n.is_ascii_digit()) {
                        i += 1;
                    }
                }
                let raw: String = chars[start..i].iter().collect();
                let token = if is_float {
                    Token::Float(raw.parse().map_err(|_| {
                        EvalError::syntax(format!("bad number literal '{raw}'"))
                    })?)
                } else {
                    Token::Int(raw.parse().map_err(|_| {
                        EvalError::syntax(format!("bad number literal '{raw}'"))
                    })?)
                };
                tokens.push(token);
            }
            _ if c.is_ascii_alphabetic() => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    other => {
                        return Err(EvalError::syntax(format!(
                            "bare word '{other}' (variables need a '$' or '%' sigil)"
                        )))
                    }
                }
            }
            other => {
                return Err(EvalError::syntax(format!("unexpected character '{other}'")))
            }
        }
    }

    Ok(tokens)
}
