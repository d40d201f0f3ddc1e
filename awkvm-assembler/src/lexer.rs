//! # Lexer for the bytecode assembly language

use std::str::Chars;

use logos::Logos;

/// Tokens of one assembly line
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip whitespace (not newlines)
#[logos(skip r";[^\n]*")] // Skip comments
#[logos(skip r"//[^\n]*")] // Section comments emitted by the disassembler
pub enum Token {
    /// Mnemonics, names, labels, section keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    /// Absolute stream address, as printed for jump targets in listings
    #[regex(r"0x[0-9a-fA-F]+", |lex| usize::from_str_radix(&lex.slice()[2..], 16).ok())]
    Address(usize),

    /// Decimal number, optionally signed, fractional or with exponent
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Double-quoted string with backslash escapes
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    /// Directive (.globals, .arrays)
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Directive(String),

    /// Array parameter marker
    #[token("@")]
    At,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(">>")]
    Append,

    #[token(">")]
    Greater,

    #[token("|")]
    Pipe,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("^")]
    Caret,

    #[regex(r"\n")]
    Newline,
}

impl Token {
    /// Operator or redirection symbol text, if this token is one
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Token::Append => Some(">>"),
            Token::Greater => Some(">"),
            Token::Pipe => Some("|"),
            Token::Plus => Some("+"),
            Token::Minus => Some("-"),
            Token::Star => Some("*"),
            Token::Slash => Some("/"),
            Token::Percent => Some("%"),
            Token::Caret => Some("^"),
            _ => None,
        }
    }
}

/// Strip quotes and resolve escapes; `None` on an unknown escape
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '/' => out.push('/'),
            'x' => out.push(hex_char(&mut chars, 2)?),
            'u' if chars.as_str().starts_with('{') => {
                chars.next();
                let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => out.push(hex_char(&mut chars, 4)?),
            'U' => out.push(hex_char(&mut chars, 8)?),
            _ => return None,
        }
    }
    Some(out)
}

/// Exactly `digits` hex digits naming a character
fn hex_char(chars: &mut Chars<'_>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    char::from_u32(u32::from_str_radix(&hex, 16).ok()?)
}
