//! Assembly parser
//!
//! Turns one source line into a [`Line`]. Name resolution and encoding happen
//! in the assembler.

use logos::Logos;
use crate::error::{AssemblerError, Result};
use crate::lexer::Token;

/// Executable-unit header
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Begin,
    End,
    Pattern,
    Start,
    Stop,
    Body,
    Function {
        name: String,
        params: Vec<Param>,
        locals: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub is_array: bool,
}

/// Instruction operand as written
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Ident(String),
    Number(f64),
    Str(String),
    Symbol(&'static str),
    /// Absolute jump target
    Address(usize),
}

/// One parsed source line
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Directive { name: String, args: Vec<String> },
    Section(Section),
    Label(String),
    Statement { mnemonic: String, operands: Vec<Operand> },
}

/// Parse a single line; `None` for blank and comment-only lines
pub fn parse_line(text: &str, line: usize) -> Result<Option<Line>> {
    let tokens = tokenize(text, line)?;
    let Some((first, rest)) = tokens.split_first() else {
        return Ok(None);
    };

    match first {
        Token::Directive(name) => {
            let mut args = Vec::new();
            for token in rest {
                match token {
                    Token::Identifier(arg) => args.push(arg.clone()),
                    Token::Comma => {}
                    other => return Err(syntax(line, format!("unexpected {:?} in directive", other))),
                }
            }
            Ok(Some(Line::Directive { name: name.clone(), args }))
        }
        Token::Identifier(word) if word == "function" => {
            parse_function_header(rest, line).map(|s| Some(Line::Section(s)))
        }
        Token::Identifier(word) if rest == [Token::Colon] => {
            let section = match word.as_str() {
                "BEGIN" => Section::Begin,
                "END" => Section::End,
                "pattern" => Section::Pattern,
                "start" => Section::Start,
                "stop" => Section::Stop,
                "body" => Section::Body,
                _ => return Ok(Some(Line::Label(word.clone()))),
            };
            Ok(Some(Line::Section(section)))
        }
        Token::Identifier(mnemonic) => {
            let mut operands = Vec::new();
            for token in rest {
                let operand = match token {
                    Token::Identifier(name) => Operand::Ident(name.clone()),
                    Token::Number(n) => Operand::Number(*n),
                    Token::Str(s) => Operand::Str(s.clone()),
                    Token::Address(addr) => Operand::Address(*addr),
                    Token::Comma => continue,
                    other => match other.symbol() {
                        Some(symbol) => Operand::Symbol(symbol),
                        None => return Err(syntax(line, format!("unexpected {:?}", other))),
                    },
                };
                operands.push(operand);
            }
            Ok(Some(Line::Statement { mnemonic: mnemonic.clone(), operands }))
        }
        other => Err(syntax(line, format!("expected mnemonic, found {:?}", other))),
    }
}

/// Parse every line of `source`, keeping 1-based line numbers
pub fn parse_source(source: &str) -> Result<Vec<(usize, Line)>> {
    let mut lines = Vec::new();
    for (index, text) in source.lines().enumerate() {
        if let Some(parsed) = parse_line(text, index + 1)? {
            lines.push((index + 1, parsed));
        }
    }
    Ok(lines)
}

fn tokenize(text: &str, line: usize) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(Token::Newline) => {}
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(AssemblerError::SyntaxError {
                    line,
                    column: lexer.span().start + 1,
                    message: format!("invalid token {:?}", lexer.slice()),
                })
            }
        }
    }
    Ok(tokens)
}

/// `function name(p1, @arr) [locals N]:`
fn parse_function_header(tokens: &[Token], line: usize) -> Result<Section> {
    let mut iter = tokens.iter().peekable();

    let name = match iter.next() {
        Some(Token::Identifier(name)) => name.clone(),
        _ => return Err(syntax(line, "expected function name".to_string())),
    };
    if iter.next() != Some(&Token::LParen) {
        return Err(syntax(line, "expected '(' after function name".to_string()));
    }

    let mut params = Vec::new();
    loop {
        match iter.next() {
            Some(Token::RParen) => break,
            Some(Token::Comma) => {}
            Some(Token::At) => match iter.next() {
                Some(Token::Identifier(param)) => params.push(Param { name: param.clone(), is_array: true }),
                _ => return Err(syntax(line, "expected array parameter name after '@'".to_string())),
            },
            Some(Token::Identifier(param)) => params.push(Param { name: param.clone(), is_array: false }),
            _ => return Err(syntax(line, "unterminated parameter list".to_string())),
        }
    }

    let mut locals = 0;
    if let Some(Token::Identifier(word)) = iter.peek() {
        if word != "locals" {
            return Err(syntax(line, format!("unexpected '{}' in function header", word)));
        }
        iter.next();
        locals = match iter.next() {
            Some(Token::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => *n as u32,
            _ => return Err(syntax(line, "expected local slot count".to_string())),
        };
    }

    if iter.next() != Some(&Token::Colon) || iter.next().is_some() {
        return Err(syntax(line, "function header must end with ':'".to_string()));
    }

    Ok(Section::Function { name, params, locals })
}

fn syntax(line: usize, message: String) -> AssemblerError {
    AssemblerError::SyntaxError { line, column: 0, message }
}
