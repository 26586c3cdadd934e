use logos::Logos;
use std::fmt;

use crate::diag::Lister;

/// CD25 keywords are case-insensitive; the canonical spellings are lowercase
/// except `CD25`, `In`, `Out` and `Line`, and deviations draw a lexical
/// warning rather than an error.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"/--[^\n]*")]
#[logos(skip r"/\*\*([^*]|\*[^*]|\*\*[^/])*\*\*/")]
pub enum Token {
    // --- Keywords ---
    #[token("cd25", ignore(ascii_case))]
    Cd25,
    #[token("constants", ignore(ascii_case))]
    Constants,
    #[token("types", ignore(ascii_case))]
    Types,
    #[token("is", ignore(ascii_case))]
    Is,
    #[token("arrays", ignore(ascii_case))]
    Arrays,
    #[token("main", ignore(ascii_case))]
    Main,
    #[token("begin", ignore(ascii_case))]
    Begin,
    #[token("end", ignore(ascii_case))]
    End,
    #[token("array", ignore(ascii_case))]
    Array,
    #[token("of", ignore(ascii_case))]
    Of,
    #[token("func", ignore(ascii_case))]
    Func,
    #[token("void", ignore(ascii_case))]
    Void,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("integer", ignore(ascii_case))]
    Integer,
    #[token("real", ignore(ascii_case))]
    Real,
    #[token("boolean", ignore(ascii_case))]
    Boolean,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("repeat", ignore(ascii_case))]
    Repeat,
    #[token("until", ignore(ascii_case))]
    Until,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("in", ignore(ascii_case))]
    In,
    #[token("out", ignore(ascii_case))]
    Out,
    #[token("line", ignore(ascii_case))]
    Line,
    #[token("return", ignore(ascii_case))]
    Return,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("xor", ignore(ascii_case))]
    Xor,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,

    // --- Identifiers and literals ---
    #[regex(r"[A-Za-z][A-Za-z0-9]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Literal glyphs are kept as text; they are interned into the symbol
    // store like identifiers and parsed only when a pool slot is needed.
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    IntLit(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().to_string())]
    RealLit(String),

    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    StringLit(String),

    // --- Operators ---
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<<")]
    LessLess,
    #[token(">>")]
    GreaterGreater,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("=")]
    Assign,
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
    #[token("<")]
    Less,
    #[token(">")]
    Greater,

    // --- Punctuation ---
    #[token(",")]
    Comma,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Cd25 => write!(f, "'CD25'"),
            Token::Constants => write!(f, "'constants'"),
            Token::Types => write!(f, "'types'"),
            Token::Is => write!(f, "'is'"),
            Token::Arrays => write!(f, "'arrays'"),
            Token::Main => write!(f, "'main'"),
            Token::Begin => write!(f, "'begin'"),
            Token::End => write!(f, "'end'"),
            Token::Array => write!(f, "'array'"),
            Token::Of => write!(f, "'of'"),
            Token::Func => write!(f, "'func'"),
            Token::Void => write!(f, "'void'"),
            Token::Const => write!(f, "'const'"),
            Token::Integer => write!(f, "'integer'"),
            Token::Real => write!(f, "'real'"),
            Token::Boolean => write!(f, "'boolean'"),
            Token::For => write!(f, "'for'"),
            Token::Repeat => write!(f, "'repeat'"),
            Token::Until => write!(f, "'until'"),
            Token::If => write!(f, "'if'"),
            Token::Else => write!(f, "'else'"),
            Token::In => write!(f, "'In'"),
            Token::Out => write!(f, "'Out'"),
            Token::Line => write!(f, "'Line'"),
            Token::Return => write!(f, "'return'"),
            Token::Not => write!(f, "'not'"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
            Token::Xor => write!(f, "'xor'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::IntLit(s) => write!(f, "integer literal {}", s),
            Token::RealLit(s) => write!(f, "real literal {}", s),
            Token::StringLit(s) => write!(f, "string \"{}\"", s),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::LessEq => write!(f, "'<='"),
            Token::GreaterEq => write!(f, "'>='"),
            Token::LessLess => write!(f, "'<<'"),
            Token::GreaterGreater => write!(f, "'>>'"),
            Token::PlusEq => write!(f, "'+='"),
            Token::MinusEq => write!(f, "'-='"),
            Token::StarEq => write!(f, "'*='"),
            Token::SlashEq => write!(f, "'/='"),
            Token::Assign => write!(f, "'='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Caret => write!(f, "'^'"),
            Token::Less => write!(f, "'<'"),
            Token::Greater => write!(f, "'>'"),
            Token::Comma => write!(f, "','"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Colon => write!(f, "':'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Dot => write!(f, "'.'"),
        }
    }
}

/// Source position, 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub row: u32,
    pub col: u32,
}

/// Byte-offset to (row, col) translation over a fixed source.
pub struct SourceIndex {
    line_starts: Vec<usize>,
}

impl SourceIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                starts.push(i + 1);
            }
        }
        Self { line_starts: starts }
    }

    /// Convert a byte offset to a 1-based (row, col) position.
    pub fn pos_at(&self, byte: usize) -> Pos {
        let line = match self.line_starts.binary_search(&byte) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Pos {
            row: (line + 1) as u32,
            col: (byte - self.line_starts[line] + 1) as u32,
        }
    }
}

/// The canonical spelling of a keyword, if the token is one.
fn canonical_keyword(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::Cd25 => "CD25",
        Token::Constants => "constants",
        Token::Types => "types",
        Token::Is => "is",
        Token::Arrays => "arrays",
        Token::Main => "main",
        Token::Begin => "begin",
        Token::End => "end",
        Token::Array => "array",
        Token::Of => "of",
        Token::Func => "func",
        Token::Void => "void",
        Token::Const => "const",
        Token::Integer => "integer",
        Token::Real => "real",
        Token::Boolean => "boolean",
        Token::For => "for",
        Token::Repeat => "repeat",
        Token::Until => "until",
        Token::If => "if",
        Token::Else => "else",
        Token::In => "In",
        Token::Out => "Out",
        Token::Line => "Line",
        Token::Return => "return",
        Token::Not => "not",
        Token::And => "and",
        Token::Or => "or",
        Token::Xor => "xor",
        Token::True => "true",
        Token::False => "false",
        _ => return None,
    })
}

/// Tokenize the whole source. Unrecognised characters are reported to the
/// lister and skipped; lexing always runs to the end of the input.
pub fn lex(source: &str, lister: &mut Lister) -> Vec<(Token, Pos)> {
    let index = SourceIndex::new(source);
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let pos = index.pos_at(span.start);
        match result {
            Ok(token) => {
                if let Some(canon) = canonical_keyword(&token) {
                    let slice = lexer.slice();
                    if slice != canon {
                        lister.lex_warn(
                            pos.row,
                            pos.col,
                            format!("proper capitalisation is {}", canon),
                        );
                    }
                }
                tokens.push((token, pos));
            }
            Err(()) => {
                let bad = source[span.start..].chars().next().unwrap_or('\0');
                lister.lex_error(pos.row, pos.col, format!("unexpected character '{}'", bad));
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let mut lister = Lister::new();
        let toks = lex(source, &mut lister);
        assert!(!lister.has_errors(), "unexpected lex errors: {}", lister.report());
        toks.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let toks = lex_ok("CD25 Begin END constants");
        assert_eq!(
            toks,
            vec![Token::Cd25, Token::Begin, Token::End, Token::Constants]
        );
    }

    #[test]
    fn miscapitalised_keyword_warns() {
        let mut lister = Lister::new();
        lex("Begin", &mut lister);
        assert_eq!(lister.diagnostics().len(), 1);
        assert!(!lister.has_errors());
    }

    #[test]
    fn comments_are_skipped() {
        let toks = lex_ok("x /-- a line comment\n= /** block\ncomment **/ 1");
        assert_eq!(
            toks,
            vec![
                Token::Ident("x".into()),
                Token::Assign,
                Token::IntLit("1".into())
            ]
        );
    }

    #[test]
    fn real_literal_needs_digits_both_sides() {
        let toks = lex_ok("1.5 arr[2].f");
        assert_eq!(toks[0], Token::RealLit("1.5".into()));
        // '2].f' must not lex as a real literal
        assert!(toks.contains(&Token::Dot));
    }

    #[test]
    fn compound_operators() {
        let toks = lex_ok("+= -= *= /= == != <= >= << >>");
        assert_eq!(
            toks,
            vec![
                Token::PlusEq,
                Token::MinusEq,
                Token::StarEq,
                Token::SlashEq,
                Token::EqEq,
                Token::NotEq,
                Token::LessEq,
                Token::GreaterEq,
                Token::LessLess,
                Token::GreaterGreater,
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let mut lister = Lister::new();
        let toks = lex("x\n  y", &mut lister);
        assert_eq!(toks[0].1, Pos { row: 1, col: 1 });
        assert_eq!(toks[1].1, Pos { row: 2, col: 3 });
    }

    #[test]
    fn bad_character_is_reported_and_skipped() {
        let mut lister = Lister::new();
        let toks = lex("x = @ 1", &mut lister);
        assert!(lister.has_errors());
        assert_eq!(toks.len(), 3);
    }
}
