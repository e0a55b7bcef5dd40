use logos::Logos;
use std::fmt;

/// Token types for TS/JSX module source.
///
/// Keywords are lexed as `Ident` and recognised by the parser, since most of
/// them are contextual (`type`, `as`, `from`, `of`) or legal property names.
/// Template literal bodies and JSX text are scanned raw by the parser, which
/// is why lexing always restarts at an arbitrary byte offset.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token<'src> {
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice())]
    Ident(&'src str),

    // Raw slice including quotes; decoded by the parser
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| lex.slice())]
    String(&'src str),

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| lex.slice())]
    Number(&'src str),

    #[token("`")]
    Backtick,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token("...")]
    Ellipsis,

    #[token(".")]
    Dot,

    #[token("?.")]
    QuestionDot,

    #[token("?")]
    Question,

    #[token("??")]
    Nullish,

    #[token("??=")]
    NullishAssign,

    #[token(":")]
    Colon,

    #[token("=>")]
    Arrow,

    #[token("=")]
    Assign,

    #[token("==")]
    LooseEq,

    #[token("===")]
    StrictEq,

    #[token("!")]
    Bang,

    #[token("!=")]
    LooseNe,

    #[token("!==")]
    StrictNe,

    #[token("<")]
    LAngle,

    #[token("<=")]
    LessEq,

    #[token(">")]
    RAngle,

    #[token(">=")]
    GreaterEq,

    #[token("+")]
    Plus,

    #[token("++")]
    PlusPlus,

    #[token("+=")]
    PlusAssign,

    #[token("-")]
    Minus,

    #[token("--")]
    MinusMinus,

    #[token("-=")]
    MinusAssign,

    #[token("*")]
    Star,

    #[token("**")]
    StarStar,

    #[token("*=")]
    StarAssign,

    #[token("/")]
    Slash,

    #[token("/=")]
    SlashAssign,

    #[token("%")]
    Percent,

    #[token("%=")]
    PercentAssign,

    #[token("&")]
    Amp,

    #[token("&&")]
    AmpAmp,

    #[token("&&=")]
    AndAssign,

    #[token("|")]
    Pipe,

    #[token("||")]
    PipePipe,

    #[token("||=")]
    OrAssign,

    #[token("^")]
    Caret,

    #[token("~")]
    Tilde,

    #[token("@")]
    At,

    #[token("#")]
    Hash,
}

impl<'src> Token<'src> {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(ident) if *ident == name)
    }
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::String(s) | Token::Number(s) => write!(f, "{}", s),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A token with its absolute byte range in the file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lexed<'src> {
    /// `None` at end of input
    pub token: Option<Token<'src>>,
    pub start: usize,
    pub end: usize,
}

/// Lex the first token at `offset`.
///
/// Returns the byte offset of the failing character on a lexer error.
pub fn lex_at(source: &str, offset: usize) -> Result<Lexed<'_>, usize> {
    let rest = &source[offset..];
    let mut lexer = Token::lexer(rest);
    match lexer.next() {
        None => Ok(Lexed {
            token: None,
            start: source.len(),
            end: source.len(),
        }),
        Some(Ok(token)) => {
            let span = lexer.span();
            Ok(Lexed {
                token: Some(token),
                start: offset + span.start,
                end: offset + span.end,
            })
        }
        Some(Err(())) => Err(offset + lexer.span().start),
    }
}

/// Tokenize a whole snippet. Only meaningful for sources without template
/// literals or JSX text; used by tests and diagnostics.
pub fn tokenize(source: &str) -> Vec<(Token<'_>, std::ops::Range<usize>)> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next() {
        if let Ok(token) = token {
            tokens.push((token, lexer.span()));
        }
    }

    tokens
}
