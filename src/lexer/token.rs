/// Token types for the minic C subset
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Int,        // int
    Void,       // void
    Float,      // float
    Char,       // char
    If,         // if
    Else,       // else
    While,      // while
    For,        // for
    Return,     // return

    // Literals
    Identifier(String),
    Integer(i32),

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    Equal,      // =
    EqualEqual, // ==
    Bang,       // !
    BangEqual,  // !=
    Less,       // <
    LessEqual,  // <=
    Greater,    // >
    GreaterEqual, // >=
    AndAnd,     // &&
    OrOr,       // ||

    // Delimiters
    LeftParen,      // (
    RightParen,     // )
    LeftBrace,      // {
    RightBrace,     // }
    Comma,          // ,
    Semicolon,      // ;

    Eof,
}

impl TokenType {
    /// Type specifiers the lexer recognises, supported or not
    pub fn is_type_keyword(&self) -> bool {
        matches!(self, TokenType::Int | TokenType::Void | TokenType::Float | TokenType::Char)
    }
}

/// A token with its type, literal value, and position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            token_type,
            lexeme,
            line,
            column,
        }
    }

    /// Check if this token is of a specific type
    pub fn is_type(&self, token_type: &TokenType) -> bool {
        match (&self.token_type, token_type) {
            (TokenType::Identifier(_), TokenType::Identifier(_)) => true,
            (TokenType::Integer(_), TokenType::Integer(_)) => true,
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} '{}' at {}:{}", self.token_type, self.lexeme, self.line, self.column)
    }
}
