use super::token::{Token, TokenType};
use anyhow::{Result, bail};

/// Lexer for the minic C subset
pub struct Lexer {
    /// Source code being lexed
    source: Vec<char>,
    /// Current position in source
    current: usize,
    /// Start position of current token
    start: usize,
    /// Current line number
    line: usize,
    /// Current column number
    column: usize,
}

impl Lexer {
    /// Create a new lexer from source code
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            current: 0,
            start: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source and return all tokens, terminated by `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.is_at_end() {
                break;
            }
            self.start = self.current;
            tokens.push(self.next_token()?);
        }

        tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        log::trace!("tokenized {} tokens", tokens.len());
        Ok(tokens)
    }

    /// Get the next token from the source
    fn next_token(&mut self) -> Result<Token> {
        let start_column = self.column;
        let c = self.advance();

        match c {
            '(' => Ok(self.make_token(TokenType::LeftParen)),
            ')' => Ok(self.make_token(TokenType::RightParen)),
            '{' => Ok(self.make_token(TokenType::LeftBrace)),
            '}' => Ok(self.make_token(TokenType::RightBrace)),
            ',' => Ok(self.make_token(TokenType::Comma)),
            ';' => Ok(self.make_token(TokenType::Semicolon)),
            '+' => Ok(self.make_token(TokenType::Plus)),
            '-' => Ok(self.make_token(TokenType::Minus)),
            '*' => Ok(self.make_token(TokenType::Star)),
            '/' => Ok(self.make_token(TokenType::Slash)),
            '%' => Ok(self.make_token(TokenType::Percent)),
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenType::BangEqual))
                } else {
                    Ok(self.make_token(TokenType::Bang))
                }
            }
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenType::EqualEqual))
                } else {
                    Ok(self.make_token(TokenType::Equal))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenType::LessEqual))
                } else {
                    Ok(self.make_token(TokenType::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenType::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenType::Greater))
                }
            }
            '&' => {
                if self.match_char('&') {
                    Ok(self.make_token(TokenType::AndAnd))
                } else {
                    bail!("Unsupported operator '&' at line {}, column {}", self.line, start_column)
                }
            }
            '|' => {
                if self.match_char('|') {
                    Ok(self.make_token(TokenType::OrOr))
                } else {
                    bail!("Unsupported operator '|' at line {}, column {}", self.line, start_column)
                }
            }
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            _ => bail!("Unexpected character '{}' at line {}, column {}", c, self.line, start_column),
        }
    }

    /// Parse a decimal integer literal
    fn number(&mut self) -> Result<Token> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let text = self.lexeme();
        let value: i32 = match text.parse() {
            Ok(value) => value,
            Err(_) => bail!(
                "Integer literal '{}' out of range at line {}, column {}",
                text,
                self.line,
                self.token_column()
            ),
        };
        Ok(self.make_token(TokenType::Integer(value)))
    }

    /// Parse an identifier or keyword
    fn identifier(&mut self) -> Result<Token> {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.lexeme();
        let token_type = self.keyword_or_identifier(&text);
        Ok(self.make_token(token_type))
    }

    /// Check if text is a keyword or identifier
    fn keyword_or_identifier(&self, text: &str) -> TokenType {
        match text {
            "int" => TokenType::Int,
            "void" => TokenType::Void,
            "float" => TokenType::Float,
            "char" => TokenType::Char,
            "if" => TokenType::If,
            "else" => TokenType::Else,
            "while" => TokenType::While,
            "for" => TokenType::For,
            "return" => TokenType::Return,
            _ => TokenType::Identifier(text.to_string()),
        }
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<()> {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == '*' => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            bail!("Unterminated comment starting at line {}, column {}", line, column);
                        }
                        if self.peek() == '*' && self.peek_next() == '/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Check if we've reached the end of source
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    /// Get the current character and advance, keeping line/column in step
    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// Peek at the current character without advancing
    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    /// Peek at the next character
    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    /// Match and consume a specific character
    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_at_end() {
            return false;
        }
        self.advance();
        true
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    /// Column of the token being built; tokens never span lines
    fn token_column(&self) -> usize {
        self.column - (self.current - self.start)
    }

    /// Create a token from the current position
    fn make_token(&self, token_type: TokenType) -> Token {
        Token::new(token_type, self.lexeme(), self.line, self.token_column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(source: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(source);
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = types("int void float char if else while for return");

        assert_eq!(
            tokens,
            vec![
                TokenType::Int,
                TokenType::Void,
                TokenType::Float,
                TokenType::Char,
                TokenType::If,
                TokenType::Else,
                TokenType::While,
                TokenType::For,
                TokenType::Return,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = types("+ - * / % = == ! != < <= > >= && ||");

        assert_eq!(
            tokens,
            vec![
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::AndAnd,
                TokenType::OrOr,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = types("/* header\n * more */ x // trailing\n;");

        assert_eq!(
            tokens,
            vec![
                TokenType::Identifier("x".to_string()),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("int main() {\n    return 42;\n}");
        let tokens = lexer.tokenize().unwrap();

        let ret = &tokens[5];
        assert_eq!(ret.token_type, TokenType::Return);
        assert_eq!((ret.line, ret.column), (2, 5));

        let literal = &tokens[6];
        assert_eq!(literal.token_type, TokenType::Integer(42));
        assert_eq!(literal.lexeme, "42");
        assert_eq!((literal.line, literal.column), (2, 12));
    }

    #[test]
    fn test_integer_out_of_range() {
        let mut lexer = Lexer::new("2147483647 2147483648");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("a & b").tokenize().is_err());
        assert!(Lexer::new("a | b").tokenize().is_err());
        assert!(Lexer::new("\"str\"").tokenize().is_err());
        assert!(Lexer::new("/* never closed").tokenize().is_err());
    }
}
