use crate::ast::*;
use crate::lexer::{Token, TokenType};
use crate::stack::ensure_sufficient_stack;
use anyhow::{Result, bail};

/// Recursive-descent parser for the minic C subset
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Create a new parser from tokens
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.token_type == TokenType::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenType::Eof, String::new(), line, column));
        }
        Parser { tokens, current: 0 }
    }

    /// Parse the tokens into a Program
    pub fn parse(&mut self) -> Result<Program> {
        let mut program = Program::new();

        while !self.is_at_end() {
            if let Some(func) = self.parse_top_level()? {
                program.functions.push(func);
            }
        }

        log::debug!("parsed {} function definitions", program.functions.len());
        Ok(program)
    }

    /// Parse a top-level declaration. Prototypes yield `None`.
    fn parse_top_level(&mut self) -> Result<Option<FunctionDef>> {
        self.consume_int_type("return type")?;
        let name = self.consume_identifier("function name")?;

        if !self.check(TokenType::LeftParen) {
            bail!(
                "Global variable '{}' at line {} is not supported; declare it inside a function",
                name,
                self.previous().line
            );
        }
        self.advance();

        let params = self.parse_parameters()?;
        self.consume(TokenType::RightParen, "')' after parameters")?;

        if self.match_token(TokenType::Semicolon) {
            log::trace!("skipping prototype of '{}'", name);
            return Ok(None);
        }

        self.consume(TokenType::LeftBrace, "'{' before function body")?;
        let body = self.parse_block()?;

        Ok(Some(FunctionDef { name, params, body }))
    }

    /// Parse function parameters
    fn parse_parameters(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();

        if self.check(TokenType::RightParen) {
            return Ok(params);
        }

        // int main(void)
        if self.check(TokenType::Void) && self.peek_next().token_type == TokenType::RightParen {
            self.advance();
            return Ok(params);
        }

        loop {
            self.consume_int_type("parameter type")?;
            params.push(self.consume_identifier("parameter name")?);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse the statements of a block whose '{' was already consumed
    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.extend(self.parse_statement()?);
        }

        self.consume(TokenType::RightBrace, "'}' after block")?;
        Ok(statements)
    }

    /// Parse one source statement into the statements it lowers to
    fn parse_statement(&mut self) -> Result<Vec<Statement>> {
        ensure_sufficient_stack(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Vec<Statement>> {
        if self.peek().token_type.is_type_keyword() {
            return self.parse_local_declaration();
        }

        match self.peek().token_type {
            TokenType::Return => Ok(vec![self.parse_return()?]),
            TokenType::If => Ok(vec![self.parse_if()?]),
            TokenType::While => Ok(vec![self.parse_while()?]),
            TokenType::For => Ok(vec![self.parse_for()?]),
            TokenType::LeftBrace => {
                self.advance();
                Ok(vec![Statement::Block(self.parse_block()?)])
            }
            TokenType::Semicolon => {
                self.advance();
                Ok(Vec::new())
            }
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.consume(TokenType::Semicolon, "';' after statement")?;
                Ok(vec![stmt])
            }
        }
    }

    /// Parse `int a, b = expr;`
    fn parse_local_declaration(&mut self) -> Result<Vec<Statement>> {
        self.consume_int_type("variable type")?;

        let mut statements = Vec::new();
        loop {
            let name = self.consume_identifier("variable name")?;
            statements.push(Statement::Declare(name.clone()));

            if self.match_token(TokenType::Equal) {
                let value = self.parse_expression()?;
                statements.push(Statement::Assign { name, value });
            }

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.consume(TokenType::Semicolon, "';' after declaration")?;
        Ok(statements)
    }

    /// Parse an assignment or expression statement, without the ';'
    fn parse_simple_statement(&mut self) -> Result<Statement> {
        if let TokenType::Identifier(ref name) = self.peek().token_type {
            if self.peek_next().token_type == TokenType::Equal {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Statement::Assign { name, value });
            }
        }

        Ok(Statement::Expression(self.parse_expression()?))
    }

    /// Parse return statement
    fn parse_return(&mut self) -> Result<Statement> {
        self.consume(TokenType::Return, "'return'")?;

        if self.check(TokenType::Semicolon) {
            bail!(
                "Return without a value at line {}; every function returns int",
                self.peek().line
            );
        }

        let value = self.parse_expression()?;
        self.consume(TokenType::Semicolon, "';' after return value")?;
        Ok(Statement::Return(value))
    }

    /// Parse if statement
    fn parse_if(&mut self) -> Result<Statement> {
        self.consume(TokenType::If, "'if'")?;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_branch()?;

        let else_branch = if self.match_token(TokenType::Else) {
            self.parse_branch()?
        } else {
            Vec::new()
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// Parse while loop
    fn parse_while(&mut self) -> Result<Statement> {
        self.consume(TokenType::While, "'while'")?;
        let condition = self.parse_condition()?;
        let body = self.parse_branch()?;

        Ok(Statement::While { condition, body })
    }

    /// Lower `for (init; cond; update) body` onto a block and a while loop
    fn parse_for(&mut self) -> Result<Statement> {
        self.consume(TokenType::For, "'for'")?;
        self.consume(TokenType::LeftParen, "'(' after 'for'")?;

        let mut outer = if self.peek().token_type.is_type_keyword() {
            self.parse_local_declaration()?
        } else if self.match_token(TokenType::Semicolon) {
            Vec::new()
        } else {
            let init = self.parse_simple_statement()?;
            self.consume(TokenType::Semicolon, "';' after loop initializer")?;
            vec![init]
        };

        let condition = if self.check(TokenType::Semicolon) {
            Expression::Literal(1)
        } else {
            self.parse_expression()?
        };
        self.consume(TokenType::Semicolon, "';' after loop condition")?;

        let update = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.parse_simple_statement()?)
        };
        self.consume(TokenType::RightParen, "')' after loop clauses")?;

        let mut body = vec![Statement::Block(self.parse_branch()?)];
        body.extend(update);

        outer.push(Statement::While { condition, body });
        Ok(Statement::Block(outer))
    }

    fn parse_condition(&mut self) -> Result<Expression> {
        self.consume(TokenType::LeftParen, "'(' before condition")?;
        let condition = self.parse_expression()?;
        self.consume(TokenType::RightParen, "')' after condition")?;
        Ok(condition)
    }

    /// Parse the body of an if/else/while/for. A braced body contributes its
    /// statements directly; the construct supplies the scope.
    fn parse_branch(&mut self) -> Result<Vec<Statement>> {
        if self.match_token(TokenType::LeftBrace) {
            self.parse_block()
        } else {
            self.parse_statement()
        }
    }

    /// Parse expression
    pub fn parse_expression(&mut self) -> Result<Expression> {
        ensure_sufficient_stack(|| self.parse_or())
    }

    /// Parse logical OR (lowest precedence)
    fn parse_or(&mut self) -> Result<Expression> {
        let mut expr = self.parse_and()?;

        while self.match_token(TokenType::OrOr) {
            let right = self.parse_and()?;
            expr = Expression::binary(expr, BinaryOp::Or, right);
        }

        Ok(expr)
    }

    /// Parse logical AND
    fn parse_and(&mut self) -> Result<Expression> {
        let mut expr = self.parse_equality()?;

        while self.match_token(TokenType::AndAnd) {
            let right = self.parse_equality()?;
            expr = Expression::binary(expr, BinaryOp::And, right);
        }

        Ok(expr)
    }

    /// Parse equality operators
    fn parse_equality(&mut self) -> Result<Expression> {
        let mut expr = self.parse_comparison()?;

        while self.match_tokens(&[TokenType::EqualEqual, TokenType::BangEqual]) {
            let op = if self.previous().token_type == TokenType::EqualEqual {
                BinaryOp::Equal
            } else {
                BinaryOp::NotEqual
            };
            let right = self.parse_comparison()?;
            expr = Expression::binary(expr, op, right);
        }

        Ok(expr)
    }

    /// Parse comparison operators
    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut expr = self.parse_term()?;

        while self.match_tokens(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let op = match self.previous().token_type {
                TokenType::Greater => BinaryOp::Greater,
                TokenType::GreaterEqual => BinaryOp::GreaterEq,
                TokenType::Less => BinaryOp::Less,
                _ => BinaryOp::LessEq,
            };
            let right = self.parse_term()?;
            expr = Expression::binary(expr, op, right);
        }

        Ok(expr)
    }

    /// Parse addition and subtraction
    fn parse_term(&mut self) -> Result<Expression> {
        let mut expr = self.parse_factor()?;

        while self.match_tokens(&[TokenType::Minus, TokenType::Plus]) {
            let op = if self.previous().token_type == TokenType::Plus {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            let right = self.parse_factor()?;
            expr = Expression::binary(expr, op, right);
        }

        Ok(expr)
    }

    /// Parse multiplication, division, modulo
    fn parse_factor(&mut self) -> Result<Expression> {
        let mut expr = self.parse_unary()?;

        while self.match_tokens(&[TokenType::Slash, TokenType::Star, TokenType::Percent]) {
            let op = match self.previous().token_type {
                TokenType::Slash => BinaryOp::Divide,
                TokenType::Star => BinaryOp::Multiply,
                _ => BinaryOp::Modulo,
            };
            let right = self.parse_unary()?;
            expr = Expression::binary(expr, op, right);
        }

        Ok(expr)
    }

    /// Parse unary operators
    fn parse_unary(&mut self) -> Result<Expression> {
        if self.match_tokens(&[TokenType::Bang, TokenType::Minus]) {
            let op = if self.previous().token_type == TokenType::Bang {
                UnaryOp::Not
            } else {
                UnaryOp::Negate
            };
            let expr = ensure_sufficient_stack(|| self.parse_unary())?;
            return Ok(Expression::unary(op, expr));
        }

        self.parse_call()
    }

    /// Parse a call; only plain names can be called
    fn parse_call(&mut self) -> Result<Expression> {
        let expr = self.parse_primary()?;

        if !self.check(TokenType::LeftParen) {
            return Ok(expr);
        }

        let name = match &expr {
            Expression::Variable(name) => name.clone(),
            _ => bail!(
                "Invalid function call at line {}, column {}",
                self.peek().line,
                self.peek().column
            ),
        };
        self.advance();

        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "')' after arguments")?;

        Ok(Expression::Call { name, args })
    }

    /// Parse primary expressions
    fn parse_primary(&mut self) -> Result<Expression> {
        match self.peek().token_type {
            TokenType::Integer(n) => {
                self.advance();
                Ok(Expression::Literal(n))
            }
            TokenType::Identifier(ref name) => {
                let name = name.clone();
                self.advance();
                Ok(Expression::Variable(name))
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenType::RightParen, "')' after expression")?;
                Ok(expr)
            }
            _ => bail!(
                "Unexpected token '{}' at line {}, column {}. Expected expression.",
                self.peek().lexeme,
                self.peek().line,
                self.peek().column
            ),
        }
    }

    // Helper methods

    fn consume_int_type(&mut self, description: &str) -> Result<()> {
        if self.match_token(TokenType::Int) {
            return Ok(());
        }

        let token = self.peek();
        if token.token_type.is_type_keyword() {
            bail!(
                "Unsupported {} '{}' at line {}, column {}; only int is supported",
                description,
                token.lexeme,
                token.line,
                token.column
            );
        }
        bail!(
            "Expected {} at line {}, column {}. Got '{}' instead.",
            description,
            token.line,
            token.column,
            token.lexeme
        )
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for t in types {
            if self.check(t.clone()) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().is_type(&token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> &Token {
        let index = (self.current + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<()> {
        if self.check(token_type) {
            self.advance();
            Ok(())
        } else {
            bail!(
                "Expected {} at line {}, column {}. Got '{}' instead.",
                message,
                self.peek().line,
                self.peek().column,
                self.peek().lexeme
            )
        }
    }

    fn consume_identifier(&mut self, description: &str) -> Result<String> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => bail!(
                "Expected {} at line {}, column {}. Got '{}' instead.",
                description,
                self.peek().line,
                self.peek().column,
                self.peek().lexeme
            ),
        }
    }
}

/// Lex and parse a source string
pub fn parse_source(source: &str) -> Result<Program> {
    let tokens = crate::lexer::Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}
