//! Formula parser
//!
//! A recursive descent parser for formula expressions with standard arithmetic
//! precedence:
//!
//! ```text
//! expression     := additive
//! additive       := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/") unary)*
//! unary          := ("-" | "+") unary | power
//! power          := primary ("**" unary)?          (legacy expressions only)
//! primary        := number | "[" name "]" | "(" expression ")"
//! ```

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use fieldcalc_core::ValidationOptions;

/// Deepest run of parentheses, unary signs and `**` operands the parser descends into
pub const MAX_NESTING_DEPTH: usize = 100;

/// Tallest expression tree the parser builds, long operator chains included
pub const MAX_TREE_HEIGHT: usize = 1000;

/// Parse an expression with strict options (no `**`)
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{parse_expression, Expr};
///
/// let ast = parse_expression("[price] * 2").unwrap();
/// assert_eq!(ast.field_references(), vec!["price"]);
///
/// assert!(parse_expression("[a] [b]").is_err());
/// ```
pub fn parse_expression(expression: &str) -> FormulaResult<Expr> {
    parse_expression_with(expression, &ValidationOptions::default())
}

/// Parse an expression, accepting `**` when `options.allow_double_star` is set
pub fn parse_expression_with(expression: &str, options: &ValidationOptions) -> FormulaResult<Expr> {
    let mut parser = ExprParser::new(expression.trim(), options.allow_double_star);
    let (expr, _) = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {} after expression",
            parser.current_token().describe()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Field(String),
    /// Bare word outside brackets
    Identifier(String),

    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,

    LeftParen,
    RightParen,

    /// Scanning failed; carries the reason
    Invalid(String),

    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Field(name) => format!("field [{}]", name),
            Token::Identifier(name) => format!("name '{}'", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::DoubleStar => "'**'".into(),
            Token::Slash => "'/'".into(),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::Invalid(reason) => reason.clone(),
            Token::Eof => "end of expression".into(),
        }
    }
}

/// A parsed subexpression and the height of its tree
type Parsed = (Expr, usize);

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    allow_power: bool,
    current_token: Option<Token>,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str, allow_power: bool) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            allow_power,
            current_token: None,
            depth: 0,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        match c {
            '+' => {
                self.advance();
                Token::Plus
            }
            '-' => {
                self.advance();
                Token::Minus
            }
            '*' => {
                self.advance();
                if self.allow_power && self.peek_char() == Some('*') {
                    self.advance();
                    return Token::DoubleStar;
                }
                Token::Star
            }
            '/' => {
                self.advance();
                Token::Slash
            }
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            '[' => self.scan_field(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphanumeric() || c == '_' => self.scan_identifier(),
            other => {
                self.advance();
                Token::Invalid(format!("unexpected character '{}'", other))
            }
        }
    }

    fn scan_field(&mut self) -> Token {
        self.advance(); // Skip '['

        let start = self.pos;
        while self.peek_char().map_or(false, |c| c != ']') {
            self.advance();
        }

        if self.is_at_end() {
            return Token::Invalid("unterminated field reference".into());
        }

        let name = &self.input[start..self.pos];
        self.advance(); // Skip ']'

        if name.is_empty() {
            return Token::Invalid("empty field reference []".into());
        }
        Token::Field(name.to_string())
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        self.scan_digits();
        let integer_end = self.pos;

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            self.scan_digits();
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            if !self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                return Token::Invalid(format!(
                    "malformed number '{}'",
                    &self.input[start..self.pos]
                ));
            }
            self.scan_digits();
        }

        // Digit group separators: 1_000_000
        let num_str: String = self.input[start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();

        // 05 is not a number, but 00 and 05.5 are
        let integer = &self.input[start..integer_end];
        if integer_end == self.pos
            && integer.starts_with('0')
            && integer.chars().any(|c| c.is_ascii_digit() && c != '0')
        {
            return Token::Invalid(format!("leading zeros are not allowed in '{}'", integer));
        }
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(format!("malformed number '{}'", num_str)),
        }
    }

    /// Digits, with single underscores allowed between them
    fn scan_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            let separator = c == '_'
                && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())
                && self.input[..self.pos]
                    .chars()
                    .next_back()
                    .map_or(false, |p| p.is_ascii_digit());
            if !(c.is_ascii_digit() || separator) {
                break;
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {}, got {}",
                expected.describe(),
                self.current_token().describe()
            )))
        }
    }

    // === Nesting limits ===

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(too_deep());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Height of a node whose tallest child has `child_height`
    fn grow(child_height: usize) -> FormulaResult<usize> {
        let height = child_height + 1;
        if height > MAX_TREE_HEIGHT {
            return Err(too_deep());
        }
        Ok(height)
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Addition/Subtraction: +, -
    // 2. Multiplication/Division: *, /
    // 3. Unary: -, +
    // 4. Exponentiation: ** (binds tighter than a unary on its left)
    // 5. Primary: numbers, field references, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Parsed> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> FormulaResult<Parsed> {
        let (mut left, mut height) = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let (right, right_height) = self.parse_multiplicative()?;
            height = Self::grow(height.max(right_height))?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok((left, height))
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Parsed> {
        let (mut left, mut height) = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let (right, right_height) = self.parse_unary()?;
            height = Self::grow(height.max(right_height))?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok((left, height))
    }

    fn parse_unary(&mut self) -> FormulaResult<Parsed> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.consume();
        self.enter()?;
        let (operand, operand_height) = self.parse_unary()?;
        self.leave();
        Ok((
            Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            Self::grow(operand_height)?,
        ))
    }

    fn parse_power(&mut self) -> FormulaResult<Parsed> {
        let (left, left_height) = self.parse_primary()?;

        if matches!(self.current_token(), Token::DoubleStar) {
            self.consume();
            self.enter()?;
            let (right, right_height) = self.parse_unary()?; // Right associative
            self.leave();
            return Ok((
                Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Self::grow(left_height.max(right_height))?,
            ));
        }

        Ok((left, left_height))
    }

    fn parse_primary(&mut self) -> FormulaResult<Parsed> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok((Expr::Number(n), 1))
            }

            Token::Field(name) => {
                self.consume();
                Ok((Expr::Field(name), 1))
            }

            Token::LeftParen => {
                self.consume();
                self.enter()?;
                let parsed = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                self.leave();
                Ok(parsed)
            }

            Token::Identifier(name) => Err(FormulaError::Parse(format!(
                "Unexpected name '{}'; field references must be written as [{}]",
                name, name
            ))),

            Token::Invalid(reason) => Err(FormulaError::Parse(reason)),

            other => Err(FormulaError::Parse(format!(
                "Unexpected {}",
                other.describe()
            ))),
        }
    }
}

fn too_deep() -> FormulaError {
    FormulaError::Parse("expression nested too deeply".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(name: &str) -> Box<Expr> {
        Box::new(Expr::Field(name.into()))
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_expression("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse_expression("2.75").unwrap(), Expr::Number(2.75));
        assert_eq!(parse_expression("1e6").unwrap(), Expr::Number(1e6));
        assert_eq!(parse_expression("1_000_000").unwrap(), Expr::Number(1e6));
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_expression("[Đơn giá]").unwrap(),
            Expr::Field("Đơn giá".into())
        );
    }

    #[test]
    fn test_parse_precedence() {
        // Should parse as a+(b*c)
        let ast = parse_expression("[a] + [b] * [c]").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Add,
                left: field("a"),
                right: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: field("b"),
                    right: field("c"),
                }),
            }
        );
    }

    #[test]
    fn test_parse_left_associative() {
        // (a-b)-c
        let ast = parse_expression("[a] - [b] - [c]").unwrap();
        if let Expr::BinaryOp { op, left, right } = ast {
            assert_eq!(op, BinaryOperator::Subtract);
            assert!(matches!(
                *left,
                Expr::BinaryOp {
                    op: BinaryOperator::Subtract,
                    ..
                }
            ));
            assert_eq!(right, field("c"));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_parentheses() {
        let ast = parse_expression("([a] + [b]) * [c]").unwrap();
        if let Expr::BinaryOp { op, left, .. } = ast {
            assert_eq!(op, BinaryOperator::Multiply);
            assert!(matches!(
                *left,
                Expr::BinaryOp {
                    op: BinaryOperator::Add,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_unary() {
        let ast = parse_expression("(-[a])").unwrap();
        assert_eq!(
            ast,
            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: field("a"),
            }
        );
    }

    #[test]
    fn test_parse_power_only_when_allowed() {
        assert!(parse_expression("[a]**[b]").is_err());

        let legacy = ValidationOptions::legacy();
        let ast = parse_expression_with("-[a]**2", &legacy).unwrap();
        // -(a**2)
        assert!(matches!(
            ast,
            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expression("[a] [b]").is_err());
        assert!(parse_expression("[a] + x").is_err());
        assert!(parse_expression("[a] +").is_err());
        assert!(parse_expression("([a]").is_err());
        assert!(parse_expression("[] + 1").is_err());
        assert!(parse_expression("[open").is_err());
        assert!(parse_expression("2e").is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(
            parse_expression("[a] + 05").unwrap_err(),
            FormulaError::Parse("leading zeros are not allowed in '05'".into())
        );
        assert!(parse_expression("0_7").is_err());
        assert_eq!(parse_expression("0").unwrap(), Expr::Number(0.0));
        assert_eq!(parse_expression("00").unwrap(), Expr::Number(0.0));
        assert_eq!(parse_expression("0.5").unwrap(), Expr::Number(0.5));
        assert_eq!(parse_expression("05.5").unwrap(), Expr::Number(5.5));
        assert_eq!(parse_expression("0e3").unwrap(), Expr::Number(0.0));
        assert_eq!(parse_expression("10").unwrap(), Expr::Number(10.0));
    }

    #[test]
    fn test_deep_parentheses_rejected() {
        let deep = format!("{}[a]{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(parse_expression(&deep).unwrap_err(), too_deep());

        let limit = format!(
            "{}[a]{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(parse_expression(&limit).unwrap(), Expr::Field("a".into()));
    }

    #[test]
    fn test_deep_unary_chain_rejected() {
        let deep = format!("{}[a]", "- ".repeat(10_000));
        assert_eq!(parse_expression(&deep).unwrap_err(), too_deep());
        assert!(parse_expression(&format!("{}[a]", "- ".repeat(50))).is_ok());

        let legacy = ValidationOptions::legacy();
        let tower = vec!["2"; 10_000].join("**");
        assert_eq!(
            parse_expression_with(&tower, &legacy).unwrap_err(),
            too_deep()
        );
    }

    #[test]
    fn test_long_operator_chain() {
        let sum = vec!["[a]"; 500].join(" + ");
        assert_eq!(parse_expression(&sum).unwrap().field_references().len(), 500);

        let huge = vec!["[a]"; 100_000].join(" + ");
        assert_eq!(parse_expression(&huge).unwrap_err(), too_deep());
    }

    #[test]
    fn test_unknown_name_message() {
        let err = parse_expression("[a] + price").unwrap_err();
        assert_eq!(
            err,
            FormulaError::Parse(
                "Unexpected name 'price'; field references must be written as [price]".into()
            )
        );
    }
}
