//! Parser for the tag expression DSL.
//!
//! Grammar (in rough EBNF):
//!
//! expression = or_expr
//! or_expr    = and_expr ("|" and_expr)*
//! and_expr   = not_expr (("+" | "-") not_expr)*     a-b is a+!b
//! not_expr   = "!" not_expr | "-" primary | primary
//! primary    = "(" expression ")" | TAG

use super::ast::ExpressionNode;
use super::error::{MAX_DEPTH, ParseError, ParseErrorKind};
use super::lexer::{Spanned, Token, tokenize};

const EXPECT_OPERAND: &str = "a tag or '('";
const EXPECT_OPERATOR: &str = "an operator ('+', '|' or '-')";
const EXPECT_SHALLOWER: &str = "at most 64 levels of nesting";

/// A parsed subtree together with its depth.
type Parsed = (ExpressionNode, usize);

/// Parser state.
struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    nesting: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Spanned>, input: &'a str) -> Self {
        Parser {
            tokens,
            pos: 0,
            nesting: 0,
            input,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_offset(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(s) => s.offset,
            None => self.input.chars().count(),
        }
    }

    /// Offset of the token just consumed.
    fn previous_offset(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|s| s.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let tok = self
            .tokens
            .get(self.pos)
            .map(|s| s.token.clone())
            .unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn error(&self, kind: ParseErrorKind, offset: usize, expected: &str) -> ParseError {
        ParseError::new(kind, offset, expected, self.input)
    }

    fn enter(&mut self, offset: usize) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(self.error(ParseErrorKind::NestingTooDeep, offset, EXPECT_SHALLOWER));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    /// Check the depth of a finished subtree against the limit.
    fn build(
        &self,
        node: ExpressionNode,
        depth: usize,
        offset: usize,
    ) -> Result<Parsed, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error(ParseErrorKind::NestingTooDeep, offset, EXPECT_SHALLOWER));
        }
        Ok((node, depth))
    }

    /// Combine the operands of one `+` or `|` chain into a single node.
    ///
    /// Operands of the same kind (from redundant parentheses) are merged, so
    /// the depth is one more than the deepest operand that stays separate.
    fn build_chain(
        &self,
        mut operands: Vec<Parsed>,
        is_same_kind: fn(&ExpressionNode) -> bool,
        combine: fn(Vec<ExpressionNode>) -> ExpressionNode,
        offset: usize,
    ) -> Result<Parsed, ParseError> {
        if operands.len() == 1 {
            return Ok(operands.swap_remove(0));
        }
        let depth = operands
            .iter()
            .map(|(node, depth)| if is_same_kind(node) { *depth } else { depth + 1 })
            .max()
            .unwrap_or(1);
        let node = combine(operands.into_iter().map(|(node, _)| node).collect());
        self.build(node, depth, offset)
    }

    /// Parse OR expression: and_expr ("|" and_expr)*
    fn parse_or_expr(&mut self) -> Result<Parsed, ParseError> {
        let offset = self.peek_offset();
        let mut operands = vec![self.parse_and_expr()?];

        while matches!(self.peek(), Token::Or) {
            self.advance(); // consume |
            operands.push(self.parse_and_expr()?);
        }

        self.build_chain(
            operands,
            |node| matches!(node, ExpressionNode::Or { .. }),
            ExpressionNode::any,
            offset,
        )
    }

    /// Parse AND expression: not_expr (("+" | "-") not_expr)*
    fn parse_and_expr(&mut self) -> Result<Parsed, ParseError> {
        let offset = self.peek_offset();
        let mut operands = vec![self.parse_not_expr()?];

        loop {
            match self.peek() {
                Token::And => {
                    self.advance(); // consume +
                    operands.push(self.parse_not_expr()?);
                }
                Token::Minus => {
                    // `a-b` between terms means `a + !b`
                    let minus = self.peek_offset();
                    self.advance(); // consume -
                    let (right, depth) = self.parse_primary()?;
                    operands.push(self.build(ExpressionNode::not(right), depth + 1, minus)?);
                }
                _ => break,
            }
        }

        self.build_chain(
            operands,
            |node| matches!(node, ExpressionNode::And { .. }),
            ExpressionNode::all,
            offset,
        )
    }

    /// Parse NOT expression: "!" not_expr | "-" primary | primary
    fn parse_not_expr(&mut self) -> Result<Parsed, ParseError> {
        let offset = self.peek_offset();
        match self.peek() {
            Token::Not => {
                self.advance(); // consume !
                self.enter(offset)?;
                let (inner, depth) = self.parse_not_expr()?;
                self.leave();
                self.build(ExpressionNode::not(inner), depth + 1, offset)
            }
            Token::Minus => {
                self.advance(); // consume -
                let (inner, depth) = self.parse_primary()?;
                self.build(ExpressionNode::not(inner), depth + 1, offset)
            }
            _ => self.parse_primary(),
        }
    }

    /// Parse primary expression: "(" expression ")" | TAG
    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        let offset = self.peek_offset();
        match self.peek().clone() {
            Token::Tag(value) => {
                self.advance();
                Ok((ExpressionNode::Tag { value }, 1))
            }
            Token::LParen => {
                self.advance(); // consume (
                self.enter(offset)?;
                if matches!(self.peek(), Token::RParen) {
                    return Err(self.error(
                        ParseErrorKind::EmptyOperand,
                        self.peek_offset(),
                        "an expression inside the parentheses",
                    ));
                }
                let inner = self.parse_or_expr()?;
                match self.peek() {
                    Token::RParen => {
                        self.advance();
                    }
                    Token::Eof => {
                        return Err(self.error(
                            ParseErrorKind::UnbalancedParens,
                            offset,
                            "')' to close this '('",
                        ));
                    }
                    _ => {
                        return Err(self.error(
                            ParseErrorKind::MissingOperator,
                            self.peek_offset(),
                            EXPECT_OPERATOR,
                        ));
                    }
                }
                self.leave();
                Ok(inner)
            }
            Token::Eof => Err(self.error(
                ParseErrorKind::TrailingOperator,
                self.previous_offset(),
                EXPECT_OPERAND,
            )),
            Token::RParen if self.nesting == 0 => Err(self.error(
                ParseErrorKind::UnbalancedParens,
                offset,
                "no ')' without a matching '('",
            )),
            Token::RParen | Token::And | Token::Or | Token::Not | Token::Minus => {
                Err(self.error(ParseErrorKind::EmptyOperand, offset, EXPECT_OPERAND))
            }
        }
    }
}

/// Parse a tag expression string into an AST.
///
/// Empty or whitespace-only input yields [`ExpressionNode::AlwaysMatch`].
/// On failure no tree is returned. Parsed trees are never deeper than
/// [`MAX_DEPTH`].
pub fn parse_expression(input: &str) -> Result<ExpressionNode, ParseError> {
    if input.trim().is_empty() {
        return Ok(ExpressionNode::AlwaysMatch);
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens, input);
    let (ast, depth) = parser.parse_or_expr()?;

    // Ensure we consumed all tokens
    let offset = parser.peek_offset();
    match parser.peek() {
        Token::Eof => {}
        Token::RParen => {
            return Err(parser.error(
                ParseErrorKind::UnbalancedParens,
                offset,
                "no ')' without a matching '('",
            ));
        }
        _ => {
            return Err(parser.error(ParseErrorKind::MissingOperator, offset, EXPECT_OPERATOR));
        }
    }

    tracing::debug!(expression = input, depth, "parsed expression");
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(v: &str) -> ExpressionNode {
        ExpressionNode::tag(v)
    }

    fn kind_of(input: &str) -> ParseErrorKind {
        parse_expression(input).unwrap_err().kind
    }

    #[test]
    fn test_single_tag() {
        assert_eq!(parse_expression("user:john").unwrap(), tag("user:john"));
    }

    #[test]
    fn test_and_expression() {
        assert_eq!(
            parse_expression("user:john+device:mobile").unwrap(),
            ExpressionNode::and(tag("user:john"), tag("device:mobile"))
        );
    }

    #[test]
    fn test_or_expression() {
        assert_eq!(
            parse_expression("user:john|user:jane").unwrap(),
            ExpressionNode::or(tag("user:john"), tag("user:jane"))
        );
    }

    #[test]
    fn test_minus_between_terms_is_and_not() {
        assert_eq!(
            parse_expression("area:home-area:bedroom").unwrap(),
            ExpressionNode::and(tag("area:home"), ExpressionNode::not(tag("area:bedroom")))
        );
    }

    #[test]
    fn test_prefix_negations() {
        assert_eq!(parse_expression("-a").unwrap(), ExpressionNode::not(tag("a")));
        assert_eq!(
            parse_expression("!!a").unwrap(),
            ExpressionNode::not(ExpressionNode::not(tag("a")))
        );
        assert_eq!(
            parse_expression("a|-b").unwrap(),
            ExpressionNode::or(tag("a"), ExpressionNode::not(tag("b")))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            parse_expression("a|b+c").unwrap(),
            ExpressionNode::or(tag("a"), ExpressionNode::and(tag("b"), tag("c")))
        );
        assert_eq!(
            parse_expression("(a|b)+c").unwrap(),
            ExpressionNode::and(ExpressionNode::or(tag("a"), tag("b")), tag("c"))
        );
    }

    #[test]
    fn test_complex_expression() {
        let ast = parse_expression("user:john+device:mobile-device:watch|user:jane").unwrap();
        assert_eq!(
            ast,
            ExpressionNode::Or {
                operands: vec![
                    ExpressionNode::And {
                        operands: vec![
                            tag("user:john"),
                            tag("device:mobile"),
                            ExpressionNode::not(tag("device:watch")),
                        ]
                    },
                    tag("user:jane"),
                ]
            }
        );
    }

    #[test]
    fn test_chains_are_flat() {
        let flat = ExpressionNode::And {
            operands: vec![tag("a"), tag("b"), tag("c")],
        };
        assert_eq!(parse_expression("a+b+c").unwrap(), flat);
        assert_eq!(parse_expression("(a+b)+c").unwrap(), flat);
        assert_eq!(parse_expression("a+(b+c)").unwrap(), flat);
        assert_eq!(parse_expression("a+b+c").unwrap().depth(), 2);
    }

    #[test]
    fn test_whitespace_insignificant() {
        assert_eq!(
            parse_expression("  user:john  +\tdevice:mobile ").unwrap(),
            parse_expression("user:john+device:mobile").unwrap()
        );
    }

    #[test]
    fn test_empty_filter() {
        assert_eq!(parse_expression("").unwrap(), ExpressionNode::AlwaysMatch);
        assert_eq!(parse_expression("   ").unwrap(), ExpressionNode::AlwaysMatch);
    }

    #[test]
    fn test_trailing_operator() {
        let err = parse_expression("a+").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TrailingOperator);
        assert_eq!(err.offset, 1);
        assert_eq!(kind_of("a|"), ParseErrorKind::TrailingOperator);
        assert_eq!(kind_of("!"), ParseErrorKind::TrailingOperator);
        assert_eq!(kind_of("a-"), ParseErrorKind::TrailingOperator);
    }

    #[test]
    fn test_empty_operand() {
        assert_eq!(kind_of("()"), ParseErrorKind::EmptyOperand);
        assert_eq!(kind_of("+tag"), ParseErrorKind::EmptyOperand);
        assert_eq!(kind_of("a|+b"), ParseErrorKind::EmptyOperand);
        assert_eq!(kind_of("(a+)"), ParseErrorKind::EmptyOperand);
        assert_eq!(kind_of("a--b"), ParseErrorKind::EmptyOperand);
    }

    #[test]
    fn test_unbalanced_parens() {
        let err = parse_expression("(a").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParens);
        assert_eq!(err.offset, 0);
        assert_eq!(kind_of("a)"), ParseErrorKind::UnbalancedParens);
        assert_eq!(kind_of(")"), ParseErrorKind::UnbalancedParens);
        // a stray ')' after an operator is unbalanced, not an empty operand
        assert_eq!(kind_of("a+)"), ParseErrorKind::UnbalancedParens);
        assert_eq!(kind_of("((a|b)"), ParseErrorKind::UnbalancedParens);
    }

    #[test]
    fn test_adjacent_terms_are_not_implicit_and() {
        let err = parse_expression("a b").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingOperator);
        assert_eq!(err.offset, 2);
        assert_eq!(kind_of("a(b)"), ParseErrorKind::MissingOperator);
        assert_eq!(kind_of("(a)b"), ParseErrorKind::MissingOperator);
    }

    #[test]
    fn test_paren_nesting_limit() {
        let deep = format!("{}a{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(kind_of(&deep), ParseErrorKind::NestingTooDeep);

        let ok = format!("{}a{}", "(".repeat(60), ")".repeat(60));
        assert_eq!(parse_expression(&ok).unwrap(), tag("a"));

        let negations = format!("{}a", "!".repeat(100));
        assert_eq!(kind_of(&negations), ParseErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_long_chains_are_accepted() {
        let users: Vec<String> = (0..1000).map(|i| format!("user:u{i}")).collect();
        let ast = parse_expression(&users.join("|")).unwrap();
        assert_eq!(ast.depth(), 2);
        assert_eq!(ast.node_count(), 1001);

        let mixed = (0..500)
            .map(|i| format!("device:d{i}+area:a{i}"))
            .collect::<Vec<_>>()
            .join("|");
        assert_eq!(parse_expression(&mixed).unwrap().depth(), 3);
    }

    #[test]
    fn test_tree_depth_limit() {
        // each level alternates the operator so nothing is merged
        let mut expr = "a|b".to_string();
        for i in 0..62 {
            expr = if i % 2 == 0 {
                format!("b+({expr})")
            } else {
                format!("a|({expr})")
            };
        }
        assert_eq!(parse_expression(&expr).unwrap().depth(), MAX_DEPTH);

        let too_deep = format!("b+({expr})");
        assert_eq!(kind_of(&too_deep), ParseErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_error_carries_expression() {
        let err = parse_expression("user:john+").unwrap_err();
        assert_eq!(err.expression, "user:john+");
        assert!(!err.expected.is_empty());
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "a",
            "a+b|c",
            "a|(b|c)",
            "(a|b)+-c",
            "!!a",
            "area:home-area:bedroom",
            "!(a+b)|c+(d|e)",
        ] {
            let ast = parse_expression(input).unwrap();
            assert_eq!(parse_expression(&ast.to_string()).unwrap(), ast, "{input}");
        }
    }
}
