//! Recursive-descent parser and evaluator for authored expressions
//!
//! The grammar, lowest precedence first:
//!
//! ```text
//! expression := assignment
//! assignment := variable ('=' | '+=' | '-=' | '*=' | '/=' | '%=') assignment
//!             | logic_or
//! logic_or   := logic_and ('||' logic_and)*
//! logic_and  := equality ('&&' equality)*
//! equality   := comparison (('==' | '!=') comparison)*
//! comparison := term (('<' | '<=' | '>' | '>=') term)*
//! term       := factor (('+' | '-') factor)*
//! factor     := unary (('*' | '/' | '%') unary)*
//! unary      := ('!' | '-') unary | primary
//! primary    := literal | variable | '(' expression ')'
//! ```
//!
//! Evaluation happens directly over the parsed tree against the variable
//! store; assignments write back to the scope their sigil names.

use crate::error::EvalError;
use crate::eval::lexer::Token;
use crate::value::{Scope, Value, VariableStore};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(Scope, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Assign {
        scope: Scope,
        name: String,
        /// Compound operator, `None` for plain `=`
        op: Option<BinOp>,
        value: Box<Expr>,
    },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse the whole token stream as one expression
    pub fn parse(mut self) -> Result<Expr, EvalError> {
        if self.tokens.is_empty() {
            return Err(EvalError::syntax("empty expression"));
        }
        let expr = self.expression()?;
        if self.pos != self.tokens.len() {
            return Err(EvalError::syntax(format!(
                "trailing input after expression: {:?}",
                self.tokens[self.pos]
            )));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        // Assignment needs two tokens of lookahead: a variable followed by
        // an assignment operator.
        if let Some(Token::Var(scope, name)) = self.peek().cloned() {
            if self.tokens.get(self.pos + 1).is_some_and(Token::is_assign) {
                self.pos += 1;
                let op = match self.advance() {
                    Some(Token::Assign) => None,
                    Some(Token::PlusAssign) => Some(BinOp::Add),
                    Some(Token::MinusAssign) => Some(BinOp::Sub),
                    Some(Token::StarAssign) => Some(BinOp::Mul),
                    Some(Token::SlashAssign) => Some(BinOp::Div),
                    Some(Token::PercentAssign) => Some(BinOp::Rem),
                    other => {
                        return Err(EvalError::syntax(format!(
                            "unexpected token {other:?}"
                        )))
                    }
                };
                let value = self.expression()?;
                return Ok(Expr::Assign {
                    scope,
                    name,
                    op,
                    value: Box::new(value),
                });
            }
        }
        self.logic_or()
    }

    fn logic_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.logic_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.logic_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn logic_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::LtEq,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Var(scope, name)) => Ok(Expr::Var(scope, name)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(EvalError::syntax("expected ')'")),
                }
            }
            Some(other) => Err(EvalError::syntax(format!("unexpected token {other:?}"))),
            None => Err(EvalError::syntax("unexpected end of expression")),
        }
    }
}

/// Evaluate a parsed expression against the store
pub fn eval(expr: &Expr, store: &mut VariableStore) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(scope, name) => store
            .get(*scope, name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
        Expr::Unary(op, inner) => {
            let value = eval(inner, store)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(EvalError::type_error(format!(
                        "cannot negate {other}"
                    ))),
                },
            }
        }
        Expr::Binary(op, left, right) => match op {
            // Short-circuiting forms evaluate the right side lazily
            BinOp::And => {
                let l = eval(left, store)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(eval(right, store)?.is_truthy()))
            }
            BinOp::Or => {
                let l = eval(left, store)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(eval(right, store)?.is_truthy()))
            }
            _ => {
                let l = eval(left, store)?;
                let r = eval(right, store)?;
                apply_binop(*op, l, r)
            }
        },
        Expr::Assign {
            scope,
            name,
            op,
            value,
        } => {
            let rhs = eval(value, store)?;
            let assigned = match op {
                None => rhs,
                Some(op) => {
                    let current = store
                        .get(*scope, name)
                        .cloned()
                        .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))?;
                    apply_binop(*op, current, rhs)?
                }
            };
            store.set(*scope, name, assigned.clone());
            Ok(assigned)
        }
    }
}

/// Apply a non-short-circuiting binary operator
fn apply_binop(op: BinOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::Str(format!("{left}{right}")))
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            _ => numeric(op, &left, &right).map(Value::Float),
        },
        BinOp::Sub => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => numeric(op, &left, &right).map(Value::Float),
        },
        BinOp::Mul => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => numeric(op, &left, &right).map(Value::Float),
        },
        BinOp::Div => {
            let divisor = right
                .as_f64()
                .ok_or_else(|| EvalError::type_error(format!("cannot divide by {right}")))?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            match (&left, &right) {
                (Value::Int(a), Value::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
                _ => numeric(op, &left, &right).map(Value::Float),
            }
        }
        BinOp::Rem => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => {
                let divisor = right.as_f64().unwrap_or(0.0);
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                numeric(op, &left, &right).map(Value::Float)
            }
        },
        BinOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinOp::NotEq => Ok(Value::Bool(!values_equal(&left, &right))),
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ if left.is_numeric() && right.is_numeric() => {
                    left.as_f64().partial_cmp(&right.as_f64())
                }
                _ => {
                    return Err(EvalError::type_error(format!(
                        "cannot order {left} against {right}"
                    )))
                }
            };
            let Some(ordering) = ordering else {
                return Err(EvalError::type_error("unordered comparison".to_string()));
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::LtEq => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::GtEq => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        BinOp::And | BinOp::Or => unreachable!("handled by the short-circuit path"),
    }
}

fn numeric(op: BinOp, left: &Value, right: &Value) -> Result<f64, EvalError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Rem => a % b,
            _ => unreachable!(),
        }),
        _ => Err(EvalError::type_error(format!(
            "operator {op:?} needs numeric operands, got {left} and {right}"
        ))),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ if left.is_numeric() && right.is_numeric() => left.as_f64() == right.as_f64(),
        _ => false,
    }
}
