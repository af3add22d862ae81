//! PartScript: a small modeling language executed in isolation.
//!
//! A script sees exactly one namespace: the allow-listed geometry vocabulary
//! plus its own bindings. There is no I/O, no clock, and no host symbol
//! reachable from inside a script; every run starts from a fresh, empty
//! binding table and is bounded by an evaluation-step budget.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use forge_geom::{Sketch, Solid};

/// Output slot a script must bind before it finishes.
pub const RESULT_BINDING: &str = "result";

const DEFAULT_MAX_STEPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The script ran to completion without binding `result`.
    MissingResult,
    /// Parse or execution failure, with source position when known.
    Fault {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
}

impl EvalError {
    fn fault(message: impl Into<String>) -> Self {
        EvalError::Fault {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    fn fault_at(message: impl Into<String>, line: usize, column: usize) -> Self {
        EvalError::Fault {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::MissingResult => {
                f.write_str("script did not bind a `result` value")
            }
            EvalError::Fault {
                message,
                line: Some(line),
                column: Some(column),
            } => write!(f, "{message} at line {line}, column {column}"),
            EvalError::Fault { message, .. } => f.write_str(message),
        }
    }
}

impl Error for EvalError {}

/// Builder wrapper produced by a `part { .. }` block. Holds the solids the
/// block accumulated; `interior()` unwraps one level to the compound body.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    solids: Vec<Solid>,
}

impl Part {
    pub fn interior(&self) -> Solid {
        Solid::compound(self.solids.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }
}

/// Closed set of shapes a script can produce. Downstream validation
/// dispatches on this tag, never on incidental structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Sketch(Sketch),
    Solid(Solid),
    Part(Part),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Sketch(_) => "sketch",
            Value::Solid(_) => "solid",
            Value::Part(_) => "part",
            Value::List(_) => "list",
        }
    }
}

/// Resource bounds for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    /// Expression nodes evaluated before the run is aborted.
    pub max_steps: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Executes scripts against the fixed vocabulary. Stateless between runs;
/// every `run` gets a fresh binding table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    limits: EvalLimits,
}

impl Evaluator {
    pub fn new(limits: EvalLimits) -> Self {
        Self { limits }
    }

    pub fn run(&self, source: &str) -> Result<Value, EvalError> {
        let program = parse_program(source)?;
        let mut interp = Interp::new(self.limits);

        for decl in &program.params {
            let value = interp.eval_expr(&decl.value)?;
            let Value::Number(number) = value else {
                return Err(EvalError::fault_at(
                    format!(
                        "parameter '{}' must be a number, got {}",
                        decl.name,
                        value.kind()
                    ),
                    decl.line,
                    decl.column,
                ));
            };
            interp.bindings.insert(decl.name.clone(), Value::Number(number));
        }

        for statement in &program.statements {
            interp.exec_statement(statement)?;
        }

        interp
            .bindings
            .remove(RESULT_BINDING)
            .ok_or(EvalError::MissingResult)
    }
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct ParamDecl {
    name: String,
    value: Expr,
    line: usize,
    column: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Assignment { name: String, expr: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number {
        value: f64,
        line: usize,
        column: usize,
    },
    Variable {
        name: String,
        line: usize,
        column: usize,
    },
    Neg(Box<Expr>),
    Binary {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
        line: usize,
        column: usize,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        line: usize,
        column: usize,
    },
    List {
        items: Vec<Expr>,
    },
    PartBlock {
        statements: Vec<Statement>,
        line: usize,
        column: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Program {
    params: Vec<ParamDecl>,
    statements: Vec<Statement>,
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

struct Interp {
    bindings: BTreeMap<String, Value>,
    steps: usize,
    max_steps: usize,
    // Stack of open `part { .. }` scopes; `add()` targets the innermost.
    part_stack: Vec<Vec<Solid>>,
}

impl Interp {
    fn new(limits: EvalLimits) -> Self {
        Self {
            bindings: BTreeMap::new(),
            steps: 0,
            max_steps: limits.max_steps,
            part_stack: Vec::new(),
        }
    }

    fn exec_statement(&mut self, statement: &Statement) -> Result<(), EvalError> {
        match statement {
            Statement::Assignment { name, expr } => {
                let value = self.eval_expr(expr)?;
                self.bindings.insert(name.clone(), value);
            }
            Statement::Expr(expr) => {
                self.eval_expr(expr)?;
            }
        }
        Ok(())
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::fault(
                "evaluation budget exceeded; simplify the script",
            ));
        }

        match expr {
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::Variable { name, line, column } => {
                self.bindings.get(name).cloned().ok_or_else(|| {
                    EvalError::fault_at(format!("unknown binding '{name}'"), *line, *column)
                })
            }
            Expr::Neg(inner) => {
                let value = self.eval_expr(inner)?;
                match value {
                    Value::Number(number) => Ok(Value::Number(-number)),
                    other => Err(EvalError::fault(format!(
                        "cannot negate a {}",
                        other.kind()
                    ))),
                }
            }
            Expr::Binary {
                lhs,
                op,
                rhs,
                line,
                column,
            } => {
                let lhs = self.eval_number(lhs, "arithmetic")?;
                let rhs = self.eval_number(rhs, "arithmetic")?;
                let result = match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => {
                        if rhs.abs() <= f64::EPSILON {
                            return Err(EvalError::fault_at(
                                "division by zero",
                                *line,
                                *column,
                            ));
                        }
                        lhs / rhs
                    }
                };
                Ok(Value::Number(result))
            }
            Expr::Call {
                name,
                args,
                line,
                column,
            } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                self.call(name, values, *line, *column)
            }
            Expr::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::List(values))
            }
            Expr::PartBlock { statements, .. } => {
                self.part_stack.push(Vec::new());
                for statement in statements {
                    if let Err(err) = self.exec_statement(statement) {
                        self.part_stack.pop();
                        return Err(err);
                    }
                }
                let solids = self.part_stack.pop().unwrap_or_default();
                Ok(Value::Part(Part { solids }))
            }
        }
    }

    fn eval_number(&mut self, expr: &Expr, context: &str) -> Result<f64, EvalError> {
        match self.eval_expr(expr)? {
            Value::Number(number) => Ok(number),
            other => Err(EvalError::fault(format!(
                "{context} expects a number, got {}",
                other.kind()
            ))),
        }
    }

    // The allow-listed vocabulary. Anything not matched here does not exist
    // as far as a script is concerned.
    fn call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        line: usize,
        column: usize,
    ) -> Result<Value, EvalError> {
        let at = |message: String| EvalError::fault_at(message, line, column);

        match name {
            "rect" => {
                let [width, depth] = expect_numbers(name, &["width", "depth"], &args, line, column)?;
                require_positive(width, "rect width", line, column)?;
                require_positive(depth, "rect depth", line, column)?;
                Ok(Value::Sketch(Sketch::rect(width, depth)))
            }
            "circle" => {
                let [radius] = expect_numbers(name, &["radius"], &args, line, column)?;
                require_positive(radius, "circle radius", line, column)?;
                Ok(Value::Sketch(Sketch::circle(radius)))
            }
            "box" => {
                let [width, depth, height] =
                    expect_numbers(name, &["width", "depth", "height"], &args, line, column)?;
                require_positive(width, "box width", line, column)?;
                require_positive(depth, "box depth", line, column)?;
                require_positive(height, "box height", line, column)?;
                Ok(Value::Solid(Solid::cuboid(width, depth, height)))
            }
            "cylinder" => {
                let [radius, height] =
                    expect_numbers(name, &["radius", "height"], &args, line, column)?;
                require_positive(radius, "cylinder radius", line, column)?;
                require_positive(height, "cylinder height", line, column)?;
                Ok(Value::Solid(Solid::cylinder(radius, height)))
            }
            "sphere" => {
                let [radius] = expect_numbers(name, &["radius"], &args, line, column)?;
                require_positive(radius, "sphere radius", line, column)?;
                Ok(Value::Solid(Solid::sphere(radius)))
            }
            "cone" => {
                let [radius_bottom, radius_top, height] = expect_numbers(
                    name,
                    &["radius_bottom", "radius_top", "height"],
                    &args,
                    line,
                    column,
                )?;
                require_positive(radius_bottom, "cone radius_bottom", line, column)?;
                require_positive(radius_top, "cone radius_top", line, column)?;
                require_positive(height, "cone height", line, column)?;
                Ok(Value::Solid(Solid::cone(radius_bottom, radius_top, height)))
            }
            "extrude" => {
                expect_arity(name, &["sketch", "height"], &args, line, column)?;
                let height = number_arg(name, "height", &args[1], line, column)?;
                require_positive(height, "extrude height", line, column)?;
                match &args[0] {
                    Value::Sketch(sketch) => Ok(Value::Solid(Solid::extrude(sketch, height))),
                    Value::Solid(_) => Err(at(
                        "extrude expects a sketch, got a solid; it is already three-dimensional"
                            .to_string(),
                    )),
                    other => Err(at(format!(
                        "extrude expects a sketch, got {}",
                        other.kind()
                    ))),
                }
            }
            "translate" => {
                expect_arity(name, &["shape", "x", "y", "z"], &args, line, column)?;
                let x = number_arg(name, "x", &args[1], line, column)?;
                let y = number_arg(name, "y", &args[2], line, column)?;
                let z = number_arg(name, "z", &args[3], line, column)?;
                match &args[0] {
                    Value::Solid(solid) => Ok(Value::Solid(solid.translated(x, y, z))),
                    Value::Sketch(sketch) => {
                        if z.abs() > f64::EPSILON {
                            return Err(at(
                                "cannot translate a sketch out of its plane; extrude it first"
                                    .to_string(),
                            ));
                        }
                        Ok(Value::Sketch(sketch.translated(x, y)))
                    }
                    other => Err(at(format!(
                        "translate expects a solid or sketch, got {}",
                        other.kind()
                    ))),
                }
            }
            "rotate" => {
                expect_arity(name, &["shape", "angle"], &args, line, column)?;
                let degrees = number_arg(name, "angle", &args[1], line, column)?;
                let radians = degrees.to_radians();
                match &args[0] {
                    Value::Solid(solid) => Ok(Value::Solid(solid.rotated_z(radians))),
                    Value::Sketch(sketch) => Ok(Value::Sketch(sketch.rotated(radians))),
                    other => Err(at(format!(
                        "rotate expects a solid or sketch, got {}",
                        other.kind()
                    ))),
                }
            }
            "scale" => {
                expect_arity(name, &["shape", "factor"], &args, line, column)?;
                let factor = number_arg(name, "factor", &args[1], line, column)?;
                require_positive(factor, "scale factor", line, column)?;
                match &args[0] {
                    Value::Solid(solid) => Ok(Value::Solid(solid.scaled(factor))),
                    Value::Sketch(sketch) => Ok(Value::Sketch(sketch.scaled(factor))),
                    other => Err(at(format!(
                        "scale expects a solid or sketch, got {}",
                        other.kind()
                    ))),
                }
            }
            "union" => {
                expect_arity(name, &["a", "b"], &args, line, column)?;
                let a = solid_arg(name, "a", &args[0], line, column)?;
                let b = solid_arg(name, "b", &args[1], line, column)?;
                Ok(Value::Solid(Solid::compound(vec![a, b])))
            }
            "add" => {
                expect_arity(name, &["shape"], &args, line, column)?;
                let Some(scope) = self.part_stack.last_mut() else {
                    return Err(at(
                        "add() is only valid inside a part block".to_string(),
                    ));
                };
                match &args[0] {
                    Value::Solid(solid) => {
                        scope.push(solid.clone());
                        Ok(Value::Number(0.0))
                    }
                    Value::Sketch(_) => Err(at(
                        "add() requires a solid; extrude the sketch before adding it".to_string(),
                    )),
                    other => Err(at(format!("add() requires a solid, got {}", other.kind()))),
                }
            }
            _ => {
                let mut message = format!("unknown function '{name}'");
                if let Some(suggestion) = suggest_name(name, VOCABULARY) {
                    message.push_str(&format!(". Did you mean '{suggestion}'?"));
                }
                Err(at(message))
            }
        }
    }
}

const VOCABULARY: &[&str] = &[
    "rect", "circle", "box", "cylinder", "sphere", "cone", "extrude", "translate", "rotate",
    "scale", "union", "add",
];

fn expect_arity(
    name: &str,
    expected: &[&str],
    args: &[Value],
    line: usize,
    column: usize,
) -> Result<(), EvalError> {
    if args.len() < expected.len() {
        return Err(EvalError::fault_at(
            format!("missing argument '{}' for {name}", expected[args.len()]),
            line,
            column,
        ));
    }
    if args.len() > expected.len() {
        return Err(EvalError::fault_at(
            format!(
                "too many arguments for {name}: expected {}, got {}",
                expected.len(),
                args.len()
            ),
            line,
            column,
        ));
    }
    Ok(())
}

fn expect_numbers<const N: usize>(
    name: &str,
    expected: &[&str; N],
    args: &[Value],
    line: usize,
    column: usize,
) -> Result<[f64; N], EvalError> {
    expect_arity(name, expected, args, line, column)?;
    let mut numbers = [0.0; N];
    for (index, param) in expected.iter().enumerate() {
        numbers[index] = number_arg(name, param, &args[index], line, column)?;
    }
    Ok(numbers)
}

fn number_arg(
    name: &str,
    param: &str,
    value: &Value,
    line: usize,
    column: usize,
) -> Result<f64, EvalError> {
    match value {
        // Overflowed arithmetic shows up here as infinity or NaN; neither
        // may reach a constructor.
        Value::Number(number) if !number.is_finite() => Err(EvalError::fault_at(
            format!("{name} expects a finite number for {param}"),
            line,
            column,
        )),
        Value::Number(number) => Ok(*number),
        other => Err(EvalError::fault_at(
            format!("{name} expects a number for {param}, got {}", other.kind()),
            line,
            column,
        )),
    }
}

fn solid_arg(
    name: &str,
    param: &str,
    value: &Value,
    line: usize,
    column: usize,
) -> Result<Solid, EvalError> {
    match value {
        Value::Solid(solid) => Ok(solid.clone()),
        Value::Part(part) => Ok(part.interior()),
        other => Err(EvalError::fault_at(
            format!("{name} expects a solid for {param}, got {}", other.kind()),
            line,
            column,
        )),
    }
}

fn require_positive(value: f64, label: &str, line: usize, column: usize) -> Result<(), EvalError> {
    // NaN fails every ordering comparison, so the check must demand the
    // positive case rather than reject the non-positive one.
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EvalError::fault_at(
            format!("{label} must be positive"),
            line,
            column,
        ))
    }
}

fn suggest_name<'a>(name: &str, candidates: &'a [&str]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein(name, candidate);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    match best {
        Some((candidate, distance)) if distance <= 3 => Some(candidate),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(f64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Eq,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, column) = (self.line, self.column);
            let Some(&ch) = self.chars.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let kind = match ch {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                '=' => self.single(TokenKind::Eq),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                c if c.is_ascii_digit() || c == '.' => self.number(line, column)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.ident(),
                other => {
                    return Err(EvalError::fault_at(
                        format!("unexpected character '{other}'"),
                        line,
                        column,
                    ));
                }
            };
            tokens.push(Token { kind, line, column });
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(&ch) = self.chars.peek() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            // Line comments only; block comments are not part of the language.
            let mut lookahead = self.chars.clone();
            if lookahead.next() == Some('/') && lookahead.next() == Some('/') {
                while let Some(&ch) = self.chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            return;
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind, EvalError> {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Unit suffixes: `mm` is the base unit, `deg` is a documentation
        // marker; both leave the numeric value unchanged.
        let mut suffix = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_alphabetic() {
                suffix.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        if !suffix.is_empty() && suffix != "mm" && suffix != "deg" {
            return Err(EvalError::fault_at(
                format!("unknown unit suffix '{suffix}'"),
                line,
                column,
            ));
        }

        let value: f64 = text.parse().map_err(|_| {
            EvalError::fault_at(format!("invalid number '{text}'"), line, column)
        })?;
        Ok(TokenKind::Number(value))
    }

    fn ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Ident(text)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.chars.next() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

fn parse_program(source: &str) -> Result<Program, EvalError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, index: 0 };
    parser.program()
}

impl Parser {
    fn program(&mut self) -> Result<Program, EvalError> {
        let mut params = Vec::new();
        if self.peek_ident("params") && self.peek_kind_at(1, &TokenKind::LBrace) {
            self.bump();
            self.expect(TokenKind::LBrace, "'{' after params")?;
            while !self.check(&TokenKind::RBrace) {
                let (name, line, column) = self.expect_ident("parameter name")?;
                self.expect(TokenKind::Eq, "'=' in parameter declaration")?;
                let value = self.expr()?;
                params.push(ParamDecl {
                    name,
                    value,
                    line,
                    column,
                });
            }
            self.expect(TokenKind::RBrace, "'}' closing params block")?;
        }

        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.statement()?);
        }
        Ok(Program { params, statements })
    }

    fn statement(&mut self) -> Result<Statement, EvalError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            if self.peek_kind_at(1, &TokenKind::Eq) {
                let name = name.clone();
                self.bump();
                self.bump();
                let expr = self.expr()?;
                return Ok(Statement::Assignment { name, expr });
            }
        }
        Ok(Statement::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.term()?;
        loop {
            let token = self.peek().clone();
            let op = match token.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                line: token.line,
                column: token.column,
            };
        }
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            let token = self.peek().clone();
            let op = match token.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                line: token.line,
                column: token.column,
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.check(&TokenKind::Minus) {
            self.bump();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(value) => {
                self.bump();
                Ok(Expr::Number {
                    value: *value,
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.expr()?;
                self.expect(TokenKind::RParen, "')' closing group")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if self.check(&TokenKind::Comma) {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']' closing list")?;
                Ok(Expr::List { items })
            }
            TokenKind::Ident(name) if name == "part" && self.peek_kind_at(1, &TokenKind::LBrace) => {
                self.bump();
                self.expect(TokenKind::LBrace, "'{' after part")?;
                let mut statements = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                    statements.push(self.statement()?);
                }
                self.expect(TokenKind::RBrace, "'}' closing part block")?;
                Ok(Expr::PartBlock {
                    statements,
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                if self.check(&TokenKind::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')' closing argument list")?;
                    Ok(Expr::Call {
                        name,
                        args,
                        line: token.line,
                        column: token.column,
                    })
                } else {
                    Ok(Expr::Variable {
                        name,
                        line: token.line,
                        column: token.column,
                    })
                }
            }
            other => Err(EvalError::fault_at(
                format!("unexpected token {other:?}"),
                token.line,
                token.column,
            )),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_ident(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(ident) if ident == name)
    }

    fn peek_kind_at(&self, offset: usize, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.index + offset)
            .is_some_and(|token| &token.kind == kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), EvalError> {
        if self.check(&kind) {
            self.bump();
            Ok(())
        } else {
            let token = self.peek();
            Err(EvalError::fault_at(
                format!("expected {what}, found {:?}", token.kind),
                token.line,
                token.column,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, usize, usize), EvalError> {
        let token = self.peek().clone();
        if let TokenKind::Ident(name) = &token.kind {
            let name = name.clone();
            self.bump();
            Ok((name, token.line, token.column))
        } else {
            Err(EvalError::fault_at(
                format!("expected {what}, found {:?}", token.kind),
                token.line,
                token.column,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EvalError, EvalLimits, Evaluator, Value};

    fn run(source: &str) -> Result<Value, EvalError> {
        Evaluator::default().run(source)
    }

    #[test]
    fn cube_script_yields_solid_with_exact_volume() {
        let value = run("result = box(10, 10, 10)").expect("cube should evaluate");
        let Value::Solid(solid) = value else {
            panic!("expected a solid, got {value:?}");
        };
        assert!((solid.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn params_and_arithmetic_feed_constructors() {
        let source = r#"
            params {
              size = 20mm
              half = size / 2
            }
            result = box(size, half, half + 5)
        "#;
        let Value::Solid(solid) = run(source).expect("script should evaluate") else {
            panic!("expected a solid");
        };
        assert!((solid.volume() - 20.0 * 10.0 * 15.0).abs() < 1e-9);
    }

    #[test]
    fn comments_and_units_are_accepted() {
        let source = r#"
            // base plate, rotated for style
            plate = rotate(box(30mm, 20mm, 5mm), 45deg)
            result = plate
        "#;
        assert!(matches!(run(source), Ok(Value::Solid(_))));
    }

    #[test]
    fn missing_result_binding_is_its_own_error() {
        let err = run("plate = box(10, 10, 2)").unwrap_err();
        assert_eq!(err, EvalError::MissingResult);
    }

    #[test]
    fn sketch_result_is_returned_untouched() {
        let value = run("result = rect(10, 10)").expect("sketch should evaluate");
        assert!(matches!(value, Value::Sketch(_)));
    }

    #[test]
    fn part_block_collects_added_solids() {
        let source = r#"
            result = part {
              add(box(10, 10, 10))
              add(translate(cylinder(2, 8), 20, 0, 0))
            }
        "#;
        let Value::Part(part) = run(source).expect("part block should evaluate") else {
            panic!("expected a part");
        };
        assert!(!part.is_empty());
        assert!(part.interior().volume() > 1000.0);
    }

    #[test]
    fn add_outside_part_block_faults() {
        let err = run("result = add(box(1, 1, 1))").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("only valid inside a part block"));
    }

    #[test]
    fn unknown_function_suggests_nearest_name() {
        let err = run("result = bx(10, 10, 10)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("unknown function 'bx'"));
        assert!(message.contains("Did you mean 'box'?"));
    }

    #[test]
    fn wrong_argument_kind_names_the_parameter() {
        let err = run("result = box(rect(5, 5), 10, 10)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("box expects a number for width, got sketch"));
    }

    #[test]
    fn arity_errors_report_the_missing_argument() {
        let err = run("result = cylinder(5)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("missing argument 'height' for cylinder"));
    }

    #[test]
    fn faults_carry_source_position() {
        let err = run("result =\n  box(-1, 10, 10)").unwrap_err();
        let EvalError::Fault { message, line, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("box width must be positive"));
        assert_eq!(line, Some(2));
    }

    #[test]
    fn overflowed_arithmetic_cannot_reach_a_constructor() {
        let source = r#"
            x = 9999999 * 9999999
            x = x * x
            x = x * x
            x = x * x
            x = x * x
            x = x * x
            result = box(x, 1, 1)
        "#;
        let EvalError::Fault { message, .. } = run(source).unwrap_err() else {
            panic!("expected fault");
        };
        assert!(message.contains("box expects a finite number for width"));
    }

    #[test]
    fn nan_dimension_is_rejected() {
        let source = r#"
            x = 9999999 * 9999999
            x = x * x
            x = x * x
            x = x * x
            x = x * x
            x = x * x
            y = x - x
            result = box(y, 1, 1)
        "#;
        let EvalError::Fault { message, .. } = run(source).unwrap_err() else {
            panic!("expected fault");
        };
        assert!(message.contains("finite"));
    }

    #[test]
    fn division_by_zero_faults() {
        let err = run("result = box(10 / 0, 1, 1)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("division by zero"));
    }

    #[test]
    fn translating_sketch_out_of_plane_faults() {
        let err = run("result = translate(rect(4, 4), 0, 0, 5)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("extrude it first"));
    }

    #[test]
    fn evaluation_budget_bounds_work() {
        let evaluator = Evaluator::new(EvalLimits { max_steps: 8 });
        let err = evaluator
            .run("result = box(1 + 1 + 1 + 1 + 1 + 1 + 1 + 1, 1, 1)")
            .unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("evaluation budget exceeded"));
    }

    #[test]
    fn each_run_starts_from_a_fresh_namespace() {
        let evaluator = Evaluator::default();
        evaluator
            .run("leftover = 5\nresult = box(leftover, 1, 1)")
            .expect("first run should evaluate");
        let err = evaluator.run("result = box(leftover, 1, 1)").unwrap_err();
        let EvalError::Fault { message, .. } = err else {
            panic!("expected fault");
        };
        assert!(message.contains("unknown binding 'leftover'"));
    }

    #[test]
    fn list_of_shapes_evaluates_to_list_value() {
        let value = run("result = [box(2, 2, 2), rect(3, 3)]").expect("list should evaluate");
        let Value::List(items) = value else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind(), "solid");
        assert_eq!(items[1].kind(), "sketch");
    }
}
