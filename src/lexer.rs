//! Token classification for math-notation (LaTeX) formula strings
//!
//! The classifier turns a formula into a coarse token stream: letters with
//! optional subscripts, reserved keyword/operator-name spans, integration
//! bounds, and single structural characters. Later stages operate on the
//! token stream only and never re-scan raw text, which is what keeps
//! reserved spans opaque to the namespace injector.

use crate::error::{Result, TemplateError};
use std::fmt;

/// The fixed closed set of Greek-letter spellings the notation recognizes.
/// A spelling is matched as a maximal command-letter run after the escape
/// marker, so `\pirate` is a keyword, not `\pi` followed by `rate`.
pub const GREEK_LETTER_NAMES: &[&str] = &[
    "alpha",
    "beta",
    "zeta",
    "eta",
    "digamma",
    "gamma",
    "Gamma",
    "delta",
    "Delta",
    "epsilon",
    "upsilon",
    "Upsilon",
    "theta",
    "Theta",
    "iota",
    "kappa",
    "lambda",
    "Lambda",
    "mu",
    "nu",
    "xi",
    "Xi",
    "pi",
    "Pi",
    "rho",
    "sigma",
    "Sigma",
    "tau",
    "phi",
    "Phi",
    "psi",
    "Psi",
    "chi",
    "omega",
    "Omega",
    "varepsilon",
    "vartheta",
    "varrho",
    "varphi",
    "varpi",
    "varkappa",
    "varsigma",
];

pub fn is_greek_name(name: &str) -> bool {
    GREEK_LETTER_NAMES.contains(&name)
}

/// How a literal "d" character is used in a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferentialContext {
    /// The "d" in the numerator of a derivative fraction.
    DerivativeNumerator,
    /// The "d" opening the denominator of a derivative fraction.
    DerivativeDenominator,
    /// The trailing differential of a definite integral.
    IntegralTrailing,
    /// A "d" that is part of a reserved keyword or operator name's spelling.
    FalsePositive,
}

/// A classified lexical unit inside a formula string.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A single Latin letter or a Greek-letter spelling, with its subscript
    /// span if one immediately follows. `base` keeps the escape marker(s)
    /// exactly as written (`"a"`, `"\\alpha"`, `"\\\\alpha"`).
    Letter {
        base: String,
        subscript: Option<String>,
        offset: usize,
    },
    /// A reserved keyword (`\sin`, `\frac`, `\int`) or operator-name span
    /// (`\operatorname{median}`). Contents are opaque.
    Reserved { text: String, offset: usize },
    /// A literal "d" whose role has been resolved by the disambiguator.
    Differential {
        context: DifferentialContext,
        offset: usize,
    },
    /// The `_{lower}^{upper}` limits of a definite integral. Opaque to
    /// namespace injection; the bound texts are re-scanned separately for
    /// nested integrals and derivatives.
    Bounds {
        lower: String,
        upper: String,
        offset: usize,
    },
    /// Any other single character (digits, punctuation, braces).
    Other { text: String, offset: usize },
}

impl Token {
    pub fn offset(&self) -> usize {
        match self {
            Token::Letter { offset, .. }
            | Token::Reserved { offset, .. }
            | Token::Differential { offset, .. }
            | Token::Bounds { offset, .. }
            | Token::Other { offset, .. } => *offset,
        }
    }

    /// True for a bare letter "d" with no subscript, the only shape that can
    /// be a differential.
    pub fn is_candidate_d(&self) -> bool {
        matches!(
            self,
            Token::Letter { base, subscript: None, .. } if base == "d"
        )
    }

    pub fn render(&self, out: &mut String) {
        match self {
            Token::Letter { base, subscript, .. } => {
                out.push_str(base);
                if let Some(sub) = subscript {
                    out.push_str("_{");
                    out.push_str(sub);
                    out.push('}');
                }
            }
            Token::Reserved { text, .. } => out.push_str(text),
            Token::Differential { .. } => out.push('d'),
            Token::Bounds { lower, upper, .. } => {
                out.push_str("_{");
                out.push_str(lower);
                out.push_str("}^{");
                out.push_str(upper);
                out.push('}');
            }
            Token::Other { text, .. } => out.push_str(text),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        self.render(&mut text);
        f.write_str(&text)
    }
}

/// Render a token stream back into formula text.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        token.render(&mut out);
    }
    out
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    record: String,
}

impl Lexer {
    /// `record` is the identifier of the record the formula belongs to; it is
    /// carried into every diagnostic.
    pub fn new(input: &str, record: impl Into<String>) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            record: record.into(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            self.scan_token(&mut tokens)?;
        }
        Ok(tokens)
    }

    fn scan_token(&mut self, tokens: &mut Vec<Token>) -> Result<()> {
        let offset = self.position;
        let ch = self.advance();

        if ch == '\\' {
            return self.scan_escape(offset, tokens);
        }

        if ch.is_ascii_alphabetic() {
            let subscript = self.try_subscript()?;
            tokens.push(Token::Letter {
                base: ch.to_string(),
                subscript,
                offset,
            });
            return Ok(());
        }

        tokens.push(Token::Other {
            text: ch.to_string(),
            offset,
        });
        Ok(())
    }

    /// Scan a span opened by a backslash: a Greek letter, `\operatorname{..}`,
    /// `\int` with bounds, a bare keyword, or an escaped symbol.
    fn scan_escape(&mut self, offset: usize, tokens: &mut Vec<Token>) -> Result<()> {
        // Tolerate the doubled-backslash escaped form (`\\alpha`) that
        // appears when formulas arrive inside string-escaped payloads.
        let mut prefix = String::from("\\");
        if self.peek() == Some('\\') && self.peek_next().map_or(false, |c| c.is_ascii_alphabetic())
        {
            self.advance();
            prefix.push('\\');
        }

        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {}
            Some(_) => {
                // Escaped symbol like `\{` or `\ `.
                let symbol = self.advance();
                tokens.push(Token::Reserved {
                    text: format!("{prefix}{symbol}"),
                    offset,
                });
                return Ok(());
            }
            None => {
                tokens.push(Token::Reserved {
                    text: prefix,
                    offset,
                });
                return Ok(());
            }
        }

        let name = self.read_command_name();

        if name == "operatorname" && self.peek() == Some('{') {
            let open = self.position;
            self.advance();
            let content = self.read_balanced_group(open)?;
            tokens.push(Token::Reserved {
                text: format!("{prefix}operatorname{{{content}}}"),
                offset,
            });
            return Ok(());
        }

        if is_greek_name(&name) {
            let subscript = self.try_subscript()?;
            tokens.push(Token::Letter {
                base: format!("{prefix}{name}"),
                subscript,
                offset,
            });
            return Ok(());
        }

        tokens.push(Token::Reserved {
            text: format!("{prefix}{name}"),
            offset,
        });

        if name == "int" && self.peek() == Some('_') {
            let bounds = self.scan_integral_bounds()?;
            tokens.push(bounds);
        }

        Ok(())
    }

    /// Parse `_{lower}^{upper}` following `\int`. Both limits are required
    /// and must brace-balance; the classifier never guesses matching bounds.
    fn scan_integral_bounds(&mut self) -> Result<Token> {
        let offset = self.position;
        self.advance(); // '_'
        if self.peek() != Some('{') {
            return Err(TemplateError::malformed(
                &self.record,
                offset,
                "integration lower bound must be brace-delimited",
            ));
        }
        let open = self.position;
        self.advance();
        let lower = self.read_balanced_group(open)?;

        if self.peek() != Some('^') || self.peek_next() != Some('{') {
            return Err(TemplateError::malformed(
                &self.record,
                self.position,
                "integration bounds missing upper limit",
            ));
        }
        self.advance(); // '^'
        let open = self.position;
        self.advance(); // '{'
        let upper = self.read_balanced_group(open)?;

        Ok(Token::Bounds {
            lower,
            upper,
            offset,
        })
    }

    /// Parse a `_{...}` subscript span if one starts at the cursor.
    fn try_subscript(&mut self) -> Result<Option<String>> {
        if self.peek() == Some('_') && self.peek_next() == Some('{') {
            self.advance(); // '_'
            let open = self.position;
            self.advance(); // '{'
            let content = self.read_balanced_group(open)?;
            return Ok(Some(content));
        }
        Ok(None)
    }

    /// Read the content of a brace group whose `{` (at `open`) has already
    /// been consumed, through the matching `}`.
    fn read_balanced_group(&mut self, open: usize) -> Result<String> {
        let mut content = String::new();
        let mut depth = 1usize;
        while let Some(ch) = self.peek() {
            self.advance();
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(content);
                    }
                }
                _ => {}
            }
            content.push(ch);
        }
        Err(TemplateError::malformed(
            &self.record,
            open,
            "unbalanced brace grouping",
        ))
    }

    fn read_command_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphabetic() {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn advance(&mut self) -> char {
        let ch = self.input[self.position];
        self.position += 1;
        ch
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}
