//! Parser for the DIMACS CNF input file format.
//! The format is described at <https://jix.github.io/varisat/manual/0.2.0/formats/dimacs.html>.

use crate::literal::Lit;
use miette::{Diagnostic, SourceSpan};
use std::{
    io::{Bytes, Read},
    iter::Peekable,
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("Cannot parse DIMACS")]
#[diagnostic()]
pub struct ExtendedParseError {
    #[source_code]
    pub source_code: Vec<u8>,

    #[related]
    pub related: Vec<ParseError>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("The underlying IO has failed")]
    IO(#[from] std::io::Error),

    #[error("Invalid header: {}", reason)]
    #[diagnostic()]
    InvalidHeader {
        reason: HeaderError,

        #[label]
        err_span: SourceSpan,
    },

    #[error("Missing DIMACS header, i.e., `p cnf ...`")]
    MissingHeader,

    #[error("Unexpected end of file")]
    UnexpectedEndOfFile {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Unexpected character")]
    #[diagnostic()]
    UnexpectedChar {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Invalid integer")]
    InvalidInt {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Literal {val} is out of bound")]
    LiteralOutOfBound {
        val: i64,

        #[label]
        err_span: SourceSpan,
    },

    #[error("Literal {val} exceeds the {num_variables} variables declared in the header")]
    UndeclaredVariable {
        val: i64,
        num_variables: u32,

        #[label]
        err_span: SourceSpan,
    },

    #[error(
        "Number of clauses does not match header: expected {}, but found {} clauses",
        expected,
        found
    )]
    NumClausesMismatch { expected: u32, found: u32 },
}

#[derive(Debug, Error, Diagnostic)]
pub enum HeaderError {
    #[error("`p cnf` prefix missing or invalid")]
    InvalidPrefix,

    #[error("Invalid variable count")]
    InvalidVariableCount,

    #[error("Invalid clause count")]
    InvalidClauseCount,
}

/// An instance of an implementor can be derived from a textual representation
/// of a formula in the DIMACS CNF format.
pub trait FromDimacs: Default {
    fn set_num_variables(&mut self, variables: u32);
    fn set_num_clauses(&mut self, clauses: u32);
    fn add_clause(&mut self, lits: &[Lit]);
}

#[derive(Debug)]
pub struct DimacsParser<R: Read> {
    bytes: Peekable<Bytes<R>>,
    num_variables: u32,
    num_clauses: u32,
    num_clauses_read: u32,

    offset: usize,
}

impl<R: Read> DimacsParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes().peekable(),
            offset: 0,
            num_variables: 0,
            num_clauses: 0,
            num_clauses_read: 0,
        }
    }

    /// Parses a DIMACS file and returns the representation `F`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the read content is not valid DIMACS.
    /// The function propagates underlying IO failures.
    pub fn parse<F: FromDimacs>(&mut self) -> Result<F, ParseError> {
        let mut result = F::default();
        self.parse_comment_or_header(&mut result)?;
        self.parse_clauses(&mut result)?;

        if self.num_clauses_read != self.num_clauses {
            return Err(ParseError::NumClausesMismatch {
                expected: self.num_clauses,
                found: self.num_clauses_read,
            });
        }

        Ok(result)
    }

    /// Either `c ...` or `p cnf ...`
    fn parse_comment_or_header<F: FromDimacs>(&mut self, result: &mut F) -> Result<(), ParseError> {
        while let Some(b) = self.next_byte()? {
            match b {
                b'c' => {
                    // start of a comment line, ignore remaining line
                    self.skip_until(b'\n')?;
                }
                b'p' => {
                    // `p cnf [NUM_VARIABLES] [NUM_CLAUSES]` header
                    self.expect(&b" cnf"[..]).map_err(|_| ParseError::InvalidHeader {
                        reason: HeaderError::InvalidPrefix,
                        err_span: self.err_span(),
                    })?;

                    self.skip_whitespace_and_peek()?
                        .ok_or_else(|| ParseError::UnexpectedEndOfFile { err_span: self.err_span() })?;
                    let num_variables: u32 = self.parse_int().map_err(|err| ParseError::InvalidHeader {
                        reason: HeaderError::InvalidVariableCount,
                        err_span: err.err_span().unwrap_or_else(|| self.err_span()),
                    })?;

                    self.skip_whitespace_and_peek()?
                        .ok_or_else(|| ParseError::UnexpectedEndOfFile { err_span: self.err_span() })?;
                    let num_clauses: u32 = self.parse_int().map_err(|err| ParseError::InvalidHeader {
                        reason: HeaderError::InvalidClauseCount,
                        err_span: err.err_span().unwrap_or_else(|| self.err_span()),
                    })?;

                    self.num_variables = num_variables;
                    self.num_clauses = num_clauses;
                    result.set_num_variables(num_variables);
                    result.set_num_clauses(num_clauses);
                    return Ok(());
                }
                b if b.is_ascii_whitespace() => {
                    // ignore whitespace at the beginning of the file
                }
                _ => return Err(ParseError::UnexpectedChar { err_span: self.err_offset().into() }),
            }
        }
        Err(ParseError::MissingHeader)
    }

    /// Parses clauses until EOF, comment lines between clauses are skipped.
    fn parse_clauses<F: FromDimacs>(&mut self, result: &mut F) -> Result<(), ParseError> {
        let mut clause = Vec::new();
        while let Some(b) = self.skip_whitespace_and_peek()? {
            if b == b'c' {
                self.skip_until(b'\n')?;
                continue;
            }
            clause.clear();
            loop {
                self.skip_whitespace_and_peek()?
                    .ok_or_else(|| ParseError::UnexpectedEndOfFile { err_span: self.err_span() })?;
                let start_offset = self.err_offset();
                let lit: i32 = self.parse_int()?;
                if lit == 0 {
                    break;
                }
                if !(Lit::MIN_LIT.to_dimacs()..=Lit::MAX_LIT.to_dimacs()).contains(&lit) {
                    return Err(ParseError::LiteralOutOfBound {
                        val: lit.into(),
                        err_span: (start_offset..self.err_offset()).into(),
                    });
                }
                if lit.unsigned_abs() > self.num_variables {
                    return Err(ParseError::UndeclaredVariable {
                        val: lit.into(),
                        num_variables: self.num_variables,
                        err_span: (start_offset..self.err_offset().saturating_sub(1)).into(),
                    });
                }
                clause.push(Lit::from_dimacs(lit));
            }
            result.add_clause(&clause);
            self.num_clauses_read += 1;
        }
        Ok(())
    }

    /// Consumes the next byte in the input.
    /// Returns the byte or `None` in the case of EOF.
    fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        let byte = self.bytes.next().transpose()?;
        if byte.is_some() {
            self.offset += 1;
        }
        Ok(byte)
    }

    /// Returns the next byte value without consuming.
    fn peek_byte(&mut self) -> Option<u8> {
        match self.bytes.peek() {
            Some(Ok(b)) => Some(*b),
            _ => None,
        }
    }

    /// Skips the rest of the line, a missing final newline is fine.
    fn skip_until(&mut self, until: u8) -> Result<(), ParseError> {
        while let Some(b) = self.next_byte()? {
            if b == until {
                break;
            }
        }
        Ok(())
    }

    /// Skips input bytes until a non-ASCII whitespace character is found.
    /// Returns the first non-ASCII whitespace character (if not EOF).
    fn skip_whitespace_and_peek(&mut self) -> Result<Option<u8>, ParseError> {
        while let Some(b) = self.peek_byte() {
            if !b.is_ascii_whitespace() {
                return Ok(Some(b));
            }
            self.next_byte()?;
        }
        Ok(None)
    }

    fn expect(&mut self, value: &[u8]) -> Result<(), ParseError> {
        for &expected in value {
            let found = self
                .next_byte()?
                .ok_or_else(|| ParseError::UnexpectedEndOfFile { err_span: self.err_span() })?;
            if found != expected {
                return Err(ParseError::UnexpectedChar { err_span: self.err_offset().into() });
            }
        }
        Ok(())
    }

    fn parse_int<I>(&mut self) -> Result<I, ParseError>
    where
        I: TryFrom<i64>,
    {
        let start_span = self.err_offset();
        let mut parsed: i64 = 0;
        let mut is_negated = false;
        let mut num_digits = 0;
        while let Some(b) = self.next_byte()? {
            match b {
                b'-' => {
                    if is_negated || num_digits > 0 {
                        return Err(ParseError::InvalidInt { err_span: self.err_span() });
                    }
                    is_negated = true;
                }
                b @ b'0'..=b'9' => {
                    num_digits += 1;
                    let val = i64::from(b - b'0');
                    parsed = if let Some(parsed) = parsed.checked_mul(10).and_then(|res| res.checked_add(val)) {
                        parsed
                    } else {
                        // overflow while parsing integer
                        return Err(ParseError::InvalidInt { err_span: (start_span..self.err_offset()).into() });
                    }
                }
                b => {
                    if !b.is_ascii_whitespace() {
                        return Err(ParseError::InvalidInt { err_span: (start_span..self.err_offset()).into() });
                    }
                    break;
                }
            }
        }
        if num_digits == 0 {
            return Err(ParseError::InvalidInt { err_span: (start_span..self.err_offset()).into() });
        }
        if is_negated {
            parsed = -parsed;
        }
        I::try_from(parsed).map_err(|_| {
            ParseError::LiteralOutOfBound {
                val: parsed,
                // reduce end offset by one, as last byte was a whitespace
                err_span: (start_span..self.err_offset().saturating_sub(1)).into(),
            }
        })
    }

    fn err_offset(&self) -> usize {
        self.offset
    }

    fn err_span(&self) -> SourceSpan {
        self.offset.saturating_sub(1).into()
    }
}

impl ParseError {
    fn err_span(&self) -> Option<SourceSpan> {
        match self {
            ParseError::InvalidInt { err_span } | ParseError::LiteralOutOfBound { err_span, .. } => {
                Some(*err_span)
            }
            _ => None,
        }
    }
}
