//! Text scanning shared by the textual grid formats.

use std::{
    io::{BufRead, Read},
    str::FromStr,
};

use nom::{
    bytes::complete::take_till1,
    character::complete::{multispace0, space0, space1},
    number::complete::double,
    sequence::{preceded, separated_pair},
    IResult,
};

use crate::{Error, Result};

/// Bound on header lines so binary input fails fast
pub const HEADER_LINE_LIMIT: usize = 1024;
const TOKEN_LIMIT: usize = 64;

/// Reads one line of at most `limit` bytes without its line terminator.
///
/// Returns `Ok(None)` at end of input. Invalid UTF-8 is replaced, so binary
/// data yields garbage lines that the header parsers then reject.
///
/// # Errors
///
/// [`Error::LineTooLong`] when no line break shows up within `limit` bytes.
pub fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> Result<Option<String>> {
    let mut bytes = Vec::new();
    let bound = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(bound).read_until(b'\n', &mut bytes)?;
    if n == 0 {
        return Ok(None);
    }
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    } else if bytes.len() > limit {
        return Err(Error::LineTooLong { limit });
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn key_value_pair(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(
        space0,
        separated_pair(
            take_till1(char::is_whitespace),
            space1,
            take_till1(char::is_whitespace),
        ),
    )(input)
}

/// Splits a `key value` header line into its first two words
#[must_use]
pub fn key_value(line: &str) -> Option<(&str, &str)> {
    key_value_pair(line).ok().map(|(_, pair)| pair)
}

/// Parses a `keyword value` line, matching the keyword case-insensitively
#[must_use]
pub fn keyword_value<T: FromStr>(line: &str, keyword: &str) -> Option<T> {
    let (key, value) = key_value(line)?;
    if key.eq_ignore_ascii_case(keyword) {
        value.parse().ok()
    } else {
        None
    }
}

/// Numbers in a line that may be written without separators, as in
/// `-0.21E+10-0.21E+10`
#[derive(Debug, Clone)]
pub struct PackedNumbers<'a> {
    rest: &'a str,
}

/// Iterates the numbers of a line, stopping at the first non-numeric text
#[must_use]
pub const fn packed_numbers(line: &str) -> PackedNumbers<'_> {
    PackedNumbers { rest: line }
}

fn next_number(input: &str) -> IResult<&str, f64> {
    preceded(multispace0, double)(input)
}

impl Iterator for PackedNumbers<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        let (rest, value) = next_number(self.rest).ok()?;
        self.rest = rest;
        Some(value)
    }
}

/// Whitespace separated token scanner over a buffered stream.
#[derive(Debug)]
pub struct Tokens<R> {
    reader: R,
    token: Vec<u8>,
}

impl<R: BufRead> Tokens<R> {
    /// Wraps a buffered reader
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            token: Vec::new(),
        }
    }

    /// Returns the wrapped reader, positioned after the last consumed token
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Consumes whitespace; returns false at end of input
    fn skip_whitespace(&mut self) -> Result<bool> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(false);
            }
            let n = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let found = n < buf.len();
            self.reader.consume(n);
            if found {
                return Ok(true);
            }
        }
    }

    fn consume_token(&mut self, keep: bool) -> Result<()> {
        self.token.clear();
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let n = buf.iter().take_while(|b| !b.is_ascii_whitespace()).count();
            let done = n < buf.len();
            if keep {
                if self.token.len() + n > TOKEN_LIMIT {
                    return Err(Error::FormatMismatch("numeric token"));
                }
                self.token.extend_from_slice(&buf[..n]);
            }
            self.reader.consume(n);
            if done {
                return Ok(());
            }
        }
    }

    /// Next token, or `None` at end of input
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and on tokens that are too long or not UTF-8.
    pub fn next_token(&mut self) -> Result<Option<&str>> {
        if !self.skip_whitespace()? {
            return Ok(None);
        }
        self.consume_token(true)?;
        std::str::from_utf8(&self.token)
            .map(Some)
            .map_err(|_| Error::FormatMismatch("numeric token"))
    }

    /// Parses the next token.
    ///
    /// # Errors
    ///
    /// [`Error::Truncated`] at end of input, [`Error::FormatMismatch`] when the
    /// token does not parse.
    pub fn value<T: FromStr>(&mut self) -> Result<T> {
        let token = self.next_token()?.ok_or(Error::Truncated)?;
        token
            .parse()
            .map_err(|_| Error::FormatMismatch("numeric token"))
    }

    /// Skips `count` tokens without decoding them.
    ///
    /// # Errors
    ///
    /// [`Error::Truncated`] when the input ends first.
    pub fn skip(&mut self, count: u32) -> Result<()> {
        for _ in 0..count {
            if !self.skip_whitespace()? {
                return Err(Error::Truncated);
            }
            self.consume_token(false)?;
        }
        Ok(())
    }
}

/// One instruction of a [`ScanPattern`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// decode the next token
    Parse,
    /// skip this many tokens
    Skip(u32),
}

/// Parse/skip plan for one sampled row of a textual grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPattern {
    steps: Vec<Step>,
}

impl ScanPattern {
    /// Plan for a row of `width` tokens sampled every `sample_dist` columns
    #[must_use]
    pub fn for_row(width: u32, sample_dist: u32) -> Self {
        let dist = sample_dist.max(1);
        let mut steps = Vec::new();
        let mut col = 0;
        while col < width {
            steps.push(Step::Parse);
            let skip = (dist - 1).min(width - col - 1);
            if skip > 0 {
                steps.push(Step::Skip(skip));
            }
            col = col.saturating_add(dist);
        }
        Self { steps }
    }

    /// The planned steps in order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs the plan against `tokens`, handing every decoded value and its
    /// resampled column to `sample`.
    ///
    /// # Errors
    ///
    /// Propagates scanner errors.
    pub fn scan<R, T, F>(&self, tokens: &mut Tokens<R>, mut sample: F) -> Result<()>
    where
        R: BufRead,
        T: FromStr,
        F: FnMut(usize, T),
    {
        let mut column = 0;
        for step in &self.steps {
            match *step {
                Step::Parse => {
                    sample(column, tokens.value()?);
                    column += 1;
                }
                Step::Skip(n) => tokens.skip(n)?,
            }
        }
        Ok(())
    }
}
