//! SMTP reply, containing a mandatory status code and the text lines of the
//! reply
//!
//! A reply is one or more lines, each starting with a 3-digit status code
//! followed by `-` (continuation) or a space (final line), per
//! [RFC 5321 section 4.2](https://tools.ietf.org/html/rfc5321#section-4.2).

use std::{
    fmt::{Display, Formatter},
    result,
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until, take_while_m_n},
    combinator::{map_res, verify},
    multi::many0,
    IResult,
};

use crate::error::{self, Error};

/// Contains an SMTP reply, with separated code and text lines
///
/// Continuation lines may carry a different code than the final line; the
/// final line's code is authoritative.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    /// Status code of the final reply line
    code: u16,
    /// Text portion of each line, in order
    lines: Vec<String>,
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message())
    }
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> result::Result<Response, Error> {
        parse_reply(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_owned()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: u16, lines: Vec<String>) -> Response {
        Response { code, lines }
    }

    /// Status code of the final reply line
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        self.code == code
    }

    /// Tells if the reply is positive (2yz or 3yz)
    pub fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }

    /// Text of all lines joined with LF, without trailing line ending
    pub fn data(&self) -> String {
        self.lines.join("\n")
    }

    /// Text of the last line
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// The text lines of the reply
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Returns only the first word of the first line if possible
    pub fn first_word(&self) -> Option<&str> {
        self.lines
            .first()
            .and_then(|line| line.split_whitespace().next())
    }
}

// Parsers (streaming: `Incomplete` means the caller must read more input)

fn parse_code(i: &str) -> IResult<&str, u16> {
    verify(
        map_res(
            take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
            str::parse,
        ),
        |code: &u16| (100..600).contains(code),
    )(i)
}

/// One line of text up to LF; a preceding CR is accepted and stripped
fn parse_text(i: &str) -> IResult<&str, &str> {
    let (i, text) = take_until("\n")(i)?;
    let (i, _) = tag("\n")(i)?;
    Ok((i, text.strip_suffix('\r').unwrap_or(text)))
}

fn parse_continuation_line(i: &str) -> IResult<&str, &str> {
    let (i, _) = parse_code(i)?;
    let (i, _) = tag("-")(i)?;
    parse_text(i)
}

fn parse_final_line(i: &str) -> IResult<&str, (u16, &str)> {
    let (i, code) = parse_code(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, text) = parse_text(i)?;
    Ok((i, (code, text)))
}

pub(crate) fn parse_reply(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0(parse_continuation_line)(i)?;
    let (i, (code, last_line)) = parse_final_line(i)?;

    let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
    lines.push(last_line.into());

    Ok((i, Response { code, lines }))
}
