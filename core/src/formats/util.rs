use std::str::FromStr;

use winnow::{
    ascii::space0,
    combinator::{delimited, preceded, terminated},
    error::{ContextError, StrContext},
    token::take_till,
    PResult, Parser,
};

/// A cursor over the lines of a text file with one line of lookahead.
///
/// The TU text formats are line oriented and several of them decide how to read a line
/// based on the line that came before it, so readers pull lines one by one instead of
/// iterating over the whole file.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().collect(),
            pos: 0,
        }
    }

    /// Returns the next line without consuming it.
    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// Consumes and returns the next line.
    pub fn advance(&mut self) -> Option<&'a str> {
        let line = self.peek()?;
        self.pos += 1;
        Some(line)
    }

    /// 1-based number of the line most recently returned by [`LineCursor::advance`].
    pub fn line_number(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

pub fn non_ws<'a>(i: &mut &'a str) -> PResult<&'a str> {
    take_till(1.., |c: char| c.is_whitespace())
        .context(StrContext::Label("non_ws"))
        .parse_next(i)
}

pub fn word<'a>(i: &mut &'a str) -> PResult<&'a str> {
    preceded(space0, non_ws).parse_next(i)
}

pub fn from_str<T: FromStr>(i: &mut &str) -> PResult<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    word.try_map(str::parse::<T>).parse_next(i)
}

macro_rules! from_str_impl {
    ($($t:ident),+) => {
        $(pub fn $t(i: &mut &str) -> PResult<$t> {
            from_str
                .context(StrContext::Label(stringify!($t)))
                .parse_next(i)
        })+
    };
}

from_str_impl!(u8, u32, usize);

/// A float that may use the Fortran double precision exponent `D` (`1.5D+02`).
pub fn fortran_f64(i: &mut &str) -> PResult<f64> {
    word.try_map(|token: &str| token.replace('D', "E").parse::<f64>())
        .context(StrContext::Label("fortran_f64"))
        .parse_next(i)
}

/// Runs `parser` on `input`, which must be consumed completely apart from trailing blanks.
pub fn parse_full<'a, O>(
    input: &'a str,
    parser: impl Parser<&'a str, O, ContextError>,
) -> Option<O> {
    terminated(parser, space0).parse(input).ok()
}

/// Returns the first double-quoted value of `line` if `tag` occurs somewhere after it.
///
/// The value is trimmed, so `"  Temperature (K) " ;legend` yields `Temperature (K)`.
pub fn quoted_before<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let mut rest = line;
    let value: PResult<&str> = preceded(
        take_till(0.., '"'),
        delimited('"', take_till(0.., '"'), '"'),
    )
    .parse_next(&mut rest);
    let value = value.ok()?;
    rest.contains(tag).then(|| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_peeks_without_consuming() {
        let mut lines = LineCursor::new("a\r\nb\n");
        assert_eq!(lines.peek(), Some("a"));
        assert_eq!(lines.advance(), Some("a"));
        assert_eq!(lines.line_number(), 1);
        assert_eq!(lines.next(), Some("b"));
        assert_eq!(lines.advance(), None);
        assert_eq!(lines.line_number(), 2);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_full("  27 ", usize), Some(27));
        assert_eq!(parse_full("27 28", usize), None);
        assert_eq!(parse_full("x", u32), None);
        assert_eq!(parse_full(" 1.5D+02", fortran_f64), Some(150.0));
        assert_eq!(parse_full("-2.5E-1", fortran_f64), Some(-0.25));
    }

    #[test]
    fn quoted() {
        assert_eq!(
            quoted_before(r#"  "  Time (h) "  ;x-axis-title"#, "axis-title"),
            Some("Time (h)")
        );
        assert_eq!(quoted_before(r#""a" "b" ;legend"#, ";legend"), Some("a"));
        assert_eq!(quoted_before(r#""title""#, ";graph title"), None);
        assert_eq!(quoted_before("no quotes ;legend", ";legend"), None);
    }
}
