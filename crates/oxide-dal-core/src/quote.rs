//! Identifier quoting.
//!
//! Identifiers are quoted segment by segment: `a.b.c` becomes `"a"."b"."c"`
//! with bare dots between the quoted parts. Quote characters inside a
//! segment are doubled, never rejected.
//!
//! Input that is already quoted is passed through untouched, one segment at a
//! time, so `"public".users` renders as `"public"."users"`. A segment counts
//! as already quoted only when it starts with the quote character and its
//! closing quote is immediately followed by a dot or the end of input. Inside
//! such a segment dots are literal and doubled quotes are escapes.
//!
//! Fallbacks:
//! - an empty input or an empty segment renders as an empty quoted pair (`""`),
//!   so the output always ends with a closing quote;
//! - an unterminated quoted segment (`"abc`) is treated as bare text and
//!   escaped as a whole (`"""abc"`);
//! - text after the closing quote of a segment (`"ab"cd`) makes the whole
//!   segment bare text (`"""ab""cd"`).

use crate::error::QuoteError;

/// Scanner state for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// At the first character of a segment.
    Start,
    /// Inside a bare segment.
    Bare,
    /// Inside an already-quoted segment.
    Quoted,
    /// Saw a quote inside a quoted segment: either an escape or the close.
    QuoteSeen,
}

/// Quotes `raw` with `quote` and appends the result to `out`.
///
/// Never fails; see the module documentation for the rules applied to odd
/// input.
pub fn quote_to(out: &mut String, raw: &str, quote: char) {
    out.reserve(raw.len() + 2);

    let mut state = Scan::Start;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        state = match state {
            Scan::Start if c == quote => Scan::Quoted,
            Scan::Start | Scan::Bare if c == '.' => {
                emit(out, &raw[start..i], false, quote);
                out.push('.');
                start = i + 1;
                Scan::Start
            }
            Scan::Start | Scan::Bare => Scan::Bare,
            Scan::Quoted if c == quote => Scan::QuoteSeen,
            Scan::Quoted => Scan::Quoted,
            // Doubled quote inside a quoted segment.
            Scan::QuoteSeen if c == quote => Scan::Quoted,
            Scan::QuoteSeen if c == '.' => {
                emit(out, &raw[start..i], true, quote);
                out.push('.');
                start = i + 1;
                Scan::Start
            }
            Scan::QuoteSeen => Scan::Bare,
        };
    }

    emit(out, &raw[start..], state == Scan::QuoteSeen, quote);
}

fn emit(out: &mut String, segment: &str, self_quoted: bool, quote: char) {
    if self_quoted {
        out.push_str(segment);
        return;
    }
    out.push(quote);
    for c in segment.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
}

/// Quotes `raw` with `quote` into a new string.
#[must_use]
pub fn quote(raw: &str, quote: char) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    quote_to(&mut out, raw, quote);
    out
}

/// Splits a fully quoted identifier back into its raw segments.
///
/// This is the inverse of [`quote`] for bare input: every segment must be
/// wrapped in `quote`, with embedded quotes doubled.
///
/// # Errors
///
/// Returns [`QuoteError::Malformed`] when a segment is not properly quoted.
pub fn split_identifier(quoted: &str, quote: char) -> Result<Vec<String>, QuoteError> {
    let malformed = |position: usize| QuoteError::Malformed {
        input: quoted.to_string(),
        position,
    };

    let mut segments = Vec::new();
    let mut chars = quoted.char_indices().peekable();

    loop {
        match chars.next() {
            Some((_, c)) if c == quote => {}
            Some((i, _)) => return Err(malformed(i)),
            None => return Err(malformed(quoted.len())),
        }

        let mut segment = String::new();
        loop {
            match chars.next() {
                None => return Err(malformed(quoted.len())),
                Some((_, c)) if c == quote => {
                    if chars.peek().is_some_and(|&(_, next)| next == quote) {
                        chars.next();
                        segment.push(quote);
                    } else {
                        break;
                    }
                }
                Some((_, c)) => segment.push(c),
            }
        }
        segments.push(segment);

        match chars.next() {
            None => return Ok(segments),
            Some((_, '.')) => {}
            Some((i, _)) => return Err(malformed(i)),
        }
    }
}

/// Checks that `quote` can delimit identifiers.
///
/// # Errors
///
/// Returns [`QuoteError::InvalidQuoteChar`] for characters that would clash
/// with names, separators, placeholders or string literals. Bracket
/// characters are rejected too: quoting opens and closes with the same
/// character, which cannot express `[name]`.
pub fn validate_quote_char(quote: char) -> Result<(), QuoteError> {
    let clashes = quote.is_alphanumeric()
        || quote.is_whitespace()
        || quote.is_control()
        || matches!(
            quote,
            '.' | '_' | '?' | '$' | '\'' | ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'
        );
    if clashes {
        Err(QuoteError::InvalidQuoteChar(quote))
    } else {
        Ok(())
    }
}

/// An identifier quoter bound to one quote character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quoter {
    quote: char,
}

impl Quoter {
    /// Creates a quoter, validating the quote character.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::InvalidQuoteChar`] if `quote` cannot delimit
    /// identifiers.
    pub fn new(quote: char) -> Result<Self, QuoteError> {
        validate_quote_char(quote)?;
        Ok(Self { quote })
    }

    /// Returns the quote character.
    #[must_use]
    pub const fn quote_char(&self) -> char {
        self.quote
    }

    /// Appends the quoted form of `raw` to `out`.
    pub fn quote_to(&self, out: &mut String, raw: &str) {
        quote_to(out, raw, self.quote);
    }

    /// Returns the quoted form of `raw`.
    #[must_use]
    pub fn quote(&self, raw: &str) -> String {
        quote(raw, self.quote)
    }

    /// Splits a quoted identifier into raw segments.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::Malformed`] for improperly quoted input.
    pub fn split(&self, quoted: &str) -> Result<Vec<String>, QuoteError> {
        split_identifier(quoted, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        assert_eq!(quote("users", '"'), "\"users\"");
        assert_eq!(quote("users", '`'), "`users`");
    }

    #[test]
    fn test_dotted_segments() {
        assert_eq!(quote("a.b.c", '"'), "\"a\".\"b\".\"c\"");
        assert_eq!(quote("main.users", '`'), "`main`.`users`");
    }

    #[test]
    fn test_empty_input_is_closed() {
        assert_eq!(quote("", '"'), "\"\"");
    }

    #[test]
    fn test_empty_segments() {
        assert_eq!(quote("a.", '"'), "\"a\".\"\"");
        assert_eq!(quote(".a", '"'), "\"\".\"a\"");
        assert_eq!(quote("a..b", '"'), "\"a\".\"\".\"b\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        assert_eq!(quote("a\"b", '"'), "\"a\"\"b\"");
        assert_eq!(quote("a\"\"\"b", '"'), "\"a\"\"\"\"\"\"b\"");
        assert_eq!(quote("ab`", '`'), "`ab```");
    }

    #[test]
    fn test_already_quoted_passes_through() {
        assert_eq!(quote("\"public\".users", '"'), "\"public\".\"users\"");
        assert_eq!(quote("`a.b`", '`'), "`a.b`");
        assert_eq!(quote("`a``b`.c", '`'), "`a``b`.`c`");
        assert_eq!(quote("\"\"", '"'), "\"\"");
    }

    #[test]
    fn test_unterminated_quote_falls_back_to_bare() {
        assert_eq!(quote("\"abc", '"'), "\"\"\"abc\"");
        assert_eq!(quote("`a.b", '`'), "```a.b`");
    }

    #[test]
    fn test_text_after_closing_quote_falls_back_to_bare() {
        assert_eq!(quote("\"ab\"cd", '"'), "\"\"\"ab\"\"cd\"");
    }

    #[test]
    fn test_round_trip_embedded_quotes() {
        for n in 0..6 {
            let run = "\"".repeat(n);
            for raw in [
                format!("a{run}b"),
                format!("ab{run}"),
                format!("x{run}y{run}z"),
            ] {
                let quoted = quote(&raw, '"');
                assert_eq!(split_identifier(&quoted, '"').unwrap(), vec![raw.clone()]);
            }
        }
    }

    #[test]
    fn test_round_trip_backtick() {
        let raw = "we``ird`";
        let quoted = quote(raw, '`');
        assert_eq!(split_identifier(&quoted, '`').unwrap(), vec![raw.to_string()]);
    }

    #[test]
    fn test_split_multi_segment() {
        assert_eq!(
            split_identifier("\"a\".\"b\"\"c\"", '"').unwrap(),
            vec!["a".to_string(), "b\"c".to_string()]
        );
    }

    #[test]
    fn test_split_rejects_malformed() {
        assert!(split_identifier("abc", '"').is_err());
        assert!(split_identifier("\"abc", '"').is_err());
        assert!(split_identifier("\"a\"b", '"').is_err());
        assert!(split_identifier("", '"').is_err());
    }

    #[test]
    fn test_quoter_validation() {
        assert!(Quoter::new('"').is_ok());
        assert!(Quoter::new('`').is_ok());
        assert_eq!(Quoter::new('.'), Err(QuoteError::InvalidQuoteChar('.')));
        assert_eq!(Quoter::new('a'), Err(QuoteError::InvalidQuoteChar('a')));
        assert_eq!(Quoter::new('\''), Err(QuoteError::InvalidQuoteChar('\'')));
        for bracket in ['[', ']', '(', '{', '<'] {
            assert_eq!(Quoter::new(bracket), Err(QuoteError::InvalidQuoteChar(bracket)));
        }
    }

    #[test]
    fn test_quote_to_appends() {
        let quoter = Quoter::new('"').unwrap();
        let mut out = String::from("SELECT * FROM ");
        quoter.quote_to(&mut out, "users");
        assert_eq!(out, "SELECT * FROM \"users\"");
    }
}
