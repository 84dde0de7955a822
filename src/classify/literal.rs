//! KGTK literal lexer.
//!
//! Splits one raw cell into its lexical shape. The leading character picks
//! the shape; the body is then scanned in full. A body that does not scan
//! yields `Literal::Malformed`, keeping the shape so the renderer can still
//! choose a kind and fall back to the raw text.

use std::iter::Peekable;
use std::str::CharIndices;

use chrono::NaiveDate;

/// The lexical shape of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal<'a> {
    Empty,
    Symbol(&'a str),
    Boolean(bool),
    LanguageString {
        text: String,
        lang: &'a str,
        /// Region or script suffix including its leading `-`, or empty.
        suffix: &'a str,
    },
    String(String),
    /// A bare number: `42`, `+1.5e3`.
    Number(&'a str),
    Quantity(Quantity<'a>),
    DateTime(DateTime<'a>),
    Location { lat: f64, lon: f64 },
    Malformed { shape: Shape, raw: &'a str },
    /// Lists and other forms the browser does not render.
    Other(&'a str),
}

/// Shape picked from the leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Number,
    LanguageString,
    String,
    DateTime,
    Location,
}

/// A number with tolerance and/or units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity<'a> {
    pub number: &'a str,
    pub low: Option<&'a str>,
    pub high: Option<&'a str>,
    pub si_units: Option<&'a str>,
    pub units_node: Option<&'a str>,
}

/// Date and time fields, as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime<'a> {
    pub year: &'a str,
    pub month: Option<&'a str>,
    pub day: Option<&'a str>,
    pub hour: Option<&'a str>,
    pub minutes: Option<&'a str>,
    pub seconds: Option<&'a str>,
    pub precision: Option<u8>,
}

/// Lex one cell.
pub fn lex(token: &str) -> Literal<'_> {
    let Some(first) = token.chars().next() else {
        return Literal::Empty;
    };
    match first {
        '\'' => lex_language_string(token),
        '"' => lex_string(token),
        '^' => lex_date_time(token),
        '@' => lex_location(token),
        '+' | '-' | '.' | '0'..='9' => lex_number(token),
        _ if token.contains('|') => Literal::Other(token),
        _ if token == "True" => Literal::Boolean(true),
        _ if token == "False" => Literal::Boolean(false),
        '[' | '(' | '!' | '&' | '{' => Literal::Other(token),
        _ => Literal::Symbol(token),
    }
}

// ============================================================================
// Strings
// ============================================================================

fn lex_language_string(token: &str) -> Literal<'_> {
    let malformed = Literal::Malformed { shape: Shape::LanguageString, raw: token };
    let Some(at) = token.rfind("'@") else {
        return malformed;
    };
    if at == 0 {
        return malformed;
    }
    let tag = &token[at + 2..];
    let (lang, suffix) = match tag.find('-') {
        Some(dash) => (&tag[..dash], &tag[dash..]),
        None => (tag, ""),
    };
    let lang_ok = (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_alphabetic());
    let suffix_ok = suffix
        .chars()
        .skip(1)
        .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !lang_ok || !suffix_ok || suffix == "-" {
        return malformed;
    }
    Literal::LanguageString {
        text: unescape(&token[1..at]),
        lang,
        suffix,
    }
}

fn lex_string(token: &str) -> Literal<'_> {
    if token.len() >= 2 && token.ends_with('"') && !token.ends_with("\\\"") {
        Literal::String(unescape(&token[1..token.len() - 1]))
    } else {
        Literal::Malformed { shape: Shape::String, raw: token }
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(e @ ('\\' | '\'' | '"' | '|')) => out.push(e),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Strip KGTK string quoting. Language-qualified strings lose their tag;
/// anything that is not a string is returned as written.
pub fn unstringify(value: &str) -> String {
    match lex(value) {
        Literal::LanguageString { text, .. } | Literal::String(text) => text,
        _ => value.to_string(),
    }
}

/// `unstringify`, with a default for absent or empty cells.
pub fn unstringify_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => unstringify(v),
        _ => default.to_string(),
    }
}

/// Build a language-qualified string, `'text'@lang`.
pub fn stringify(text: &str, lang: &str) -> String {
    let mut out = String::with_capacity(text.len() + lang.len() + 3);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' | '\\' | '|' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push_str("'@");
    out.push_str(lang);
    out
}

/// The full language tag of a language-qualified string (`en`, `en-gb`).
pub fn language_tag(value: &str) -> Option<&str> {
    if !value.starts_with('\'') {
        return None;
    }
    let at = value.rfind("'@")?;
    (at > 0).then(|| &value[at + 2..])
}

// ============================================================================
// Numbers and quantities
// ============================================================================

/// Character scanner over one token.
struct Scanner<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().peekable() }
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn digits(&mut self) -> usize {
        let mut n = 0;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            n += 1;
        }
        n
    }

    /// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
    fn number(&mut self) -> Option<&'a str> {
        let start = self.pos();
        if !self.eat('+') {
            self.eat('-');
        }
        let mut mantissa = self.digits();
        if self.eat('.') {
            mantissa += self.digits();
        }
        if mantissa == 0 {
            return None;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut probe = self.chars.clone();
            probe.next();
            if matches!(probe.peek(), Some(&(_, '+' | '-'))) {
                probe.next();
            }
            if probe.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                self.chars = probe;
                self.digits();
            }
        }
        let end = self.pos();
        Some(&self.src[start..end])
    }

    fn rest(&mut self) -> &'a str {
        let p = self.pos();
        &self.src[p..]
    }
}

fn lex_number(token: &str) -> Literal<'_> {
    let malformed = Literal::Malformed { shape: Shape::Number, raw: token };
    let mut sc = Scanner::new(token);
    let Some(number) = sc.number() else {
        return malformed;
    };

    let (mut low, mut high) = (None, None);
    let tolerance = sc.eat('[');
    if tolerance {
        low = sc.number();
        if !sc.eat(',') {
            return malformed;
        }
        high = sc.number();
        if !sc.eat(']') {
            return malformed;
        }
    }

    let rest = sc.rest();
    let (si_units, units_node) = if rest.is_empty() {
        (None, None)
    } else if is_units_node(rest) {
        (None, Some(rest))
    } else if is_si_units(rest) {
        (Some(rest), None)
    } else {
        return malformed;
    };

    if !tolerance && si_units.is_none() && units_node.is_none() {
        return Literal::Number(number);
    }
    Literal::Quantity(Quantity { number, low, high, si_units, units_node })
}

fn is_units_node(s: &str) -> bool {
    s.len() > 1 && s.starts_with('Q') && s[1..].chars().all(|c| c.is_ascii_digit())
}

fn is_si_units(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || "^/.*-".contains(c))
}

// ============================================================================
// Dates and times
// ============================================================================

fn lex_date_time(token: &str) -> Literal<'_> {
    let malformed = Literal::Malformed { shape: Shape::DateTime, raw: token };
    let body = &token[1..];
    let (stamp, precision) = match body.rsplit_once('/') {
        Some((stamp, p)) => match p.parse::<u8>() {
            Ok(p) => (stamp, Some(p)),
            Err(_) => return malformed,
        },
        None => (body, None),
    };

    let mut sc = Scanner::new(stamp);
    let year_start = sc.pos();
    if !sc.eat('+') {
        sc.eat('-');
    }
    if sc.digits() < 4 {
        return malformed;
    }
    let year_end = sc.pos();
    let year = &stamp[year_start..year_end];

    let mut fields: [Option<&str>; 5] = [None; 5];
    if sc.eat('-') {
        let Some((s, e)) = two_digits(&mut sc) else { return malformed };
        fields[0] = Some(&stamp[s..e]);
        if sc.eat('-') {
            let Some((s, e)) = two_digits(&mut sc) else { return malformed };
            fields[1] = Some(&stamp[s..e]);
        }
    }
    if sc.eat('T') {
        if fields[1].is_none() {
            return malformed;
        }
        let Some((s, e)) = two_digits(&mut sc) else { return malformed };
        fields[2] = Some(&stamp[s..e]);
        if !sc.eat(':') {
            return malformed;
        }
        let Some((s, e)) = two_digits(&mut sc) else { return malformed };
        fields[3] = Some(&stamp[s..e]);
        if sc.eat(':') {
            let Some((s, e)) = two_digits(&mut sc) else { return malformed };
            fields[4] = Some(&stamp[s..e]);
            if sc.eat('.') && sc.digits() == 0 {
                return malformed;
            }
        }
    }
    sc.eat('Z');
    if !sc.rest().is_empty() {
        return malformed;
    }

    let [month, day, hour, minutes, seconds] = fields;
    let n = |f: Option<&str>| f.and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
    if n(month) > 12 || n(day) > 31 || n(hour) > 23 || n(minutes) > 59 || n(seconds) > 60 {
        return malformed;
    }
    if n(month) > 0 && n(day) > 0 {
        if let Ok(y) = year.parse::<i32>() {
            if NaiveDate::from_ymd_opt(y, n(month), n(day)).is_none() {
                return malformed;
            }
        }
    }

    Literal::DateTime(DateTime { year, month, day, hour, minutes, seconds, precision })
}

fn two_digits(sc: &mut Scanner<'_>) -> Option<(usize, usize)> {
    let start = sc.pos();
    (sc.digits() == 2).then(|| (start, sc.pos()))
}

// ============================================================================
// Locations
// ============================================================================

fn lex_location(token: &str) -> Literal<'_> {
    let parsed = token[1..].split_once('/').and_then(|(lat, lon)| {
        let lat: f64 = lat.parse().ok()?;
        let lon: f64 = lon.parse().ok()?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
    });
    match parsed {
        Some((lat, lon)) => Literal::Location { lat, lon },
        None => Literal::Malformed { shape: Shape::Location, raw: token },
    }
}
