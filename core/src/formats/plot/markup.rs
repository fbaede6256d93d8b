//! Turns the markup of TU plot labels into matplotlib-style mathtext.
//!
//! `^x`, `^{...}`, `_x` and `_{...}` become `$^x$` and so on, `\L` becomes the symbol the
//! letter stands for (`\D` is `$\Delta$`). Anything already inside a `$...$` span is left
//! alone.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SUPERSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^(?:\w|\{\w*\})").expect("superscript pattern is valid"));
static SUBSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(?:\w|\{\w*\})").expect("subscript pattern is valid"));
static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(\w)").expect("symbol pattern is valid"));

const SYMBOLS: [(char, &str); 42] = [
    ('a', "alpha"),
    ('b', "beta"),
    ('c', "chi"),
    ('d', "delta"),
    ('e', "epsilon"),
    ('f', "phi"),
    ('g', "gamma"),
    ('h', "eta"),
    ('i', "iota"),
    ('j', "varphi"),
    ('k', "kappa"),
    ('l', "lambda"),
    ('m', "mu"),
    ('n', "nu"),
    ('o', "o"),
    ('p', "pi"),
    ('q', "theta"),
    ('r', "rho"),
    ('s', "sigma"),
    ('t', "tau"),
    ('u', "upsilon"),
    ('v', "varpi"),
    ('w', "omega"),
    ('x', "xi"),
    ('y', "psi"),
    ('z', "zeta"),
    ('A', "AA"),
    ('D', "Delta"),
    ('F', "Phi"),
    ('G', "Gamma"),
    ('I', "int"),
    ('J', "vartheta"),
    ('L', "Lambda"),
    ('P', "PI"),
    ('Q', "Theta"),
    ('S', "Sigma"),
    ('T', "infty"),
    ('U', "Upsilon"),
    ('V', "varsigma"),
    ('W', "Omega"),
    ('X', "Xi"),
    ('Y', "Psi"),
];

static SYMBOL_NAMES: Lazy<HashMap<char, &'static str>> = Lazy::new(|| SYMBOLS.into_iter().collect());

const MATH: char = '$';

pub fn normalize(text: &str) -> String {
    let text = wrap_unescaped(text, &SUPERSCRIPT, |caps| format!("{MATH}{}{MATH}", &caps[0]));
    let text = wrap_unescaped(&text, &SUBSCRIPT, |caps| format!("{MATH}{}{MATH}", &caps[0]));
    wrap_unescaped(&text, &SYMBOL, |caps| {
        let letter = &caps[1];
        let name = letter
            .chars()
            .next()
            .and_then(|c| SYMBOL_NAMES.get(&c).copied())
            .unwrap_or(letter);
        format!("{MATH}\\{name}{MATH}")
    })
}

/// Replaces every match of `pattern` outside of a `$...$` span.
fn wrap_unescaped(text: &str, pattern: &Regex, replace: impl Fn(&Captures<'_>) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        if in_math(&text[..m.start()]) {
            out.push_str(m.as_str());
        } else {
            out.push_str(&replace(&caps));
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Whether the text following `prefix` is inside an open `$` span.
fn in_math(prefix: &str) -> bool {
    prefix.matches(MATH).count() % 2 == 1
}
