//!
//! Glob matching for `--glob`, `--notglob` and `--tableresult`.
//!
//! Byte-oriented. Supported syntax:
//!
//! ```text
//! *        any run of bytes, including none
//! ?        exactly one byte
//! [...]    one byte from the class; `^` inverts, `a-z` ranges, a leading
//!          `]` is literal
//! #        an integer: optional sign then digits, or `0x` then hex digits
//! other    itself
//! ```
//!
//! After `*`, a `#` is an ordinary literal.
//!

/// True when `text` matches `pattern` in full.
pub fn matches(pattern: &str, text: &str) -> bool {
    glob_bytes(pattern.as_bytes(), text.as_bytes())
}

/// Outcome of a `--glob` (`negate == false`) or `--notglob` check.
pub fn passes(pattern: &str, text: &str, negate: bool) -> bool {
    matches(pattern, text) != negate
}

#[inline]
fn at(bytes: &[u8], idx: usize) -> u8 {
    bytes.get(idx).copied().unwrap_or(0)
}

fn glob_bytes(glob: &[u8], text: &[u8]) -> bool {
    let mut g = 0;
    let mut t = 0;

    while g < glob.len() {
        let c = glob[g];
        g += 1;
        match c {
            b'*' => {
                while g < glob.len() && matches!(glob[g], b'*' | b'?') {
                    if glob[g] == b'?' {
                        if t >= text.len() {
                            return false;
                        }
                        t += 1;
                    }
                    g += 1;
                }
                if g == glob.len() {
                    return true;
                }
                let next = glob[g];
                if next == b'[' {
                    while t < text.len() {
                        if glob_bytes(&glob[g..], &text[t..]) {
                            return true;
                        }
                        t += 1;
                    }
                    return false;
                }
                g += 1;
                while t < text.len() {
                    let ch = text[t];
                    t += 1;
                    if ch == next && glob_bytes(&glob[g..], &text[t..]) {
                        return true;
                    }
                }
                return false;
            }
            b'?' => {
                if t >= text.len() {
                    return false;
                }
                t += 1;
            }
            b'[' => {
                if t >= text.len() {
                    return false;
                }
                let ch = text[t];
                t += 1;

                let mut seen = false;
                let mut invert = false;
                let mut prior: u8 = 0;
                let mut c2 = at(glob, g);
                g += 1;
                if c2 == b'^' {
                    invert = true;
                    c2 = at(glob, g);
                    g += 1;
                }
                if c2 == b']' {
                    seen = ch == b']';
                    c2 = at(glob, g);
                    g += 1;
                }
                while c2 != 0 && c2 != b']' {
                    if c2 == b'-' && !matches!(at(glob, g), b']' | 0) && prior > 0 {
                        c2 = at(glob, g);
                        g += 1;
                        if ch >= prior && ch <= c2 {
                            seen = true;
                        }
                        prior = 0;
                    } else {
                        if ch == c2 {
                            seen = true;
                        }
                        prior = c2;
                    }
                    c2 = at(glob, g);
                    g += 1;
                }
                if c2 == 0 || seen == invert {
                    return false;
                }
            }
            b'#' => match scan_number(&text[t..]) {
                Some(len) => t += len,
                None => return false,
            },
            _ => {
                if at(text, t) != c || t >= text.len() {
                    return false;
                }
                t += 1;
            }
        }
    }
    t == text.len()
}

/// Length of the integer literal at the start of `text`, if there is one.
fn scan_number(text: &[u8]) -> Option<usize> {
    if at(text, 0) == b'0' && matches!(at(text, 1), b'x' | b'X') && at(text, 2).is_ascii_hexdigit()
    {
        let digits = text[2..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
        return Some(2 + digits);
    }
    let sign = usize::from(matches!(at(text, 0), b'-' | b'+') && at(text, 1).is_ascii_digit());
    let digits = text[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    (digits > 0).then_some(sign + digits)
}
