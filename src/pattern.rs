//! Glob pattern matching for key enumeration
//!
//! Patterns are compiled once into tokens and then matched against each key
//! without recursion. Matching is anchored at both ends, as in a shell glob.
//!
//! Supported syntax:
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the class; `[^..]` or `[!..]` negate it
//! - `\x` matches `x` literally
//!
//! An empty pattern matches every key, like `*`.

/// A single compiled pattern element
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    Star,
    Class { negate: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl Token {
    /// Whether this single-character token accepts `c` (`Star` never does)
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::Star => false,
            Token::Class { negate, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Char(x) => *x == c,
                    ClassItem::Range(lo, hi) => *lo <= c && c <= *hi,
                });
                hit != *negate
            }
        }
    }
}

/// A compiled glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

impl GlobPattern {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> Self {
        if pattern.is_empty() {
            return Self {
                tokens: vec![Token::Star],
            };
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Consecutive stars are equivalent to one
                    if tokens.last() != Some(&Token::Star) {
                        tokens.push(Token::Star);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '\\' if i + 1 < chars.len() => {
                    tokens.push(Token::Literal(chars[i + 1]));
                    i += 2;
                }
                '[' => match Self::parse_class(&chars, i + 1) {
                    Some((token, next)) => {
                        tokens.push(token);
                        i = next;
                    }
                    // Unterminated class: the bracket is a plain character
                    None => {
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Self { tokens }
    }

    /// Parse a character class body starting right after `[`.
    /// Returns the token and the index just past the closing `]`.
    fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
        let mut i = start;
        let negate = matches!(chars.get(i), Some('^') | Some('!'));
        if negate {
            i += 1;
        }

        let mut items = Vec::new();
        // A `]` right after the opening bracket is a member, not the end
        let body_start = i;

        while i < chars.len() {
            let c = chars[i];
            if c == ']' && i > body_start {
                return Some((Token::Class { negate, items }, i + 1));
            }

            let c = if c == '\\' && i + 1 < chars.len() {
                i += 1;
                chars[i]
            } else {
                c
            };

            if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i + 2] != ']' {
                let (lo, hi) = (c, chars[i + 2]);
                items.push(ClassItem::Range(lo.min(hi), lo.max(hi)));
                i += 3;
            } else {
                items.push(ClassItem::Char(c));
                i += 1;
            }
        }

        None
    }

    /// True if the pattern matches every possible key
    pub fn is_match_all(&self) -> bool {
        self.tokens == [Token::Star]
    }

    /// Check whether `text` matches the whole pattern
    pub fn matches(&self, text: &str) -> bool {
        if self.is_match_all() {
            return true;
        }

        let text: Vec<char> = text.chars().collect();
        let tokens = &self.tokens;

        let (mut p, mut t) = (0usize, 0usize);
        // Position of the last star seen and the text index it currently absorbs up to
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            if p < tokens.len() {
                if tokens[p] == Token::Star {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                if tokens[p].accepts(text[t]) {
                    p += 1;
                    t += 1;
                    continue;
                }
            }

            match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            }
        }

        tokens[p..].iter().all(|tok| *tok == Token::Star)
    }
}

impl Default for GlobPattern {
    fn default() -> Self {
        Self::new("*")
    }
}

impl From<&str> for GlobPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}
