//! Tokenizer for behavior scripts

use super::ast::Pos;
use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// A line break precedes this token
    pub newline_before: bool,
}

/// Longest first
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "=>",
    "(", ")", "{", "}", "[", "]", ";", ",", ".", "?", ":", "+", "-", "*", "/", "%", "<", ">", "=",
    "!",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: u32,
    col: u32,
    newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            line: 1,
            col: 1,
            newline: true,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let pos = self.pos();
            let newline_before = std::mem::take(&mut self.newline);

            let Some(&(start, c)) = self.chars.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                    newline_before: true,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit()
                || (c == '.' && self.source[start + 1..].starts_with(|d: char| d.is_ascii_digit()))
            {
                self.number(start)?
            } else if c == '"' || c == '\'' || c == '`' {
                self.string(c)?
            } else if is_ident_start(c) {
                self.ident(start)
            } else {
                self.punct(start, pos)?
            };

            tokens.push(Token {
                kind,
                pos,
                newline_before,
            });
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.newline = true;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn rest(&mut self) -> &'a str {
        match self.chars.peek() {
            Some(&(idx, _)) => &self.source[idx..],
            None => "",
        }
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if rest.starts_with("/*") {
                let pos = self.pos();
                self.bump();
                self.bump();
                loop {
                    if self.rest().starts_with("*/") {
                        self.bump();
                        self.bump();
                        break;
                    }
                    if self.bump().is_none() {
                        return Err(SyntaxError::new("Unterminated comment", pos));
                    }
                }
            } else if self.peek_char().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        let pos = self.pos();
        let rest = &self.source[start..];

        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek_char().filter(char::is_ascii_hexdigit) {
                digits.push(c);
                self.bump();
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| SyntaxError::new("Invalid hexadecimal literal", pos));
        }

        let mut text = String::new();
        let mut seen_exp = false;
        while let Some(c) = self.peek_char() {
            let accept = c.is_ascii_digit()
                || c == '_'
                || (c == '.' && !seen_exp && !text.contains('.'))
                || ((c == 'e' || c == 'E') && !seen_exp);
            if !accept {
                break;
            }
            if c == 'e' || c == 'E' {
                seen_exp = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek_char().filter(|s| *s == '+' || *s == '-') {
                    text.push(sign);
                    self.bump();
                }
                continue;
            }
            if c != '_' {
                text.push(c);
            }
            self.bump();
        }

        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SyntaxError::new(format!("Invalid number literal '{}'", text), pos))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        let pos = self.pos();
        self.bump();
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new("Unterminated string literal", pos));
            };
            if c == quote {
                return Ok(TokenKind::Str(value));
            }
            if c == '\n' && quote != '`' {
                return Err(SyntaxError::new("Unterminated string literal", pos));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some(escaped) = self.bump() else {
                return Err(SyntaxError::new("Unterminated string literal", pos));
            };
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'v' => value.push('\u{b}'),
                'u' => value.push(self.unicode_escape(pos)?),
                '\n' => {}
                other => value.push(other),
            }
        }
    }

    fn unicode_escape(&mut self, pos: Pos) -> Result<char, SyntaxError> {
        let mut hex = String::new();
        if self.peek_char() == Some('{') {
            self.bump();
            while let Some(c) = self.bump() {
                if c == '}' {
                    break;
                }
                hex.push(c);
            }
        } else {
            for _ in 0..4 {
                match self.bump() {
                    Some(c) => hex.push(c),
                    None => break,
                }
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new("Invalid Unicode escape sequence", pos))
    }

    fn ident(&mut self, start: usize) -> TokenKind {
        let mut end = start;
        while let Some(&(idx, c)) = self.chars.peek() {
            if !is_ident_part(c) {
                break;
            }
            end = idx + c.len_utf8();
            self.bump();
        }
        TokenKind::Ident(self.source[start..end].to_string())
    }

    fn punct(&mut self, start: usize, pos: Pos) -> Result<TokenKind, SyntaxError> {
        let rest = &self.source[start..];
        for p in PUNCTUATORS {
            if rest.starts_with(p) {
                for _ in 0..p.len() {
                    self.bump();
                }
                return Ok(TokenKind::Punct(p));
            }
        }
        let c = rest.chars().next().unwrap_or('?');
        Err(SyntaxError::new(format!("Invalid or unexpected token '{}'", c), pos))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("let x = 1.5 + 0x10;"),
            vec![
                TokenKind::Ident("let".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Punct("="),
                TokenKind::Number(1.5),
                TokenKind::Punct("+"),
                TokenKind::Number(16.0),
                TokenKind::Punct(";"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_comments() {
        assert_eq!(
            kinds("// note\n'a\\nb' /* x */ `t`"),
            vec![
                TokenKind::Str("a\nb".into()),
                TokenKind::Str("t".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_and_newlines() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[1].pos, Pos { line: 2, col: 3 });
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.pos, Pos { line: 1, col: 1 });
    }

    #[test]
    fn test_strict_equality_is_one_token() {
        assert_eq!(kinds("a === b")[1], TokenKind::Punct("==="));
    }
}
