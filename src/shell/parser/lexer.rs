use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    Redirect(RedirectOp),
    Background,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
    Error,  // 2>
}

/// Splits `input` on every unquoted, unescaped occurrence of `sep`.
/// Quotes and escapes are preserved in the returned pieces so they can be
/// tokenized afterwards.
pub fn split_unquoted(input: &str, sep: char) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = input.chars();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single => {
                push(&mut parts, '\\');
                if let Some(next) = chars.next() {
                    push(&mut parts, next);
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                push(&mut parts, c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                push(&mut parts, c);
            }
            c if c == sep && !in_single && !in_double => parts.push(String::new()),
            c => push(&mut parts, c),
        }
    }
    parts
}

fn push(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}

/// Quote-aware tokenizer. Words are whitespace-separated; single and double
/// quotes group, backslash escapes. Operators (`|`, `&`, `<`, `>`, `>>`,
/// `2>`) are recognized only as standalone unquoted tokens, so `a>b` is one
/// word and `">"` is a literal argument.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();
        self.peek_char()?;

        let (word, quoted) = self.read_word();
        if quoted {
            return Some(Token::Word(word));
        }
        Some(match word.as_str() {
            "|" => Token::Pipe,
            "&" => Token::Background,
            "<" => Token::Redirect(RedirectOp::Input),
            ">" => Token::Redirect(RedirectOp::Output),
            ">>" => Token::Redirect(RedirectOp::Append),
            "2>" => Token::Redirect(RedirectOp::Error),
            _ => Token::Word(word),
        })
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    /// Reads one whitespace-delimited word. The flag reports whether any
    /// part was quoted or escaped, which suppresses operator recognition.
    fn read_word(&mut self) -> (String, bool) {
        let mut word = String::new();
        let mut quoted = false;

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                break;
            }
            match c {
                '\'' | '"' => {
                    quoted = true;
                    self.read_quoted(&mut word);
                }
                '\\' => {
                    quoted = true;
                    self.read_char();
                    if let Some(escaped) = self.read_char() {
                        word.push(escaped);
                    }
                }
                _ => {
                    word.push(c);
                    self.read_char();
                }
            }
        }
        (word, quoted)
    }

    fn read_quoted(&mut self, word: &mut String) {
        let quote = match self.read_char() {
            Some(q) => q,
            None => return,
        };
        let mut escaped = false;

        while let Some(c) = self.read_char() {
            match (escaped, c) {
                (true, _) => {
                    word.push(c);
                    escaped = false;
                }
                (false, '\\') if quote == '"' => escaped = true,
                (false, c) if c == quote => break,
                (false, c) => word.push(c),
            }
        }
    }
}
