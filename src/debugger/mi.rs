//! GDB/MI output record parser
//!
//! Parses one line of GDB Machine Interface output into a [`Record`]:
//!
//! ```text
//! 12^done,frame={level="0",func="main"}     result record (with token)
//! *stopped,reason="breakpoint-hit",...       exec async record
//! =thread-group-started,id="i1"              notify async record
//! ~"Breakpoint 1 at 0x1139\n"                console stream record
//! (gdb)                                      prompt
//! ```

use crate::{Error, Result};

/// An MI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A C-string constant
    Const(String),
    /// `{name=value,...}`
    Tuple(Vec<(String, Value)>),
    /// `[value,...]`; a `[name=value,...]` list stores each result as a one-entry tuple
    List(Vec<Value>),
}

impl Value {
    /// Look up a field of a tuple
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Tuple(fields) => lookup(fields, name),
            _ => None,
        }
    }

    /// Look up a string field of a tuple
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list (empty for anything else)
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            _ => &[],
        }
    }
}

/// Find a named result
pub fn lookup<'a>(results: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    results.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

/// Result class of a `^` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

/// Kind of stream record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `~` output meant for the console
    Console,
    /// `@` output of the target program
    Target,
    /// `&` gdb's internal log
    Log,
}

/// Kind of async record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` execution state changes
    Exec,
    /// `+` progress
    Status,
    /// `=` notifications
    Notify,
}

/// One line of MI output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: Vec<(String, Value)>,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        results: Vec<(String, Value)>,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    /// The `(gdb)` prompt
    Prompt,
    /// A line that is not MI (usually target output on a shared terminal)
    Other(String),
}

/// Parse one line of MI output. Lines that are not MI at all become
/// [`Record::Other`]; malformed MI is an error.
pub fn parse_line(line: &str) -> Result<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim_end() == "(gdb)" {
        return Ok(Record::Prompt);
    }

    let mut cursor = Cursor::new(line);
    let token = cursor.token();

    match cursor.peek() {
        Some(b'^') => {
            cursor.bump();
            let class = match cursor.identifier().as_str() {
                "done" => ResultClass::Done,
                "running" => ResultClass::Running,
                "connected" => ResultClass::Connected,
                "error" => ResultClass::Error,
                "exit" => ResultClass::Exit,
                other => return Err(Error::MiParse(format!("unknown result class: {}", other))),
            };
            let results = cursor.trailing_results()?;
            Ok(Record::Result { token, class, results })
        }
        Some(c @ (b'*' | b'+' | b'=')) => {
            cursor.bump();
            let kind = match c {
                b'*' => AsyncKind::Exec,
                b'+' => AsyncKind::Status,
                _ => AsyncKind::Notify,
            };
            let class = cursor.identifier();
            if class.is_empty() {
                return Err(Error::MiParse(format!("missing async class: {}", line)));
            }
            let results = cursor.trailing_results()?;
            Ok(Record::Async { token, kind, class, results })
        }
        Some(c @ (b'~' | b'@' | b'&')) if token.is_none() => {
            cursor.bump();
            let kind = match c {
                b'~' => StreamKind::Console,
                b'@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let text = cursor.c_string()?;
            Ok(Record::Stream { kind, text })
        }
        _ => Ok(Record::Other(line.to_string())),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(Error::MiParse(format!(
                "expected '{}' at {}, found '{}'",
                expected as char,
                self.pos - 1,
                c as char
            ))),
            None => Err(Error::MiParse(format!(
                "expected '{}', found end of line",
                expected as char
            ))),
        }
    }

    fn token(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn trailing_results(&mut self) -> Result<Vec<(String, Value)>> {
        let mut results = Vec::new();
        while self.peek() == Some(b',') {
            self.bump();
            results.push(self.result()?);
        }
        match self.peek() {
            None => Ok(results),
            Some(c) => Err(Error::MiParse(format!(
                "unexpected '{}' at {}",
                c as char, self.pos
            ))),
        }
    }

    fn result(&mut self) -> Result<(String, Value)> {
        let name = self.identifier();
        if name.is_empty() {
            return Err(Error::MiParse(format!("expected result name at {}", self.pos)));
        }
        self.expect(b'=')?;
        let value = self.value()?;
        Ok((name, value))
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'"') => Ok(Value::Const(self.c_string()?)),
            Some(b'{') => {
                self.bump();
                let mut fields = Vec::new();
                if self.peek() == Some(b'}') {
                    self.bump();
                    return Ok(Value::Tuple(fields));
                }
                loop {
                    fields.push(self.result()?);
                    match self.bump() {
                        Some(b',') => continue,
                        Some(b'}') => return Ok(Value::Tuple(fields)),
                        _ => return Err(Error::MiParse("unterminated tuple".to_string())),
                    }
                }
            }
            Some(b'[') => {
                self.bump();
                let mut items = Vec::new();
                if self.peek() == Some(b']') {
                    self.bump();
                    return Ok(Value::List(items));
                }
                loop {
                    let item = match self.peek() {
                        Some(b'"' | b'{' | b'[') => self.value()?,
                        _ => {
                            let (name, value) = self.result()?;
                            Value::Tuple(vec![(name, value)])
                        }
                    };
                    items.push(item);
                    match self.bump() {
                        Some(b',') => continue,
                        Some(b']') => return Ok(Value::List(items)),
                        _ => return Err(Error::MiParse("unterminated list".to_string())),
                    }
                }
            }
            Some(c) => Err(Error::MiParse(format!(
                "unexpected '{}' at {}",
                c as char, self.pos
            ))),
            None => Err(Error::MiParse("unexpected end of line".to_string())),
        }
    }

    fn c_string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                None => return Err(Error::MiParse("unterminated string".to_string())),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'e') => out.push(0x1b),
                    Some(d @ b'0'..=b'7') => {
                        // Up to three octal digits
                        let mut code = u32::from(d - b'0');
                        for _ in 0..2 {
                            match self.peek() {
                                Some(n @ b'0'..=b'7') => {
                                    self.bump();
                                    code = code * 8 + u32::from(n - b'0');
                                }
                                _ => break,
                            }
                        }
                        out.push((code & 0xff) as u8);
                    }
                    Some(other) => out.push(other),
                    None => return Err(Error::MiParse("unterminated escape".to_string())),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Quote a string as an MI C-string argument
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
