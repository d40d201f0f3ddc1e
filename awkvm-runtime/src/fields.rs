//! Record reading and field splitting
//!
//! ## Field separators (`FS` and the `split` separator)
//! - `" "`: runs of blanks separate fields, leading and trailing blanks ignored
//! - any other single character: split on that character literally
//! - `""`: every character is a field
//! - anything longer: a regular expression
//!
//! ## Record separators (`RS`)
//! - `"\n"` or any single character: split on that character
//! - `""`: paragraph mode, records are separated by blank lines and newline
//!   also separates fields
//! - anything longer: a regular expression

use std::io::BufRead;

use crate::error::Result;
use crate::regex::RegexCache;

/// Highest field number an assignment may create
pub const MAX_FIELD: usize = 1_000_000;

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n'
}

/// Split `text` into fields with separator `fs`
pub fn split_fields(text: &str, fs: &str, regexes: &mut RegexCache) -> Result<Vec<String>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let mut chars = fs.chars();
    let fields = match (chars.next(), chars.next()) {
        (Some(' '), None) => text.split(is_blank).filter(|f| !f.is_empty()).map(String::from).collect(),
        (Some(sep), None) => text.split(sep).map(String::from).collect(),
        (None, _) => text.chars().map(String::from).collect(),
        _ => {
            let regex = regexes.dynamic(fs)?;
            let mut fields = Vec::new();
            let mut last = 0;
            for m in regex.find_iter(text) {
                if m.is_empty() {
                    continue;
                }
                fields.push(text[last..m.start()].to_string());
                last = m.end();
            }
            fields.push(text[last..].to_string());
            fields
        }
    };
    Ok(fields)
}

/// Field splitting of a paragraph-mode record: newline separates fields too
pub fn split_paragraph(text: &str, fs: &str, regexes: &mut RegexCache) -> Result<Vec<String>> {
    if fs == " " {
        return split_fields(text, fs, regexes);
    }
    let mut fields = Vec::new();
    for line in text.split('\n') {
        fields.extend(split_fields(line, fs, regexes)?);
    }
    Ok(fields)
}

/// The current input record and its fields
#[derive(Debug, Clone, Default)]
pub struct Record {
    line: String,
    fields: Vec<String>,
}

impl Record {
    pub fn new(line: String, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn nf(&self) -> usize {
        self.fields.len()
    }

    /// Field `n` (1-based); `None` past `NF`
    pub fn field(&self, n: usize) -> Option<&str> {
        n.checked_sub(1).and_then(|i| self.fields.get(i)).map(String::as_str)
    }

    /// Assign field `n` (1-based), extending with empty fields and rebuilding
    /// the record with `ofs`
    pub fn set_field(&mut self, n: usize, value: String, ofs: &str) {
        if n == 0 {
            return;
        }
        if self.fields.len() < n {
            self.fields.resize(n, String::new());
        }
        self.fields[n - 1] = value;
        self.rebuild(ofs);
    }

    /// Truncate or extend to `nf` fields and rebuild the record with `ofs`
    pub fn set_nf(&mut self, nf: usize, ofs: &str) {
        self.fields.resize(nf, String::new());
        self.rebuild(ofs);
    }

    fn rebuild(&mut self, ofs: &str) {
        self.line = self.fields.join(ofs);
    }
}

/// Reads records from one input according to the current `RS`
pub struct RecordReader<'a> {
    input: &'a mut dyn BufRead,
    buffer: String,
    eof: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(input: &'a mut dyn BufRead) -> Self {
        Self { input, buffer: String::new(), eof: false }
    }

    /// Next record without its terminator, `None` at end of input
    pub fn next_record(&mut self, rs: &str, regexes: &mut RegexCache) -> Result<Option<String>> {
        let mut chars = rs.chars();
        match (chars.next(), chars.next()) {
            (None, _) => self.next_paragraph(),
            (Some(sep), None) if sep.is_ascii() => self.next_terminated(sep),
            _ => self.next_matched(rs, regexes),
        }
    }

    /// Append input up to and including the next `byte`; false at end of input
    fn read_more(&mut self, byte: u8) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut bytes = Vec::new();
        if self.input.read_until(byte, &mut bytes)? == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buffer.push_str(&String::from_utf8_lossy(&bytes));
        Ok(true)
    }

    fn read_all(&mut self) -> Result<()> {
        if !self.eof {
            let mut bytes = Vec::new();
            self.input.read_to_end(&mut bytes)?;
            self.buffer.push_str(&String::from_utf8_lossy(&bytes));
            self.eof = true;
        }
        Ok(())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    fn next_terminated(&mut self, sep: char) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.find(sep) {
                let record = self.buffer[..pos].to_string();
                self.buffer.drain(..pos + sep.len_utf8());
                return Ok(Some(record));
            }
            if !self.read_more(sep as u8)? {
                return Ok(self.take_rest());
            }
        }
    }

    fn next_paragraph(&mut self) -> Result<Option<String>> {
        loop {
            let leading = self.buffer.len() - self.buffer.trim_start_matches('\n').len();
            self.buffer.drain(..leading);
            if let Some(pos) = self.buffer.find("\n\n") {
                let record = self.buffer[..pos].to_string();
                self.buffer.drain(..pos);
                return Ok(Some(record));
            }
            if !self.read_more(b'\n')? {
                let rest = self.take_rest();
                return Ok(rest.map(|r| r.trim_end_matches('\n').to_string()));
            }
        }
    }

    fn next_matched(&mut self, rs: &str, regexes: &mut RegexCache) -> Result<Option<String>> {
        self.read_all()?;
        let regex = regexes.dynamic(rs)?;
        let found = regex.find_iter(&self.buffer).find(|m| !m.is_empty());
        match found {
            Some(m) => {
                let record = self.buffer[..m.start()].to_string();
                self.buffer.drain(..m.end());
                Ok(Some(record))
            }
            None => Ok(self.take_rest()),
        }
    }
}
