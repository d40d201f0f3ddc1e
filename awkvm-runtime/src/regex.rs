//! Compiled regular expressions
//!
//! Pool regexes are compiled once when a VM is built. Dynamic patterns (a
//! string used as a regex at run time) go through a small bounded cache.

use std::collections::HashMap;

use regex_automata::meta::Regex;
use crate::error::{Result, RuntimeError};

/// Upper bound on cached dynamic patterns; the cache is cleared when full
const MAX_DYNAMIC: usize = 100;

pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| RuntimeError::Regex {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug, Default)]
pub struct RegexCache {
    pool: Vec<Regex>,
    dynamic: HashMap<String, Regex>,
}

impl RegexCache {
    /// Compile every pool source
    pub fn new(sources: &[String]) -> Result<Self> {
        let pool = sources.iter().map(|source| compile(source)).collect::<Result<Vec<_>>>()?;
        Ok(Self { pool, dynamic: HashMap::new() })
    }

    pub fn pool(&self, index: usize) -> Option<&Regex> {
        self.pool.get(index)
    }

    /// Regex for a run-time pattern string
    pub fn dynamic(&mut self, pattern: &str) -> Result<Regex> {
        if let Some(regex) = self.dynamic.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = compile(pattern)?;
        if self.dynamic.len() >= MAX_DYNAMIC {
            self.dynamic.clear();
        }
        self.dynamic.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    pub fn cached(&self) -> usize {
        self.dynamic.len()
    }
}
