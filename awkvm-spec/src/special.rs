//! Special (built-in) variable table
//!
//! `Special`, `AssignSpecial`, `IncrSpecial` and `AugAssignSpecial` address
//! these by index. Read and write side effects live in the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialVar {
    Convfmt = 0,
    Filename = 1,
    Fnr = 2,
    Fs = 3,
    Nf = 4,
    Nr = 5,
    Ofmt = 6,
    Ofs = 7,
    Ors = 8,
    Rlength = 9,
    Rs = 10,
    Rstart = 11,
    Subsep = 12,
}

/// Number of special variables
pub const NUM_SPECIALS: usize = 13;

impl SpecialVar {
    pub const ALL: [SpecialVar; NUM_SPECIALS] = [
        SpecialVar::Convfmt,
        SpecialVar::Filename,
        SpecialVar::Fnr,
        SpecialVar::Fs,
        SpecialVar::Nf,
        SpecialVar::Nr,
        SpecialVar::Ofmt,
        SpecialVar::Ofs,
        SpecialVar::Ors,
        SpecialVar::Rlength,
        SpecialVar::Rs,
        SpecialVar::Rstart,
        SpecialVar::Subsep,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|var| var.name() == name)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            SpecialVar::Convfmt => "CONVFMT",
            SpecialVar::Filename => "FILENAME",
            SpecialVar::Fnr => "FNR",
            SpecialVar::Fs => "FS",
            SpecialVar::Nf => "NF",
            SpecialVar::Nr => "NR",
            SpecialVar::Ofmt => "OFMT",
            SpecialVar::Ofs => "OFS",
            SpecialVar::Ors => "ORS",
            SpecialVar::Rlength => "RLENGTH",
            SpecialVar::Rs => "RS",
            SpecialVar::Rstart => "RSTART",
            SpecialVar::Subsep => "SUBSEP",
        }
    }
}

impl fmt::Display for SpecialVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for var in SpecialVar::ALL {
            assert_eq!(SpecialVar::from_index(var.index()), Some(var));
            assert_eq!(SpecialVar::from_name(var.name()), Some(var));
        }
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(SpecialVar::from_index(NUM_SPECIALS as u32), None);
        assert_eq!(SpecialVar::from_name("ARGV"), None);
    }
}
