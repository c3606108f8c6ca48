use std::fmt;
use std::str::FromStr;

use crate::sequencer::errors::SequencerError;

/// One of the four sample banks. Every pad exists once per bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BankId {
    #[default]
    A,
    B,
    C,
    D,
}

impl BankId {
    /// All banks in index order.
    pub const ALL: [BankId; 4] = [BankId::A, BankId::B, BankId::C, BankId::D];

    /// Number of banks.
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        match self {
            BankId::A => 0,
            BankId::B => 1,
            BankId::C => 2,
            BankId::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn letter(self) -> char {
        match self {
            BankId::A => 'A',
            BankId::B => 'B',
            BankId::C => 'C',
            BankId::D => 'D',
        }
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for BankId {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(BankId::A),
            "B" | "b" => Ok(BankId::B),
            "C" | "c" => Ok(BankId::C),
            "D" | "d" => Ok(BankId::D),
            other => Err(SequencerError::UnknownBank(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for bank in BankId::ALL {
            assert_eq!(BankId::from_index(bank.index()), Some(bank));
        }
        assert_eq!(BankId::from_index(BankId::COUNT), None);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("c".parse::<BankId>(), Ok(BankId::C));
        assert_eq!(" D ".parse::<BankId>(), Ok(BankId::D));
        assert_eq!(BankId::B.to_string(), "B");
    }

    #[test]
    fn test_parse_unknown_bank() {
        assert!(matches!(
            "E".parse::<BankId>(),
            Err(SequencerError::UnknownBank(name)) if name == "E"
        ));
    }
}
