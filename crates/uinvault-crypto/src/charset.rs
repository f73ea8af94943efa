use crate::error::CryptoError;

/// Characters excluded from an alphabet when `exclude_ambiguous` is set:
/// visually confusable at small font sizes.
const AMBIGUOUS: [char; 5] = ['0', 'O', 'I', '1', 'l'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Charset {
    Numeric,
    Alphanumeric,
    Hex,
    Safe,
    Explicit(String),
}

impl Charset {
    pub fn parse(name: &str) -> Result<Charset, CryptoError> {
        match name {
            "numeric" => Ok(Charset::Numeric),
            "alphanumeric" => Ok(Charset::Alphanumeric),
            "hex" => Ok(Charset::Hex),
            "safe" => Ok(Charset::Safe),
            other => {
                if other.is_empty() {
                    Err(CryptoError::InvalidCharset("empty explicit alphabet".into()))
                } else {
                    Ok(Charset::Explicit(other.to_string()))
                }
            }
        }
    }

    fn base_chars(&self) -> Vec<char> {
        match self {
            Charset::Numeric => "0123456789".chars().collect(),
            Charset::Alphanumeric => "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".chars().collect(),
            Charset::Hex => "0123456789ABCDEF".chars().collect(),
            Charset::Safe => "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
                .chars()
                .filter(|c| !AMBIGUOUS.contains(c))
                .collect(),
            Charset::Explicit(s) => s.chars().collect(),
        }
    }

    /// Resolve the concrete alphabet, applying ambiguity exclusion if
    /// requested. `safe` already excludes ambiguous characters by
    /// definition, so the flag is a no-op on it.
    pub fn alphabet(&self, exclude_ambiguous: bool) -> Result<Vec<char>, CryptoError> {
        let chars: Vec<char> = if exclude_ambiguous {
            self.base_chars().into_iter().filter(|c| !AMBIGUOUS.contains(c)).collect()
        } else {
            self.base_chars()
        };
        if chars.is_empty() {
            return Err(CryptoError::InvalidCharset(
                "alphabet is empty after exclusions".into(),
            ));
        }
        Ok(chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_excludes_ambiguous_by_construction() {
        let alphabet = Charset::Safe.alphabet(false).unwrap();
        for c in AMBIGUOUS {
            assert!(!alphabet.contains(&c));
        }
    }

    #[test]
    fn alphanumeric_with_exclude_ambiguous_matches_safe() {
        let a = Charset::Alphanumeric.alphabet(true).unwrap();
        let b = Charset::Safe.alphabet(false).unwrap();
        let mut a_sorted = a.clone();
        let mut b_sorted = b.clone();
        a_sorted.sort();
        b_sorted.sort();
        assert_eq!(a_sorted, b_sorted);
    }

    #[test]
    fn explicit_alphabet_round_trips() {
        let cs = Charset::parse("ABCXYZ").unwrap();
        assert_eq!(cs.alphabet(false).unwrap(), vec!['A', 'B', 'C', 'X', 'Y', 'Z']);
    }
}
