use crate::error::CryptoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    ModN(u32),
    Iso7064,
    Iso7064Mod97,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumResult {
    pub value: String,
    pub checksum: String,
}

impl ChecksumAlgorithm {
    pub fn checksum_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::ModN(_) | ChecksumAlgorithm::Iso7064 => 1,
            ChecksumAlgorithm::Iso7064Mod97 => 2,
        }
    }
}

fn char_to_value(c: char) -> Option<u32> {
    if c.is_ascii_digit() {
        Some(c as u32 - '0' as u32)
    } else if c.is_ascii_alphabetic() {
        Some((c.to_ascii_uppercase() as u32 - 'A' as u32) + 10)
    } else {
        None
    }
}

fn value_to_char(v: u32) -> char {
    if v < 10 {
        (b'0' + v as u8) as char
    } else {
        (b'A' + (v - 10) as u8) as char
    }
}

fn checksum_mod_n(base: &str, modulus: u32) -> Result<char, CryptoError> {
    if !(2..=36).contains(&modulus) {
        return Err(CryptoError::InvalidModulus(modulus));
    }
    let sum: u32 = base.chars().filter_map(char_to_value).sum();
    Ok(value_to_char(sum % modulus))
}

fn iso7064_check_char(v: u32) -> char {
    // MOD 37-2 reserves the value 36 for the letter 'X', since value_to_char's
    // 0-35 alphabet has no character left to assign it.
    if v == 36 {
        'X'
    } else {
        value_to_char(v)
    }
}

fn checksum_iso7064(base: &str) -> Result<char, CryptoError> {
    let mut c: u32 = 36;
    for ch in base.chars() {
        let v = char_to_value(ch).ok_or(CryptoError::NonAlphanumericInput(ch))?;
        c = ((c + v) * 2) % 37;
    }
    c = (38 - c) % 37;
    Ok(iso7064_check_char(c))
}

fn checksum_iso7064_mod97(base: &str) -> Result<String, CryptoError> {
    let mut value: u64 = 0;
    for ch in base.chars() {
        let v = char_to_value(ch).ok_or(CryptoError::NonAlphanumericInput(ch))?;
        if v < 10 {
            value = (value * 10 + v as u64) % 97;
        } else {
            // Two-digit numeric expansion for letters (A=10..Z=35).
            value = (value * 10 + (v / 10) as u64) % 97;
            value = (value * 10 + (v % 10) as u64) % 97;
        }
    }
    let result = 98 - value;
    Ok(format!("{:02}", result))
}

pub fn append_checksum(base: &str, algorithm: ChecksumAlgorithm) -> Result<ChecksumResult, CryptoError> {
    if base.is_empty() {
        return Err(CryptoError::EmptyInput);
    }
    let checksum = match algorithm {
        ChecksumAlgorithm::ModN(m) => checksum_mod_n(base, m)?.to_string(),
        ChecksumAlgorithm::Iso7064 => checksum_iso7064(base)?.to_string(),
        ChecksumAlgorithm::Iso7064Mod97 => checksum_iso7064_mod97(base)?,
    };
    Ok(ChecksumResult { value: format!("{base}{checksum}"), checksum })
}

pub fn verify_checksum(value: &str, algorithm: ChecksumAlgorithm) -> Result<bool, CryptoError> {
    if value.is_empty() {
        return Err(CryptoError::EmptyInput);
    }
    let len = algorithm.checksum_len();
    if value.chars().count() <= len {
        return Err(CryptoError::ChecksumTooShort);
    }
    let chars: Vec<char> = value.chars().collect();
    let split = chars.len() - len;
    let base: String = chars[..split].iter().collect();
    let given: String = chars[split..].iter().collect();
    let recomputed = append_checksum(&base, algorithm)?;
    Ok(recomputed.checksum == given)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_n_round_trips() {
        let r = append_checksum("12345", ChecksumAlgorithm::ModN(10)).unwrap();
        assert!(verify_checksum(&r.value, ChecksumAlgorithm::ModN(10)).unwrap());
    }

    #[test]
    fn mod_n_rejects_invalid_modulus() {
        let err = append_checksum("12345", ChecksumAlgorithm::ModN(1)).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidModulus(1)));
    }

    #[test]
    fn iso7064_round_trips_and_is_deterministic() {
        let a = append_checksum("ABC123", ChecksumAlgorithm::Iso7064).unwrap();
        let b = append_checksum("ABC123", ChecksumAlgorithm::Iso7064).unwrap();
        assert_eq!(a, b);
        assert!(verify_checksum(&a.value, ChecksumAlgorithm::Iso7064).unwrap());
    }

    #[test]
    fn iso7064_check_digit_36_encodes_as_x() {
        let r = append_checksum("2", ChecksumAlgorithm::Iso7064).unwrap();
        assert_eq!(r.checksum, "X");
        assert!(verify_checksum(&r.value, ChecksumAlgorithm::Iso7064).unwrap());
    }

    #[test]
    fn iso7064_rejects_non_alphanumeric() {
        let err = append_checksum("ABC-123", ChecksumAlgorithm::Iso7064).unwrap_err();
        assert!(matches!(err, CryptoError::NonAlphanumericInput('-')));
    }

    #[test]
    fn iso7064mod97_round_trips_with_two_digit_output() {
        let r = append_checksum("ABC123", ChecksumAlgorithm::Iso7064Mod97).unwrap();
        assert_eq!(r.checksum.len(), 2);
        assert!(verify_checksum(&r.value, ChecksumAlgorithm::Iso7064Mod97).unwrap());
    }

    #[test]
    fn mutating_output_flips_verification() {
        let r = append_checksum("ABC123", ChecksumAlgorithm::Iso7064).unwrap();
        let mut chars: Vec<char> = r.value.chars().collect();
        let last = chars.len() - 1;
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.iter().collect();
        let _ = last;
        assert!(!verify_checksum(&mutated, ChecksumAlgorithm::Iso7064).unwrap());
    }

    #[test]
    fn checksum_on_empty_string_rejected() {
        assert!(matches!(append_checksum("", ChecksumAlgorithm::Iso7064), Err(CryptoError::EmptyInput)));
        assert!(matches!(verify_checksum("", ChecksumAlgorithm::Iso7064), Err(CryptoError::EmptyInput)));
    }
}
