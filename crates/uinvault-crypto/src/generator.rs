use std::collections::HashMap;

use uinvault_domain::EntropyProvenance;
use uinvault_entropy::{EntropyRegistry, MAX_REQUEST_LEN};

use crate::charset::Charset;
use crate::checksum::{append_checksum, ChecksumAlgorithm};
use crate::error::CryptoError;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub charset: Charset,
    pub length: usize,
    pub exclude_ambiguous: bool,
    pub checksum: Option<ChecksumAlgorithm>,
}

#[derive(Debug, Clone)]
pub struct GeneratedUin {
    pub value: String,
    pub base: String,
    pub checksum: Option<String>,
    pub provenance: EntropyProvenance,
}

#[derive(Debug, Clone)]
pub struct StructuredConfig {
    pub template: String,
    pub literals: HashMap<char, String>,
    pub randoms: HashMap<char, (usize, Charset)>,
    pub exclude_ambiguous: bool,
}

/// Draw `count` indices into an alphabet of size `alphabet_len` using
/// rejection sampling over entropy bytes so no index is more likely than
/// any other (plain `byte % len` is biased whenever `len` does not evenly
/// divide 256).
async fn draw_indices(
    entropy: &EntropyRegistry,
    alphabet_len: usize,
    count: usize,
) -> Result<(Vec<usize>, EntropyProvenance), CryptoError> {
    if alphabet_len == 0 {
        return Err(CryptoError::InvalidCharset("empty alphabet".into()));
    }
    let threshold = 256usize - (256usize % alphabet_len);
    let mut indices = Vec::with_capacity(count);
    let mut provenance = None;

    while indices.len() < count {
        let need = ((count - indices.len()) * 2 + 8).min(MAX_REQUEST_LEN);
        let (bytes, prov) = entropy.random_bytes(need).await?;
        provenance = Some(prov);
        for b in bytes {
            if (b as usize) < threshold {
                indices.push((b as usize) % alphabet_len);
                if indices.len() == count {
                    break;
                }
            }
        }
    }

    Ok((indices, provenance.expect("at least one draw occurred")))
}

/// Mode `foundational` and mode `random` share this implementation; the
/// distinction between the two is the caller's choice of defaults and the
/// `high_entropy`/`no_pii` flags attached at a higher layer.
pub async fn generate_uniform(
    cfg: &GeneratorConfig,
    entropy: &EntropyRegistry,
) -> Result<GeneratedUin, CryptoError> {
    if cfg.length == 0 {
        return Err(CryptoError::EmptyInput);
    }
    let alphabet = cfg.charset.alphabet(cfg.exclude_ambiguous)?;
    let (indices, provenance) = draw_indices(entropy, alphabet.len(), cfg.length).await?;
    let base: String = indices.into_iter().map(|i| alphabet[i]).collect();

    let (value, checksum) = match cfg.checksum {
        Some(algo) => {
            let r = append_checksum(&base, algo)?;
            (r.value, Some(r.checksum))
        }
        None => (base.clone(), None),
    };

    Ok(GeneratedUin { value, base, checksum, provenance })
}

fn group_runs(template: &str) -> Vec<(char, usize)> {
    let mut runs = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        let mut len = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            len += 1;
        }
        runs.push((c, len));
    }
    runs
}

/// Mode `structured`. Expands a template like `RR-YYYY-FFF-NNNNN` by
/// replacing each run of an identical placeholder character with either a
/// caller-supplied literal or a freshly drawn random segment. A run of a
/// non-alphabetic character (dashes, dots, ...) is always copied as-is.
pub async fn generate_structured(
    cfg: &StructuredConfig,
    entropy: &EntropyRegistry,
) -> Result<(String, Option<EntropyProvenance>), CryptoError> {
    if cfg.template.is_empty() {
        return Err(CryptoError::EmptyInput);
    }

    let mut out = String::with_capacity(cfg.template.len());
    let mut provenance = None;

    for (ch, run_len) in group_runs(&cfg.template) {
        if !ch.is_ascii_alphabetic() {
            out.extend(std::iter::repeat(ch).take(run_len));
            continue;
        }

        if let Some(literal) = cfg.literals.get(&ch) {
            if literal.chars().count() != run_len {
                return Err(CryptoError::TemplateMismatch(format!(
                    "literal for placeholder '{ch}' has length {} but template run is {run_len}",
                    literal.chars().count()
                )));
            }
            out.push_str(literal);
            continue;
        }

        if let Some((configured_len, charset)) = cfg.randoms.get(&ch) {
            if *configured_len != run_len {
                return Err(CryptoError::TemplateMismatch(format!(
                    "random segment for placeholder '{ch}' configured length {configured_len} does not match template run {run_len}"
                )));
            }
            let alphabet = charset.alphabet(cfg.exclude_ambiguous)?;
            let (indices, prov) = draw_indices(entropy, alphabet.len(), run_len).await?;
            provenance = Some(prov);
            out.extend(indices.into_iter().map(|i| alphabet[i]));
            continue;
        }

        return Err(CryptoError::TemplateMismatch(format!(
            "placeholder '{ch}' is neither literal-supplied nor random-configured"
        )));
    }

    Ok((out, provenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify_checksum;

    fn entropy() -> EntropyRegistry {
        // No hardware candidates registered: every call falls straight
        // through to the terminal software provider.
        EntropyRegistry::new(vec![])
    }

    #[tokio::test]
    async fn foundational_every_character_in_alphabet() {
        let reg = entropy();
        let cfg = GeneratorConfig {
            charset: Charset::Safe,
            length: 19,
            exclude_ambiguous: true,
            checksum: None,
        };
        let g = generate_uniform(&cfg, &reg).await.unwrap();
        let alphabet = cfg.charset.alphabet(true).unwrap();
        assert_eq!(g.value.chars().count(), 19);
        assert!(g.value.chars().all(|c| alphabet.contains(&c)));
    }

    #[tokio::test]
    async fn foundational_with_checksum_appends_one_char() {
        let reg = entropy();
        let cfg = GeneratorConfig {
            charset: Charset::Safe,
            length: 19,
            exclude_ambiguous: true,
            checksum: Some(ChecksumAlgorithm::Iso7064),
        };
        let g = generate_uniform(&cfg, &reg).await.unwrap();
        assert_eq!(g.value.chars().count(), 20);
        assert!(verify_checksum(&g.value, ChecksumAlgorithm::Iso7064).unwrap());
    }

    #[tokio::test]
    async fn structured_template_expands_literals_and_randoms() {
        let reg = entropy();
        let mut literals = HashMap::new();
        literals.insert('Y', "2025".to_string());
        let mut randoms = HashMap::new();
        randoms.insert('N', (5usize, Charset::Numeric));
        randoms.insert('F', (3usize, Charset::Numeric));
        let cfg = StructuredConfig {
            template: "YYYY-FFF-NNNNN".to_string(),
            literals,
            randoms,
            exclude_ambiguous: false,
        };
        let (value, _) = generate_structured(&cfg, &reg).await.unwrap();
        assert!(value.starts_with("2025-"));
        let parts: Vec<&str> = value.split('-').collect();
        assert_eq!(parts[1].len(), 3);
        assert_eq!(parts[2].len(), 5);
    }

    #[tokio::test]
    async fn structured_template_fails_on_unmapped_placeholder() {
        let reg = entropy();
        let cfg = StructuredConfig {
            template: "RR-NNNNN".to_string(),
            literals: HashMap::new(),
            randoms: HashMap::from([('N', (5, Charset::Numeric))]),
            exclude_ambiguous: false,
        };
        let err = generate_structured(&cfg, &reg).await.unwrap_err();
        assert!(matches!(err, CryptoError::TemplateMismatch(_)));
    }
}
