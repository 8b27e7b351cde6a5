// DNA alphabet operations: complementation, normalization, and IUPAC
// ambiguity handling for PAM patterns.
//
// Sequences are handled as uppercase ASCII bytes. The full IUPAC nucleotide
// alphabet is accepted on input; searches only ever operate on the four
// concrete bases, so ambiguity codes in the genome never match anything.

use crate::error::{Error, Result};

#[path = "alphabet_test.rs"]
mod alphabet_test;

/// Complement of a single IUPAC base.
pub fn complement(base: u8) -> Result<u8> {
    let c = match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'N' => b'N',
        b'R' => b'Y',
        b'Y' => b'R',
        b'S' => b'S',
        b'W' => b'W',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        _ => {
            return Err(Error::Input(format!(
                "illegal character {:?} in DNA sequence",
                base as char
            )))
        }
    };
    Ok(c)
}

/// Reverse complement of an IUPAC sequence.
pub fn reverse_complement(seq: &[u8]) -> Result<Vec<u8>> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Trims ASCII whitespace, uppercases, and validates against the IUPAC
/// alphabet.
pub fn normalize(seq: &str) -> Result<String> {
    let trimmed = seq.trim();
    let mut out = String::with_capacity(trimmed.len());
    for b in trimmed.bytes() {
        let upper = b.to_ascii_uppercase();
        // complement() doubles as the IUPAC membership check
        complement(upper)?;
        out.push(upper as char);
    }
    Ok(out)
}

/// The concrete bases an IUPAC code stands for.
pub fn expand_iupac(code: u8) -> &'static [u8] {
    match code {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'S' => b"CG",
        b'W' => b"AT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        b'N' => b"ACGT",
        _ => b"",
    }
}

/// Whether a concrete genome base satisfies one IUPAC pattern position.
/// Ambiguous genome bases satisfy nothing.
pub fn matches_code(genome_base: u8, pattern_code: u8) -> bool {
    matches!(genome_base, b'A' | b'C' | b'G' | b'T')
        && expand_iupac(pattern_code).contains(&genome_base)
}

/// Whether a genome window satisfies an IUPAC pattern of the same length.
pub fn matches_pattern(window: &[u8], pattern: &[u8]) -> bool {
    window.len() == pattern.len()
        && window
            .iter()
            .zip(pattern.iter())
            .all(|(&g, &p)| matches_code(g, p))
}

/// Expands a list of IUPAC PAM patterns into the deduplicated set of
/// concrete A/C/G/T strings they denote. All patterns must share one length.
pub fn expand_pams(pams: &[String]) -> Result<Vec<Vec<u8>>> {
    let mut expanded = std::collections::BTreeSet::new();
    let mut pam_len: Option<usize> = None;

    for pam in pams {
        let pam = normalize(pam)?;
        if pam.is_empty() {
            return Err(Error::Input("empty PAM pattern".into()));
        }
        match pam_len {
            None => pam_len = Some(pam.len()),
            Some(len) if len != pam.len() => {
                return Err(Error::Input(format!(
                    "PAM patterns must share one length, got {} and {}",
                    len,
                    pam.len()
                )))
            }
            Some(_) => {}
        }

        let mut partial: Vec<Vec<u8>> = vec![Vec::new()];
        for code in pam.bytes() {
            let choices = expand_iupac(code);
            if choices.is_empty() {
                return Err(Error::Input(format!(
                    "illegal character {:?} in PAM pattern {}",
                    code as char, pam
                )));
            }
            let mut next = Vec::with_capacity(partial.len() * choices.len());
            for prefix in &partial {
                for &c in choices {
                    let mut p = prefix.clone();
                    p.push(c);
                    next.push(p);
                }
            }
            partial = next;
        }
        expanded.extend(partial);
    }

    Ok(expanded.into_iter().collect())
}
