//! Room code generation
//!
//! Codes are 6 uppercase alphanumeric characters, drawn uniformly. The room
//! registry retries on collision; this module only produces candidates.

use rand::Rng;

/// Length of every room code.
pub const CODE_LEN: usize = 6;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a fresh candidate code.
pub fn generate(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Uppercase and trim client-supplied codes before lookup.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// True if the string could have been produced by [`generate`].
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_well_formed() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate(&mut rng);
            assert!(is_well_formed(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn test_normalize_uppercases() {
        assert_eq!(normalize("  abc123 "), "ABC123");
    }

    #[test]
    fn test_well_formed_rejects_odd_input() {
        assert!(!is_well_formed("abc123"));
        assert!(!is_well_formed("ABC12"));
        assert!(!is_well_formed("ABC12!"));
        assert!(is_well_formed("ABC123"));
    }
}
