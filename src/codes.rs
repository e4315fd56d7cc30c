//! Room-code generation.

use rand::Rng;

/// Samples short room codes from an ambiguity-free alphabet.
///
/// The generator itself is stateless; callers supply the process-wide RNG
/// (see `AppState::rng`) so all randomness in the service flows through one
/// guarded source.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl CodeGenerator {
    /// Builds a generator over `alphabet` producing codes of `length`.
    pub fn new(alphabet: &str, length: usize) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            length,
        }
    }

    /// Draws one code. Uniqueness is the caller's problem: collide against
    /// the registry, draw again.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";

    #[test]
    fn test_generates_requested_length() {
        let generator = CodeGenerator::new(ALPHABET, 6);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generator.generate(&mut rng).len(), 6);
    }

    #[test]
    fn test_codes_stay_inside_alphabet() {
        let generator = CodeGenerator::new(ALPHABET, 6);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let code = generator.generate(&mut rng);
            assert!(code.chars().all(|c| ALPHABET.contains(c)), "code {code}");
        }
    }

    #[test]
    fn test_ambiguous_glyphs_never_appear() {
        let generator = CodeGenerator::new(ALPHABET, 6);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let code = generator.generate(&mut rng);
            for banned in ['0', 'O', '1', 'I', 'L'] {
                assert!(!code.contains(banned), "code {code} contains {banned}");
            }
        }
    }
}
