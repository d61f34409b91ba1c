use crate::error::Error;
use crate::Generator;
use burrow_core::shortcode::{self, ShortCode};
use rand::Rng;
use typed_builder::TypedBuilder;

/// Upper and lower case ASCII letters.
pub const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Letters followed by the ten ASCII digits.
pub const ALPHANUMERIC: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_LENGTH: usize = 7;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Characters per code, within the bounds a [`ShortCode`] accepts.
    #[builder(default = DEFAULT_LENGTH)]
    pub length: usize,
    #[builder(default = LETTERS)]
    pub alphabet: &'static [u8],
}

impl Default for RandomGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws fixed-length codes uniformly from an alphabet.
///
/// With the default 52-letter alphabet and 7 characters there are about
/// 10^12 codes, so a handful of re-rolls is plenty at realistic record counts.
/// The thread-local RNG is not cryptographically secure; codes are not secrets.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
    alphabet: &'static [u8],
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            alphabet: LETTERS,
        }
    }

    /// Builds a generator, rejecting settings that could only draw invalid codes.
    pub fn with_settings(settings: RandomGeneratorSettings) -> Result<Self, Error> {
        if !(shortcode::MIN_LENGTH..=shortcode::MAX_LENGTH).contains(&settings.length) {
            return Err(Error::InvalidLength {
                length: settings.length,
                min: shortcode::MIN_LENGTH,
                max: shortcode::MAX_LENGTH,
            });
        }
        if settings.alphabet.is_empty() {
            return Err(Error::EmptyAlphabet);
        }
        if let Some(&byte) = settings
            .alphabet
            .iter()
            .find(|&&b| !shortcode::is_code_char(b as char))
        {
            return Err(Error::InvalidSymbol { byte });
        }

        Ok(Self {
            length: settings.length,
            alphabet: settings.alphabet,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let mut rng = rand::thread_rng();
        let code: String = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}
