use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::info;

use crate::notify::TokenNotifier;

/// Opaque 64-bit possession token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Token(u64);

impl Token {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Every value `s` may denote. A 16-digit string of decimal digits is both
    /// the canonical hex rendering and a valid base-10 number, so it yields two.
    pub fn readings(s: &str) -> Result<Vec<Token>, ParseTokenError> {
        let canonical = s.parse::<Token>()?;
        let trimmed = s.trim();
        let mut readings = vec![canonical];
        if trimmed.len() == 16 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(decimal) = trimmed.parse::<u64>() {
                readings.push(Token(decimal));
            }
        }
        Ok(readings)
    }

    /// Fixed-width lowercase hex, as embedded in the token URI.
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTokenError(String);

impl fmt::Display for ParseTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid token \"{}\"", self.0)
    }
}

impl std::error::Error for ParseTokenError {}

impl FromStr for Token {
    type Err = ParseTokenError;

    /// Accepts `0x`-prefixed hex, the 16-digit canonical hex rendering, or base-10.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseTokenError(s.to_string());

        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u64::from_str_radix(hex, 16).map(Token).map_err(|_| err());
        }

        if trimmed.len() == 16 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return u64::from_str_radix(trimmed, 16).map(Token).map_err(|_| err());
        }

        trimmed.parse::<u64>().map(Token).map_err(|_| err())
    }
}

/// Current/previous token pair with a single-use grace slot.
///
/// Every rotation shifts `current` into `previous`. Whether `previous` is
/// still honoured is decided by the caller: timed rotations grant grace,
/// rotations caused by a door action revoke it.
pub struct TokenStore {
    current: Token,
    previous: Token,
    previous_valid: bool,
    web_prefix: String,
    rng: Box<dyn RngCore + Send>,
    notifier: Arc<dyn TokenNotifier>,
}

impl TokenStore {
    /// Create a store and perform the initial rotation without grace.
    pub fn new(
        web_prefix: impl Into<String>,
        rng: Box<dyn RngCore + Send>,
        notifier: Arc<dyn TokenNotifier>,
    ) -> Self {
        let mut store = Self {
            current: Token::default(),
            previous: Token::default(),
            previous_valid: false,
            web_prefix: web_prefix.into(),
            rng,
            notifier,
        };
        store.rotate(false);
        store
    }

    /// Store backed by an OS-seeded CSPRNG.
    pub fn from_entropy(web_prefix: impl Into<String>, notifier: Arc<dyn TokenNotifier>) -> Self {
        Self::new(web_prefix, Box::new(StdRng::from_entropy()), notifier)
    }

    pub fn rotate(&mut self, grant_grace: bool) {
        self.previous = self.current;
        self.previous_valid = grant_grace;

        let high = u64::from(self.rng.next_u32());
        let low = u64::from(self.rng.next_u32());
        self.current = Token((high << 32) | low);

        self.notifier.notify(&self.uri());

        info!(
            new_token = %self.current,
            old_token = %self.previous,
            old_still_valid = self.previous_valid,
            "new token generated"
        );
    }

    pub fn check(&self, candidate: Token) -> bool {
        candidate == self.current || (self.previous_valid && candidate == self.previous)
    }

    pub fn current(&self) -> Token {
        self.current
    }

    pub fn previous_valid(&self) -> bool {
        self.previous_valid
    }

    /// Canonical URI for the current token.
    pub fn uri(&self) -> String {
        format!("{}{}", self.web_prefix, self.current.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use std::sync::Mutex;

    fn store(seed: u64) -> TokenStore {
        TokenStore::new(
            "https://door.example/t/",
            Box::new(StdRng::seed_from_u64(seed)),
            Arc::new(NoopNotifier),
        )
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl TokenNotifier for Recorder {
        fn notify(&self, uri: &str) {
            self.0.lock().unwrap().push(uri.to_string());
        }
    }

    #[test]
    fn test_initial_state_has_no_grace() {
        let store = store(1);
        assert!(!store.previous_valid());
        assert!(store.check(store.current()));
        assert!(!store.check(Token::default()));
    }

    #[test]
    fn test_rotate_without_grace_rejects_old_token() {
        let mut store = store(2);
        let old = store.current();
        store.rotate(false);
        assert!(!store.check(old));
        assert!(store.check(store.current()));
    }

    #[test]
    fn test_rotate_with_grace_accepts_both() {
        let mut store = store(3);
        let old = store.current();
        store.rotate(true);
        assert!(store.check(old));
        assert!(store.check(store.current()));

        store.rotate(false);
        assert!(!store.check(old));
    }

    #[test]
    fn test_grace_is_single_use() {
        for first in [false, true] {
            for second in [false, true] {
                let mut store = store(4);
                let oldest = store.current();
                store.rotate(first);
                store.rotate(second);
                assert!(!store.check(oldest), "policy ({first}, {second})");
            }
        }
    }

    #[test]
    fn test_token_built_from_two_draws() {
        let mut reference = StdRng::seed_from_u64(5);
        let high = u64::from(reference.next_u32());
        let low = u64::from(reference.next_u32());

        let store = store(5);
        assert_eq!(store.current().value(), (high << 32) | low);
    }

    #[test]
    fn test_rotation_notifies_uri() {
        let recorder = Arc::new(Recorder::default());
        let mut store = TokenStore::new(
            "https://door.example/t/",
            Box::new(StdRng::seed_from_u64(6)),
            recorder.clone(),
        );
        store.rotate(true);

        let uris = recorder.0.lock().unwrap().clone();
        assert_eq!(uris.len(), 2);
        assert_eq!(uris[1], format!("https://door.example/t/{}", store.current().to_hex()));
        assert_eq!(uris[1].len(), "https://door.example/t/".len() + 16);
    }

    #[test]
    fn test_parse_token_forms() {
        assert_eq!("42".parse::<Token>().unwrap(), Token::new(42));
        assert_eq!("0x2a".parse::<Token>().unwrap(), Token::new(42));
        assert_eq!("0X2A".parse::<Token>().unwrap(), Token::new(42));
        assert_eq!(
            "000000000000002a".parse::<Token>().unwrap(),
            Token::new(42)
        );
        assert_eq!(" 7 ".parse::<Token>().unwrap(), Token::new(7));
    }

    #[test]
    fn test_parse_token_rejects_garbage() {
        for bad in ["", "abc", "0x", "-1", "0xzz", "18446744073709551616", "1.5"] {
            assert!(bad.parse::<Token>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_sixteen_decimal_digits_have_two_readings() {
        let readings = Token::readings("1234567890123456").unwrap();
        assert_eq!(
            readings,
            vec![Token::new(0x1234567890123456), Token::new(1234567890123456)]
        );
        assert_eq!(Token::readings("00000000000000ff").unwrap(), vec![Token::new(255)]);
        assert_eq!(Token::readings("42").unwrap(), vec![Token::new(42)]);
        assert!(Token::readings("nope").is_err());
    }

    #[test]
    fn test_hex_round_trips_through_parse() {
        let store = store(7);
        let hex = store.current().to_hex();
        assert_eq!(hex.parse::<Token>().unwrap(), store.current());
    }
}
