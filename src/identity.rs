//! Anonymous visitor identities and display names.
//!
//! Nobody has an account here. A visitor is recognized by a salted hash of
//! their address, which is what posts, comments, likes and chat messages are
//! attributed to. The raw address is never stored.

use std::net::IpAddr;

use rand::{seq::SliceRandom, thread_rng, Rng};

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;

use crate::config::Config;
use crate::{Error, Result};

/// The address used when a request doesn't tell us where it came from.
pub const FALLBACK_ADDRESS: &str = "0.0.0.0";

/// Length of the raw hash, in bytes. The hex string is twice this long.
const HASH_LENGTH: u32 = 32;

const ADJECTIVES: &[&str] = &[
    "행복한", "용감한", "지혜로운", "따뜻한", "씩씩한", "성실한", "희망찬", "든든한",
    "차분한", "밝은", "꾸준한", "부지런한", "상냥한", "당당한", "새로운", "푸른",
];

const NOUNS: &[&str] = &[
    "고양이", "호랑이", "다람쥐", "거북이", "부엉이", "펭귄", "여우", "토끼",
    "돌고래", "참새", "곰", "사슴", "코끼리", "너구리", "햇살", "나무",
];

/// Hash a visitor's address with the server salt.
///
/// The result is a hex string that is the same for the same address and salt.
/// It's only used to tell visitors apart, never to recover the address.
pub fn hash_identity<S1, S2>(raw_address: S1, salt: S2) -> Result<String>
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    let conf = argon2::Config {
        hash_length: HASH_LENGTH,
        ..argon2::Config::default()
    };

    let hash = argon2::hash_raw(
        raw_address.as_ref().as_bytes(),
        salt.as_ref().as_bytes(),
        &conf,
    )?;

    Ok(hash.iter().map(|byte| format!("{:02x}", byte)).collect())
}

/// Figure out the address a request came from.
///
/// A proxy's `X-Forwarded-For` wins, then the address rocket sees. Anything
/// that doesn't parse as an IP address falls back to `FALLBACK_ADDRESS`.
pub fn client_address(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get_one("X-Forwarded-For")
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| request.client_ip())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
}

/// The address of the peer a request came in from, for throttling.
///
/// Forwarding headers are only believed when `trust_forwarded` is set, which
/// is for servers behind a proxy that overwrites them. Otherwise a client
/// could pick a new address for every request.
pub fn peer_address(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        return client_address(request);
    }

    request
        .remote()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
}

/// Generate a random display name like "행복한고양이42".
pub fn generate_display_name() -> String {
    generate_display_name_with(&mut thread_rng(), true)
}

/// Generate a display name with the given source of randomness, optionally
/// with a number from 1 to 999 on the end.
pub fn generate_display_name_with<R>(rng: &mut R, suffix: bool) -> String
where
    R: Rng,
{
    let adjective = ADJECTIVES.choose(rng).unwrap_or(&ADJECTIVES[0]);
    let noun = NOUNS.choose(rng).unwrap_or(&NOUNS[0]);

    if suffix {
        format!("{}{}{}", adjective, noun, rng.gen_range(1, 1000))
    } else {
        format!("{}{}", adjective, noun)
    }
}

/// Use the given nickname if there is one, or make one up.
pub fn nickname_or_generated(nickname: Option<String>) -> String {
    nickname
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(generate_display_name)
}

/// The anonymous visitor making a request.
#[derive(Debug, Clone)]
pub struct Visitor {
    /// The salted hash of the visitor's address.
    pub ip_hash: String,
}

/// Hash an address from a request with the configured salt.
fn hashed_from_request<F>(request: &Request, address: F) -> Outcome<String, Error>
where
    F: FnOnce(&Config) -> String,
{
    let config = match request.guard::<State<Config>>() {
        Outcome::Success(config) => config,
        _ => {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::StateNotManaged { name: "Config" },
            ))
        }
    };

    match hash_identity(address(&config), &config.identity_salt) {
        Ok(hash) => Outcome::Success(hash),
        Err(err) => Outcome::Failure((Status::InternalServerError, err)),
    }
}

impl<'a, 'r> FromRequest<'a, 'r> for Visitor {
    type Error = Error;

    fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
        hashed_from_request(request, |_| client_address(request)).map(|ip_hash| Visitor { ip_hash })
    }
}

/// Who is trying to log in, as far as login throttling is concerned.
///
/// Keyed on the hashed peer address, see `peer_address`.
#[derive(Debug, Clone)]
pub struct LoginClient {
    pub key: String,
}

impl<'a, 'r> FromRequest<'a, 'r> for LoginClient {
    type Error = Error;

    fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
        hashed_from_request(request, |config| {
            peer_address(request, config.trust_forwarded_for)
        })
        .map(|key| LoginClient { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SALT: &str = "test-salt-1234";

    #[test]
    fn hash_is_deterministic() -> Result<()> {
        let first = hash_identity("203.0.113.7", SALT)?;
        let second = hash_identity("203.0.113.7", SALT)?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn hash_is_fixed_length_hex() -> Result<()> {
        let hash = hash_identity("2001:db8::1", SALT)?;

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        Ok(())
    }

    #[test]
    fn different_addresses_hash_differently() -> Result<()> {
        assert_ne!(
            hash_identity("203.0.113.7", SALT)?,
            hash_identity("203.0.113.8", SALT)?
        );
        Ok(())
    }

    #[test]
    fn salt_changes_the_hash() -> Result<()> {
        assert_ne!(
            hash_identity("203.0.113.7", SALT)?,
            hash_identity("203.0.113.7", "another-salt")?
        );
        Ok(())
    }

    #[test]
    fn display_name_is_adjective_then_noun() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let name = generate_display_name_with(&mut rng, false);

            let adjective = ADJECTIVES
                .iter()
                .find(|adj| name.starts_with(*adj))
                .expect("name should start with an adjective");
            let rest = &name[adjective.len()..];

            assert!(NOUNS.contains(&rest), "unexpected noun in {}", name);
        }
    }

    #[test]
    fn display_name_suffix_is_in_range() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let name = generate_display_name_with(&mut rng, true);
            let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
            let number: u32 = digits.parse().expect("name should end with a number");

            assert!((1..1000).contains(&number));
        }
    }

    #[test]
    fn blank_nickname_is_replaced() {
        assert_eq!(nickname_or_generated(Some(" 달팽이 ".into())), "달팽이");
        assert!(!nickname_or_generated(Some("   ".into())).is_empty());
        assert!(!nickname_or_generated(None).is_empty());
    }
}
