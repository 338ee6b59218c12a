//! X25519 key exchange using x25519-dalek.

use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::message::NamedGroup;
use crate::rng::SeededRng;

struct X25519KeyExchange {
    secret: EphemeralSecret,
    public_key: [u8; 32],
}

impl std::fmt::Debug for X25519KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519KeyExchange").finish_non_exhaustive()
    }
}

impl ActiveKeyExchange for X25519KeyExchange {
    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Buf, String> {
        let peer: [u8; 32] = peer_pub
            .try_into()
            .map_err(|_| format!("Invalid X25519 public key length: {}", peer_pub.len()))?;

        let shared = self.secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err("X25519 shared secret is all zeros".to_string());
        }

        Ok(Buf::from_slice(shared.as_bytes()))
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

#[derive(Debug)]
struct X25519;

impl SupportedKxGroup for X25519 {
    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }

    fn start(&self, rng: &mut SeededRng) -> Result<Box<dyn ActiveKeyExchange>, String> {
        let secret = EphemeralSecret::random_from_rng(rng);
        let public_key = PublicKey::from(&secret).to_bytes();
        Ok(Box::new(X25519KeyExchange { secret, public_key }))
    }
}

static KX_GROUP_X25519: X25519 = X25519;

/// All supported key exchange groups.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[&KX_GROUP_X25519];
