//! TLS 1.2 PRF (RFC 5246 section 5) over HMAC-SHA256/384.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;
use crate::message::HashAlgorithm;

/// PRF(secret, label, seed) truncated to `output_len`.
pub(super) fn prf_tls12(
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Buf, String> {
    let mut full_seed = Buf::new();
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    let mut out = Buf::new();
    match hash {
        HashAlgorithm::SHA256 => p_hash::<Hmac<Sha256>>(secret, &full_seed, &mut out, output_len)?,
        HashAlgorithm::SHA384 => p_hash::<Hmac<Sha384>>(secret, &full_seed, &mut out, output_len)?,
        _ => return Err(format!("Unsupported PRF hash algorithm: {:?}", hash)),
    }
    Ok(out)
}

/// Hash of the handshake transcript, as fed to the Finished PRF.
pub(super) fn transcript_hash(hash: HashAlgorithm, transcript: &[u8]) -> Result<Buf, String> {
    let mut out = Buf::new();
    match hash {
        HashAlgorithm::SHA256 => out.extend_from_slice(&Sha256::digest(transcript)),
        HashAlgorithm::SHA384 => out.extend_from_slice(&Sha384::digest(transcript)),
        _ => return Err(format!("Unsupported transcript hash: {:?}", hash)),
    }
    Ok(out)
}

fn p_hash<M>(secret: &[u8], full_seed: &[u8], out: &mut Buf, output_len: usize) -> Result<(), String>
where
    M: Mac + KeyInit + Clone,
{
    out.clear();

    let keyed =
        <M as KeyInit>::new_from_slice(secret).map_err(|_| "Invalid HMAC key length".to_string())?;

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a_hmac = keyed.clone();
    a_hmac.update(full_seed);
    let mut a = a_hmac.finalize().into_bytes();

    while out.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        let mut ctx = keyed.clone();
        ctx.update(&a);
        ctx.update(full_seed);
        let output = ctx.finalize().into_bytes();

        let remaining = output_len - out.len();
        let to_copy = remaining.min(output.len());
        out.extend_from_slice(&output[..to_copy]);

        if out.len() < output_len {
            // A(i+1) = HMAC_hash(secret, A(i))
            let mut next_a = keyed.clone();
            next_a.update(&a);
            a = next_a.finalize().into_bytes();
        }
    }

    Ok(())
}
