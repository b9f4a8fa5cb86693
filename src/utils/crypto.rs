// ============================================================================
// CHIFFREMENT SIRÈNE
// ============================================================================
//
// Description:
//   Chiffrement symétrique léger partagé avec le firmware des sirènes
//   (microcontrôleurs 8/32 bits). Utilisé pour les tokens d'abonnement et
//   pour les programmations envoyées au boîtier.
//
// Format de sortie:
//   base64url(XOR + rotation des octets) || checksum (16 caractères hex)
//
//   Le checksum est un HMAC-SHA256 tronqué calculé sur le texte clair : le
//   boîtier rejette un token corrompu sans avoir à interpréter son contenu.
//
// Points d'attention:
//   - Déterministe : même clé + même texte clair => même sortie.
//     Les programmations embarquent un nonce pour varier d'une génération
//     à l'autre.
//   - La clé (32 octets) est dérivée une seule fois au démarrage via PBKDF2.
//
// ============================================================================

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const KEY_LENGTH: usize = 32;
const KEY_SALT: &[u8] = b"sirene-cipher-v1";
const KEY_ITERATIONS: u32 = 10_000;

/// Longueur fixe du checksum ajouté en fin de chaîne
pub const CHECKSUM_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encrypted string is malformed")]
    Malformed,
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid key length")]
    InvalidKey,
}

#[derive(Clone)]
pub struct SireneCipher {
    key: [u8; KEY_LENGTH],
}

// La clé ne doit jamais apparaître dans les logs
impl std::fmt::Debug for SireneCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SireneCipher").finish_non_exhaustive()
    }
}

impl SireneCipher {
    pub fn new(secret: &str) -> Self {
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), KEY_SALT, KEY_ITERATIONS, &mut key);
        Self { key }
    }

    /// Chiffre un texte clair et y ajoute son checksum
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let checksum = self.checksum(plaintext)?;
        let scrambled: Vec<u8> = plaintext
            .bytes()
            .enumerate()
            .map(|(i, b)| self.scramble(i, b))
            .collect();

        Ok(format!("{}{}", URL_SAFE_NO_PAD.encode(scrambled), checksum))
    }

    /// Opération inverse, celle exécutée par le firmware
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        if encrypted.len() <= CHECKSUM_LENGTH || !encrypted.is_ascii() {
            return Err(CryptoError::Malformed);
        }

        let (body, checksum) = encrypted.split_at(encrypted.len() - CHECKSUM_LENGTH);
        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CryptoError::Malformed)?;

        let plain: Vec<u8> = bytes
            .into_iter()
            .enumerate()
            .map(|(i, c)| self.unscramble(i, c))
            .collect();
        let plaintext = String::from_utf8(plain).map_err(|_| CryptoError::ChecksumMismatch)?;

        if self.checksum(&plaintext)? != checksum {
            return Err(CryptoError::ChecksumMismatch);
        }

        Ok(plaintext)
    }

    /// HMAC-SHA256 tronqué à 16 caractères hexadécimaux
    pub fn checksum(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidKey)?;
        mac.update(plaintext.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        Ok(digest[..CHECKSUM_LENGTH].to_string())
    }

    fn key_byte(&self, i: usize) -> (u8, u32) {
        let k = self.key[i % KEY_LENGTH] ^ ((i / KEY_LENGTH) as u8);
        let rotation = u32::from(self.key[(i + 1) % KEY_LENGTH] % 8);
        (k, rotation)
    }

    fn scramble(&self, i: usize, b: u8) -> u8 {
        let (k, rotation) = self.key_byte(i);
        (b ^ k).rotate_left(rotation)
    }

    fn unscramble(&self, i: usize, c: u8) -> u8 {
        let (k, rotation) = self.key_byte(i);
        c.rotate_right(rotation) ^ k
    }
}

/// SHA-256 hexadécimal, utilisé pour retrouver un token sans le déchiffrer
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Vérifie une signature HMAC-SHA256 hexadécimale (webhook de paiement)
pub fn verify_hmac_hex(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
