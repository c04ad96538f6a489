// Faucet signing wallet
// Parses the configured private key (bech32 `suiprivkey`, hex, or base64),
// derives the faucet address, and signs transaction bytes with the Sui
// intent scheme: blake2b-256 over the intent prefix plus the raw
// transaction, signed with ed25519, serialized as flag, signature, pubkey.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

use super::ChainError;

type Blake2b256 = Blake2b<U32>;

/// Signature-scheme flag byte for ed25519 keys
const ED25519_FLAG: u8 = 0x00;
/// Intent prefix for TransactionData (scope, version, app id)
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];
const PRIVATE_KEY_HRP: &str = "suiprivkey";

/// Normalize a wallet address: optional `0x` prefix, exactly 64 hex digits,
/// case-insensitive input, lowercase output
pub fn validate_address(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// In-process signing wallet; the key material is immutable after parse
pub struct LocalWallet {
    signing_key: SigningKey,
    address: String,
}

impl LocalWallet {
    /// Accepts `suiprivkey1...`, 32-byte hex (with or without 0x), or
    /// base64 (raw seed or flag-prefixed)
    pub fn from_encoded(encoded: &str) -> Result<Self, ChainError> {
        let seed = decode_private_key(encoded.trim())?;
        let signing_key = SigningKey::from_bytes(&seed);
        let address = derive_address(&signing_key.verifying_key());
        Ok(LocalWallet { signing_key, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign raw BCS transaction bytes; returns the base64 serialized
    /// signature expected by `sui_executeTransactionBlock`
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let mut message = Vec::with_capacity(TRANSACTION_INTENT.len() + tx_bytes.len());
        message.extend_from_slice(&TRANSACTION_INTENT);
        message.extend_from_slice(tx_bytes);

        let mut hasher = Blake2b256::new();
        hasher.update(&message);
        let digest = hasher.finalize();

        let signature = self.signing_key.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.signing_key.verifying_key().to_bytes());
        BASE64.encode(serialized)
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Sui address: blake2b-256 over the flag byte plus public key, hex encoded
fn derive_address(verifying_key: &VerifyingKey) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(verifying_key.to_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn decode_private_key(encoded: &str) -> Result<[u8; 32], ChainError> {
    if encoded.starts_with(PRIVATE_KEY_HRP) {
        let (hrp, data) = bech32::decode(encoded)
            .map_err(|e| ChainError::InvalidKey(format!("bad bech32 key: {}", e)))?;
        if hrp.as_str() != PRIVATE_KEY_HRP {
            return Err(ChainError::InvalidKey(format!(
                "unexpected key prefix {:?}",
                hrp.as_str()
            )));
        }
        return seed_from_flagged(&data);
    }

    let hex_part = encoded.strip_prefix("0x").unwrap_or(encoded);
    if hex_part.len() == 64 || hex_part.len() == 66 {
        if let Ok(bytes) = hex::decode(hex_part) {
            return seed_from_raw_or_flagged(&bytes);
        }
    }

    if let Ok(bytes) = BASE64.decode(encoded) {
        return seed_from_raw_or_flagged(&bytes);
    }

    Err(ChainError::InvalidKey(
        "private key is not bech32, hex or base64".to_string(),
    ))
}

fn seed_from_flagged(data: &[u8]) -> Result<[u8; 32], ChainError> {
    if data.len() != 33 || data[0] != ED25519_FLAG {
        return Err(ChainError::InvalidKey(
            "expected an ed25519 key (33 bytes, flag 0x00)".to_string(),
        ));
    }
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&data[1..]);
    Ok(seed)
}

fn seed_from_raw_or_flagged(bytes: &[u8]) -> Result<[u8; 32], ChainError> {
    match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(bytes);
            Ok(seed)
        }
        33 => seed_from_flagged(bytes),
        n => Err(ChainError::InvalidKey(format!(
            "private key must be 32 or 33 bytes, got {}",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_HEX: &str = "9bf49a6a0755f953811fce125f2683d50429c3bb49e074147e0089a52eae155f";

    #[test]
    fn validate_address_normalizes_case_and_prefix() {
        let upper = "0xA7F1D92A82C8D8FE434D98558CE2B347171198542F112D0558F56BD68807999A";
        let bare = "a7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999a";
        let expected =
            "0xa7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999a";
        assert_eq!(validate_address(upper).as_deref(), Some(expected));
        assert_eq!(validate_address(bare).as_deref(), Some(expected));
    }

    #[test]
    fn validate_address_is_idempotent() {
        let input = "A7F1D92A82C8D8FE434D98558CE2B347171198542F112D0558F56BD68807999A";
        let once = validate_address(input).unwrap();
        let twice = validate_address(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn validate_address_rejects_bad_input() {
        assert_eq!(validate_address("0xzz"), None);
        assert_eq!(validate_address(""), None);
        assert_eq!(validate_address("0x1234"), None);
        // 63 digits
        assert_eq!(
            validate_address(
                "a7f1d92a82c8d8fe434d98558ce2b347171198542f112d0558f56bd68807999"
            ),
            None
        );
    }

    #[test]
    fn wallet_parses_hex_and_bech32_to_same_address() {
        let from_hex = LocalWallet::from_encoded(SEED_HEX).unwrap();

        let mut flagged = vec![ED25519_FLAG];
        flagged.extend_from_slice(&hex::decode(SEED_HEX).unwrap());
        let hrp = bech32::Hrp::parse(PRIVATE_KEY_HRP).unwrap();
        let encoded = bech32::encode::<bech32::Bech32>(hrp, &flagged).unwrap();
        let from_bech32 = LocalWallet::from_encoded(&encoded).unwrap();

        assert_eq!(from_hex.address(), from_bech32.address());
        assert!(validate_address(from_hex.address()).is_some());
    }

    #[test]
    fn signature_is_flag_sig_pubkey() {
        let wallet = LocalWallet::from_encoded(SEED_HEX).unwrap();
        let serialized = BASE64.decode(wallet.sign_transaction(b"tx-bytes")).unwrap();
        assert_eq!(serialized.len(), 97);
        assert_eq!(serialized[0], ED25519_FLAG);

        // deterministic for the same payload
        assert_eq!(
            wallet.sign_transaction(b"tx-bytes"),
            wallet.sign_transaction(b"tx-bytes")
        );
        assert_ne!(
            wallet.sign_transaction(b"tx-bytes"),
            wallet.sign_transaction(b"other")
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(LocalWallet::from_encoded("not-a-key").is_err());
        assert!(LocalWallet::from_encoded("0x1234").is_err());
    }
}
