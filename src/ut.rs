use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce
};

const KEY: &str = "4f1c2a9e7d3b58c6a0e9f2d41b7c8e35d6a2f90c3e1b47a85c9d0e6f2a3b1c47";

// GCM nonce size
const NONCE_LEN: usize = 12;

fn cipher() -> Result<Aes256Gcm, String>
//--------------------------------------
{
   let key_bytes = hex::decode(KEY).map_err(|e| format!("Invalid hex key: {}", e))?;
   if key_bytes.len() != 32
   {
      return Err(format!("Key must be 32 bytes, got {}", key_bytes.len()));
   }
   let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
   Ok(Aes256Gcm::new(key))
}

/// Encrypts the API token, returns hex(nonce || ciphertext) for storing in the settings file.
pub fn encrypt_token(token: &str) -> Result<String, String>
//---------------------------------------------------------
{
   let cipher = cipher()?;
   let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
   let ciphertext = cipher.encrypt(&nonce, token.as_bytes())
                          .map_err(|e| format!("Encryption failed: {:?}", e))?;
   let mut result = Vec::with_capacity(nonce.len() + ciphertext.len());
   result.extend_from_slice(&nonce);
   result.extend_from_slice(&ciphertext);
   Ok(hex::encode(result))
}

pub fn decrypt_token(stored: &str) -> Result<String, String>
//----------------------------------------------------------
{
   let data = hex::decode(stored).map_err(|e| format!("Failed to hex decode stored token: {}", e))?;
   if data.len() < NONCE_LEN
   {
      return Err("Encrypted token too short".to_string());
   }
   let cipher = cipher()?;
   let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
   let nonce = Nonce::from_slice(nonce_bytes);
   let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| format!("Decryption failed: {:?}", e))?;
   String::from_utf8(plaintext).map_err(|e| format!("Decrypted token is not UTF-8: {}", e))
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn token_survives_encryption()
   {
      let stored = encrypt_token("secret-bearer-token").unwrap();
      assert_ne!(stored, "secret-bearer-token");
      assert_eq!(decrypt_token(&stored).unwrap(), "secret-bearer-token");
   }

   #[test]
   fn same_token_encrypts_differently()
   {
      assert_ne!(encrypt_token("abc").unwrap(), encrypt_token("abc").unwrap());
   }

   #[test]
   fn garbage_is_rejected()
   {
      assert!(decrypt_token("zz").is_err());
      assert!(decrypt_token("00ff").is_err());
      assert!(decrypt_token(&"00".repeat(40)).is_err());
   }
}
