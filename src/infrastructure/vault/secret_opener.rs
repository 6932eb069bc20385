// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use crate::domain::services::credential_vault::VaultError;

/// AES-256-GCM 随机数长度（96位）
const NONCE_LEN: usize = 12;

/// 密文封装接口
///
/// 唯一接触密钥材料的地方
pub trait SecretOpener: Send + Sync {
    /// 封装明文
    fn seal(&self, plaintext: &str) -> Result<String, VaultError>;
    /// 校验并解封密文
    fn open(&self, sealed: &str) -> Result<String, VaultError>;
}

/// 基于 AES-256-GCM 的封装实现
///
/// 信封格式：`base64(nonce || ciphertext || tag)`，每次封装使用新的随机数。
/// 配置中的封装密钥经 SHA-256 派生为 32 字节的 AES 密钥。
pub struct AesGcmSecretOpener {
    cipher: Aes256Gcm,
}

impl AesGcmSecretOpener {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, VaultError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(VaultError::Sealed("sealing key must not be empty".to_string()));
        }
        let derived = Sha256::digest(key);
        let cipher = Aes256Gcm::new_from_slice(&derived)
            .map_err(|e| VaultError::Sealed(format!("invalid sealing key: {}", e)))?;
        Ok(Self { cipher })
    }
}

impl SecretOpener for AesGcmSecretOpener {
    fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Sealed(format!("encryption failed: {}", e)))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(envelope))
    }

    fn open(&self, sealed: &str) -> Result<String, VaultError> {
        let envelope = BASE64
            .decode(sealed)
            .map_err(|e| VaultError::Sealed(format!("envelope encoding: {}", e)))?;
        if envelope.len() <= NONCE_LEN {
            return Err(VaultError::Sealed("envelope too short".to_string()));
        }

        let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Sealed("authentication tag mismatch".to_string()))?;
        String::from_utf8(plaintext).map_err(|e| VaultError::Sealed(e.to_string()))
    }
}
