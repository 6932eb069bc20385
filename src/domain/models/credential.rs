// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use std::fmt;

/// 已解封的登录凭证
///
/// 只由凭证保管库构造，其他组件只读。`Debug` 输出不包含密码。
#[derive(Clone)]
pub struct Credential {
    pub owner_id: String,
    pub username: String,
    secret: String,
    pub last_used_at: Option<DateTime<FixedOffset>>,
}

impl Credential {
    pub fn new(
        owner_id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
        last_used_at: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            username: username.into(),
            secret: secret.into(),
            last_used_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("owner_id", &self.owner_id)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}
