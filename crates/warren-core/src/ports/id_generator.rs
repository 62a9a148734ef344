//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock + 乱数による ULID

use crate::domain::ids::{ProxyId, RegistrationId, WorkerId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は pool が使う ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（pool は複数スレッドから使われる）
pub trait IdGenerator: Send + Sync {
    fn generate_worker_id(&self) -> WorkerId;

    fn generate_registration_id(&self) -> RegistrationId;

    fn generate_proxy_id(&self) -> ProxyId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_worker_id(&self) -> WorkerId {
        WorkerId::from(self.next_ulid())
    }

    fn generate_registration_id(&self) -> RegistrationId {
        RegistrationId::from(self.next_ulid())
    }

    fn generate_proxy_id(&self) -> ProxyId {
        ProxyId::from(self.next_ulid())
    }
}
