//! Ports - 抽象化レイヤー
//!
//! pool が外部に要求するものだけを trait として定義します。
//! - Worker / WorkerFactory: worker 実行環境（ホスト側が提供）
//! - Clock / IdGenerator: ID 生成（テストで差し替え可能）

pub mod clock;
pub mod id_generator;
pub mod worker;
pub mod worker_factory;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::worker::Worker;
pub use self::worker_factory::WorkerFactory;
