//! Worker port - worker 実行環境の抽象化
//!
//! pool は worker の中身（スレッド・タスク・プロセス）を知りません。
//! ここに挙げたメソッド以上のことを仮定してはいけません。

use crate::domain::{EventType, Listener, ListenerOptions};

/// Worker は 1 つの実行単位を表すハンドル
///
/// # 契約
/// - `on_message` / `on_error` はそれぞれ 1 スロットのハンドラ
/// - `add_listener` は `(event_type, listener, options.capture)` で一意。
///   同じ組み合わせの二重登録は無視される
/// - `remove_listener` は登録されていない listener に対して no-op
///   （proxy の release が二重 remove を起こしうるため必須）
/// - これらのメソッドの中からハンドラや listener を同期的に呼んではいけない
///   （proxy は自分のロックを持ったまま worker を操作する）
pub trait Worker: Send + Sync + 'static {
    fn on_message(&self) -> Option<Listener>;

    fn set_on_message(&self, handler: Option<Listener>);

    fn on_error(&self) -> Option<Listener>;

    fn set_on_error(&self, handler: Option<Listener>);

    fn add_listener(&self, event_type: &EventType, listener: Listener, options: ListenerOptions);

    fn remove_listener(&self, event_type: &EventType, listener: &Listener, options: ListenerOptions);

    fn post_message(&self, message: serde_json::Value);
}
