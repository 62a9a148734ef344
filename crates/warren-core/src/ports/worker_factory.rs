//! WorkerFactory port - locator から worker を作る

use crate::domain::ScriptLocator;
use crate::ports::Worker;

/// WorkerFactory は新しい worker ハンドルを生成
///
/// pool は capacity に達するまでの間だけ `create` を呼び、
/// 作られた worker は pool が生きている間ずっと再利用されます。
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: Worker;

    fn create(&self, locator: &ScriptLocator) -> Self::Worker;
}
