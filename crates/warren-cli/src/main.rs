use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use warren_core::impls::TokioWorkerFactory;
use warren_core::typed::{Handler, Script, ScriptRegistry};
use warren_core::{Listener, PoolBuilder, PoolConfig, WorkerError, WorkerEvent};

#[derive(Debug, Deserialize)]
struct Greet {
    name: String,
}

#[derive(Debug, Serialize)]
struct Greeting {
    text: String,
}

impl Script for Greet {
    const LOCATOR: &'static str = "demo.greet.v1";
    type Output = Greeting;
}

struct GreetHandler;

#[async_trait]
impl Handler<Greet> for GreetHandler {
    async fn handle(&self, input: Greet) -> Result<Greeting, WorkerError> {
        if input.name.is_empty() {
            return Err(WorkerError::script("nobody to greet"));
        }
        // 遅い処理のふり（pool が詰まる様子を見るため）
        sleep(Duration::from_millis(50)).await;
        Ok(Greeting {
            text: format!("Hello, {}!", input.name),
        })
    }
}

/// 1 タスクの結果
#[derive(Debug)]
enum Outcome {
    Replied(serde_json::Value),
    Failed(String),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warren_core=info,warren_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // (A) Script を登録し、tokio 上で動く worker の factory を用意
    let mut registry = ScriptRegistry::new();
    registry.register::<Greet, _>(GreetHandler)?;
    let factory = TokioWorkerFactory::try_current(Arc::new(registry))?;

    // (B) pool を作る（容量は WARREN_MAX_WORKERS、未設定なら 10）
    let config = PoolConfig::from_env()?;
    let pool = PoolBuilder::new(Greet::locator())
        .config(config)
        .build(factory)?;

    // (C) タスク投入。空いている worker がなければ登録は待たされる
    let names = ["Ada", "Grace", "", "Barbara", "Edsger", "Ken", "Dennis"];
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Outcome)>();

    for (i, name) in names.into_iter().enumerate() {
        let tx = tx.clone();
        pool.register(move |proxy| {
            let (p, done) = (proxy.clone(), tx.clone());
            proxy.set_on_message(Some(Listener::new(move |event| {
                let reply = event.data().cloned().unwrap_or_default();
                p.release();
                let _ = done.send((i, Outcome::Replied(reply)));
            })));

            let (p, done) = (proxy.clone(), tx);
            proxy.set_on_error(Some(Listener::new(move |event: &WorkerEvent| {
                let reason = event
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown error".into());
                p.release();
                let _ = done.send((i, Outcome::Failed(reason)));
            })));

            proxy.post_message(json!({ "name": name }));
        });
    }
    drop(tx);
    tracing::info!(counts = ?pool.counts(), "all tasks registered");

    // (D) 全タスクの完了を待つ
    let mut finished = 0;
    while finished < names.len() {
        let Some((i, outcome)) = rx.recv().await else {
            break;
        };
        match outcome {
            Outcome::Replied(reply) => tracing::info!(task = i, %reply, "task replied"),
            Outcome::Failed(reason) => tracing::warn!(task = i, %reason, "task failed"),
        }
        finished += 1;
    }

    tracing::info!(counts = ?pool.counts(), finished, "done");
    Ok(())
}
