use anyhow::{Result as AnyResult, bail};
use mq_core::{DriverConfig, EventBroker, HandlerOptions, MqRuntime};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let driver = rt
        .scheduler()
        .spawn_driver(DriverConfig::builder().batch_size(16).build());

    // 广播：每个订阅者都收到订单事件
    for name in ["audit", "ship"] {
        broker.subscribe_to_event_handler(
            "topic",
            "orders",
            HandlerOptions::default(),
            name,
            move |e| {
                tracing::info!(subscriber = name, event = %e.id(), data = %e.payload().data(), "order received");
                Ok(())
            },
        )?;
    }

    // 轮询：任务在 worker 之间轮流分配，w2 第一次处理失败
    let w2_flaky = Arc::new(AtomicBool::new(true));
    for name in ["w1", "w2"] {
        let flaky = w2_flaky.clone();
        broker.subscribe_to_event_handler(
            "queue",
            "jobs",
            HandlerOptions::from_value(json!({"purpose": "demo"}))?,
            name,
            move |e| {
                if name == "w2" && flaky.swap(false, Ordering::SeqCst) {
                    bail!("worker w2 warming up");
                }
                tracing::info!(worker = name, job = %e.payload().data(), "job processed");
                Ok(())
            },
        )?;
    }

    let orders = broker.require_event_handler("orders")?;
    let jobs = broker.require_event_handler("jobs")?;

    orders.emit("created", "order", json!({"id": 1}))?;
    for i in 1..=5 {
        jobs.emit("run", "job", json!({"n": i}))?;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = serde_json::to_string_pretty(&broker.snapshot())?;
    tracing::info!("broker state:\n{snapshot}");

    driver.shutdown();
    driver.join().await;
    Ok(())
}
