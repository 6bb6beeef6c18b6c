//! # Example: toolkit
//!
//! Wires all four components together in one small program:
//! - a [`Cron`] job publishes a heartbeat on a [`Broker`] topic every second,
//! - a consumer calls a flaky backend through a [`CircuitBreaker`],
//! - the backend address is picked by a [`P2c`] balancer.
//!
//! ## Flow
//! ```text
//! Cron ──(every 1s)──► Broker.publish("heartbeat")
//!                            │
//!                            ▼
//!                  consumer ─► P2c.get(key) ─► CircuitBreaker.execute(call)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example toolkit --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use flowkit::{
    Broker, BreakerError, CircuitBreaker, Cron, Every, JobFn, JobRef, LogLevel, P2c, Settings,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    flowkit::logging::init(LogLevel::parse_lossy("info"))?;

    let broker = Arc::new(Broker::new());
    let mut beats = broker.subscribe("heartbeat").await?;

    let lb = P2c::new();
    lb.add_node("10.0.0.1:8080", 0);
    lb.add_node("10.0.0.2:8080", 0);
    lb.add_node("10.0.0.3:8080", 0);

    let cb = CircuitBreaker::new(
        Settings::default()
            .with_name("backend")
            .with_max_retries(2)
            .with_open_interval(Duration::from_secs(2))
            .with_on_state_change(|from, to| println!("[breaker] {from} -> {to}")),
    );

    let cron = Cron::new();
    let seq = Arc::new(AtomicU32::new(0));
    let publisher = Arc::clone(&broker);
    let tick: JobRef = JobFn::arc("heartbeat", move || {
        let broker = Arc::clone(&publisher);
        let n = seq.fetch_add(1, Ordering::Relaxed);
        async move {
            let _ = broker.publish("heartbeat", n.to_be_bytes().to_vec()).await;
        }
    });
    let first = cron.now() + Duration::from_secs(1);
    cron.add_job(tick, first, Every(Duration::from_secs(1))).await?;
    cron.start();

    for _ in 0..8 {
        let Some(beat) = beats.recv().await else { break };
        let n = u32::from_be_bytes([beat[0], beat[1], beat[2], beat[3]]);

        let addr = lb.get(&format!("beat-{}", n % 2))?;
        // Beats 2..=4 fail to simulate a backend outage.
        let res: Result<u32, BreakerError<String>> = cb
            .execute(|| async {
                if (2..=4).contains(&n) {
                    Err(format!("{addr} unavailable"))
                } else {
                    Ok(n)
                }
            })
            .await;
        lb.decr_load(&addr)?;

        match res {
            Ok(v) => println!("[consumer] beat {v} served by {addr}"),
            Err(e) => println!("[consumer] beat {n} rejected: {} ({e})", e.as_label()),
        }
    }

    cron.stop().await;
    broker.stop().await;
    Ok(())
}
