//! Basic breaker usage example

use load_breaker::{CircuitBreaker, ManualScheduler};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== Load Breaker Basic Example ===\n");

    // Virtual clock so the example runs instantly
    let clock = Arc::new(ManualScheduler::new());
    let breaker = CircuitBreaker::builder("ingest")
        .upper_threshold(3)
        .decrement_duration(Duration::from_secs(1))
        .cooloff_duration(Duration::from_secs(5))
        .trip_threshold(2)
        .on_open(|name| println!("🔴 Breaker '{}' opened!", name))
        .on_close(|name| println!("🟢 Breaker '{}' closed!", name))
        .on_maximum_trips(|name| println!("⛔ Breaker '{}' capped, call cap_reset", name))
        .scheduler(clock.clone())
        .build();

    println!("Initial state: {}\n", breaker.state_name());

    println!("--- Light load ---");
    for _ in 0..2 {
        breaker.increment().expect("closed breaker admits load");
    }
    println!("Counter: {}", breaker.counter());
    clock.advance(Duration::from_secs(1));
    println!("Counter after decay: {}\n", breaker.counter());

    println!("--- Overload ---");
    for i in 1..=4 {
        match breaker.increment() {
            Ok(()) => println!("✓ request {} admitted", i),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", breaker.state_name());

    println!("--- Cooloff ---");
    clock.advance(Duration::from_secs(5));
    println!("State: {}\n", breaker.state_name());

    println!("--- Second overload caps the breaker ---");
    for _ in 0..3 {
        let _ = breaker.increment();
    }
    clock.advance(Duration::from_secs(60));
    println!(
        "State: {} (trips: {})\n",
        breaker.state_name(),
        breaker.trip_counter()
    );

    println!("--- Manual recovery ---");
    breaker.cap_reset();
    println!("State after cap reset: {}", breaker.state_name());
}
