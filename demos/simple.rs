//! Simple usage example
//!
//! Run with `cargo run --example simple --features tracing` to see the
//! queue's lifecycle events.

use glimpse_mpmc::Queue;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    glimpse_mpmc::init_tracing();
    println!("Glimpse MPMC - Simple Example\n");

    // A queue with 4 slots, so the producer has to wait on the consumer.
    let queue = Arc::new(Queue::<String>::new(4));

    let producer_queue = queue.clone();
    let consumer_queue = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let message = format!("Message {}", i);
            println!("Writing: {}", message);
            producer_queue.write(message);
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            let message = consumer_queue.read();
            println!("Read: {}", message);
            thread::sleep(Duration::from_millis(50));
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    // Anything still queued is dropped with the queue.
    queue.write("left behind".to_string());
    println!("\nDropping queue with {} item(s) still inside", queue.len());
    drop(queue);

    println!("Example completed successfully!");
}
