use glimpse_mpmc::Queue;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const MESSAGES: usize = 1_000_000;
const BUFFER_SIZE: usize = 1024;

fn main() {
    println!("Glimpse MPMC Performance Test");
    println!("==============================\n");

    for (producers, consumers) in [(1, 1), (4, 1), (1, 4), (4, 4)] {
        report("blocking", producers, consumers, || {
            run_blocking(producers, consumers)
        });
        report("try_* spin", producers, consumers, || {
            run_spinning(producers, consumers)
        });
    }
}

fn report(label: &str, producers: usize, consumers: usize, run: impl FnOnce()) {
    println!(
        "{} Producer(s), {} Consumer(s), {} ({} messages):",
        producers, consumers, label, MESSAGES
    );
    let start = Instant::now();
    run();
    let elapsed = start.elapsed();
    let throughput = MESSAGES as f64 / elapsed.as_secs_f64();
    println!("  Time: {:?}", elapsed);
    println!("  Throughput: {:.2} msgs/sec", throughput);
    println!("  Latency: {:.0} ns/op\n", elapsed.as_nanos() as f64 / MESSAGES as f64);
}

fn run_blocking(producers: usize, consumers: usize) {
    let queue = Arc::new(Queue::<usize>::new(BUFFER_SIZE));
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = vec![];

    for p in 0..producers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                q.write(p * per_producer + i);
            }
        }));
    }

    for _ in 0..consumers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                q.read();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_spinning(producers: usize, consumers: usize) {
    let queue = Arc::new(Queue::<usize>::new(BUFFER_SIZE));
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = vec![];

    for p in 0..producers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                let mut item = p * per_producer + i;
                while let Err(full) = q.try_write(item) {
                    item = full.into_inner();
                    std::hint::spin_loop();
                }
            }
        }));
    }

    for _ in 0..consumers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                while q.try_read().is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}
