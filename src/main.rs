use parvec::{DispatchConfig, Dispatcher, Operand, OutputOperand, Vectorize};
use std::sync::Arc;
use std::time::Instant;

fn main() {
    println!("parvec - Parallel Elementwise Dispatch with Work Stealing\n");

    let config = match DispatchConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid environment: {}", e);
            std::process::exit(2);
        }
    };
    let dispatcher = match Dispatcher::new(config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            eprintln!("Cannot create dispatcher: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "Dispatcher using the {} backend with {} requested workers\n",
        dispatcher.backend_name(),
        dispatcher.config().requested_workers()
    );

    // Example 1: uniform kernel
    println!("Example 1: Square of 1,000,000 doubles");
    let square = Vectorize::new()
        .add(|x: f64| x * x)
        .add(|x: f32| x * x)
        .build(Arc::clone(&dispatcher))
        .expect("square family is valid");

    let input: Vec<f64> = (0..1_000_000).map(f64::from).collect();
    let mut output = vec![0.0f64; input.len()];
    let start = Instant::now();
    match square.call(&[Operand::from(&input)], OutputOperand::from(&mut output)) {
        Ok(report) => {
            println!("  Completed {} elements in {:?}", report.completed(), start.elapsed());
            println!("  Stolen: {}", report.stolen());
            println!("  output[999] = {}\n", output[999]);
        }
        Err(e) => eprintln!("  Dispatch failed: {}\n", e),
    }

    // Example 2: uneven per-element cost, where stealing matters
    println!("Example 2: Uneven per-element cost");
    let uneven = Vectorize::new()
        .add(|n: i64| {
            let iterations = if n % 64 == 0 { 20_000 } else { 10 };
            let mut acc = n;
            for i in 0..iterations {
                acc = acc.wrapping_mul(6364136223846793005).wrapping_add(i);
            }
            acc
        })
        .build(Arc::clone(&dispatcher))
        .expect("uneven family is valid");

    let input: Vec<i64> = (0..100_000).collect();
    let mut output = vec![0i64; input.len()];
    match uneven.call(&[Operand::from(&input)], OutputOperand::from(&mut output)) {
        Ok(report) => {
            println!(
                "  Completed {} elements at {:.2} elements/second",
                report.completed(),
                report.elements_per_second()
            );
            for w in &report.workers {
                println!("  worker {}: completed {}, stolen {}", w.id, w.completed, w.stolen);
            }
        }
        Err(e) => eprintln!("  Dispatch failed: {}", e),
    }

    println!("\nDone!");
}
