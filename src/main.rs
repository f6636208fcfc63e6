//! Arbor stress runner
//!
//! Command-line interface for convergence soak tests: clusters of
//! in-process replicas issue random reparent intents, ops are delivered in
//! shuffled order, and every derived tree must come out identical.

use stress_test::{churn_with_retractions, soak_random_reparents};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("quick") => run_quick(),
        Some("soak") => {
            soak_random_reparents(5, 400, 42).print();
        }
        Some("churn") => {
            churn_with_retractions(4, 300, 7).print();
        }
        Some("full") => run_full(),
        Some("help") | Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            println!("Unknown test suite: {}", other);
            print_usage();
        }
    }
}

fn run_quick() {
    soak_random_reparents(3, 100, 1).print();
    churn_with_retractions(3, 100, 2).print();
    println!("\n✓ Quick tests completed successfully!");
}

fn run_full() {
    for seed in 0..10 {
        soak_random_reparents(5, 500, seed).print();
    }
    for seed in 0..10 {
        churn_with_retractions(5, 500, 100 + seed).print();
    }
    println!("\n✓ Full suite completed successfully!");
}

fn print_usage() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║            ARBOR CONVERGENCE STRESS SUITE                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Usage: cargo run [test_suite]");
    println!();
    println!("Available test suites:");
    println!("  quick    - Quick smoke runs (default)");
    println!("  soak     - Random reparents across 5 replicas");
    println!("  churn    - Reparents mixed with edge retractions");
    println!("  full     - Many seeds of both (takes longer)");
    println!("  help     - Show this help message");
    println!();
}
