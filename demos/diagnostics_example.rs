//! Diagnostics functionality usage example
//!
//! This example shows how to use this crate's diagnostics feature to
//! compile a score with an error and display a rendered source snippet.

use chiptune_score::diagnostics::{emit_score_diagnostics, SimpleSource, ToAriadne};
use chiptune_score::Score;

fn main() {
    // A score naming an effect that doesn't exist, reported with its
    // line/column position.
    let source = "v:128\na:c4\ns:4\ne:unknown:1/1:0:1/1\n";

    println!("Compiling score and displaying diagnostic information...\n");

    let outcome = Score::compile_str(source);
    println!(
        "Compilation produced {} error(s) and {} warning(s)",
        outcome.errors.len(),
        outcome.warnings.len()
    );

    if !outcome.errors.is_empty() {
        println!("\n=== Diagnostic Information ===");
        emit_score_diagnostics("example.score", source, &outcome.errors, &outcome.warnings);
    }

    // Errors can also be rendered one at a time.
    println!("\n=== Manual Error Handling Example ===");
    let simple = SimpleSource::new("example.score", source);
    let ariadne_source = ariadne::Source::from(source);
    for err in &outcome.errors {
        let report = err.to_report(&simple);
        let _ = report.print((simple.name().to_string(), ariadne_source.clone()));
    }

    println!("\nDone.");
}
