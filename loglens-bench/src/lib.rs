//! Shared fixtures for the LogLens benchmarks.

use loglens_core::{AnalysisInput, InputFile};

/// `files` synthetic access logs of `lines` lines each.
#[must_use]
pub fn synthetic_input(files: usize, lines: usize) -> AnalysisInput {
    (0..files)
        .map(|f| {
            let content = (0..lines)
                .map(|l| {
                    format!(
                        "10.0.{f}.{} - - \"GET /api/orders/{l} HTTP/1.1\" 200 512 rt={}.{:03}",
                        l % 255,
                        l % 3,
                        (l * 37) % 1000
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            InputFile::new(format!("service-{f}.log"), content)
        })
        .collect()
}
