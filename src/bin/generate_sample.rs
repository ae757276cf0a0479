//! Writes `sample_scan.parquet` (a two-channel frequency scan) and
//! `sample_lines.cat` (a catalog of known lines) to the working directory.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_spectrum(
    frequencies: &[f64],
    lines: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    frequencies
        .iter()
        .map(|&f| {
            let signal: f64 = lines
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(f, mu, sigma, amp))
                .sum();
            signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    // 8000 → 8100 MHz, 5 kHz step
    let frequencies: Vec<f64> = (0..20_000).map(|i| 8000.0 + i as f64 * 0.005).collect();

    // (centre MHz, width MHz, amplitude)
    let species_a = [(8012.345, 0.04, 0.9), (8047.810, 0.05, 0.6), (8081.202, 0.04, 0.3)];
    let species_b = [(8023.456, 0.04, 0.5), (8047.830, 0.05, 0.4), (8066.660, 0.03, 0.8)];
    let all_lines: Vec<(f64, f64, f64)> = species_a
        .iter()
        .chain(species_b.iter())
        .map(|&(mu, sigma, amp)| (mu, sigma, amp))
        .collect();

    let channel_1 = generate_spectrum(&frequencies, &all_lines, 0.01, &mut rng);
    let channel_2: Vec<f64> = generate_spectrum(&frequencies, &all_lines, 0.01, &mut rng)
        .into_iter()
        .map(|v| 0.5 * v)
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("Frequency (MHz)", DataType::Float64, false),
        Field::new("Intensity (V)", DataType::Float64, false),
        Field::new("Intensity 2 (V)", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(frequencies.clone())),
            Arc::new(Float64Array::from(channel_1)),
            Arc::new(Float64Array::from(channel_2)),
        ],
    )
    .context("building record batch")?;

    let scan_path = "sample_scan.parquet";
    let file = std::fs::File::create(scan_path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    // Catalog of species A only: frequency, uncertainty, log10 intensity.
    let mut catalog = String::new();
    for &(mu, _, amp) in &species_a {
        writeln!(catalog, "{mu:>13.4} {:>8.4} {:>8.4}", 0.002, f64::log10(amp))?;
    }
    let catalog_path = "sample_lines.cat";
    std::fs::write(catalog_path, catalog).context("writing catalog")?;

    println!(
        "Wrote {scan_path} ({} points) and {catalog_path} ({} lines)",
        frequencies.len(),
        species_a.len()
    );
    Ok(())
}
