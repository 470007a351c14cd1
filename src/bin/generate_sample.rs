//! Writes a small synthetic mridangam-shaped raw tree: one directory per
//! stroke class, silent placeholder `.wav` files and `_analysis.json`
//! sidecars with class-dependent measurements.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};

use rusty_dataset::schema;

#[derive(Debug, Parser)]
#[command(name = "generate-sample", about)]
struct Args {
    /// Output root for the raw tree
    out_dir: PathBuf,

    /// Samples written per class
    #[arg(long, default_value_t = 20)]
    per_class: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Seeded xoshiro256** generator; only Gaussian draws are needed.
struct Noise {
    s: [u64; 4],
}

impl Noise {
    fn seeded(seed: u64) -> Self {
        let mut x = seed;
        let s = [(); 4].map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            x
        });
        Self { s }
    }

    /// Uniform in `[0, 1)` from the top 53 bits of one xoshiro step.
    fn uniform(&mut self) -> f64 {
        let [a, b, c, d] = &mut self.s;
        let out = b.wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = *b << 17;
        *c ^= *a;
        *d ^= *b;
        *b ^= *c;
        *a ^= *d;
        *c ^= t;
        *d = d.rotate_left(45);
        (out >> 11) as f64 / (1u64 << 53) as f64
    }

    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        let r = (-2.0 * self.uniform().max(1e-15).ln()).sqrt();
        let theta = std::f64::consts::TAU * self.uniform();
        mean + sd * r * theta.cos()
    }
}

/// Rough per-feature centre and spread; `class_idx` shifts the centre so
/// classes are separable.
fn feature_value(key: &str, class_idx: usize, rng: &mut Noise) -> f64 {
    let shift = class_idx as f64;
    match key {
        "loudness" => rng.normal(-30.0 + 2.0 * shift, 6.0).clamp(-60.0, 0.0),
        "duration" => rng.normal(0.3 + 0.05 * shift, 0.08).max(0.01),
        "log_attack_time" => rng.normal(-2.0 + 0.1 * shift, 0.3),
        "temporal_centroid" => rng.normal(0.1 + 0.01 * shift, 0.02).max(0.0),
        _ => rng.normal(40.0 + 3.0 * shift, 10.0).clamp(0.0, 100.0),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let schema = schema::mridangam();
    let mut rng = Noise::seeded(args.seed);

    for (class_idx, class) in schema.label.values.iter().enumerate() {
        let dir = args.out_dir.join(class);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for n in 0..args.per_class {
            let stem = format!("{class}_{n:04}");
            fs::write(dir.join(format!("{stem}.wav")), b"")?;

            let mut sidecar = Map::new();
            for key in &schema.features.keys {
                sidecar.insert(key.clone(), Value::from(feature_value(key, class_idx, &mut rng)));
            }
            let path = dir.join(format!("{stem}{}", schema.layout.sidecar_suffix));
            fs::write(&path, serde_json::to_vec_pretty(&Value::Object(sidecar))?)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    println!(
        "Wrote {} samples ({} classes) to {}",
        args.per_class * schema.label.values.len(),
        schema.label.values.len(),
        args.out_dir.display()
    );
    Ok(())
}
