use anyhow::{bail, Result};
use serde::Serialize;

use anchorto_core::scroll::{ease_in_out_quad, quad_in_out};

#[derive(Serialize)]
struct Sample {
    elapsed_ms: u64,
    /// Eased share of the distance covered, 0 to 1
    progress: f64,
    position: f64,
}

fn samples(start: f64, distance: f64, duration_ms: u64, step_ms: u64) -> Vec<Sample> {
    let mut samples: Vec<Sample> = (0..duration_ms)
        .step_by(step_ms as usize)
        .map(|elapsed_ms| Sample {
            elapsed_ms,
            progress: quad_in_out(elapsed_ms as f64 / duration_ms as f64),
            position: ease_in_out_quad(elapsed_ms as f64, start, distance, duration_ms as f64),
        })
        .collect();
    // The animator snaps to the target on the last frame
    samples.push(Sample {
        elapsed_ms: duration_ms,
        progress: 1.0,
        position: start + distance,
    });
    samples
}

pub fn run(start: f64, distance: f64, duration_ms: u64, step_ms: u64, json: bool) -> Result<()> {
    if step_ms == 0 {
        bail!("--step must be at least 1ms");
    }

    let samples = samples(start, distance, duration_ms, step_ms);

    if json {
        println!("{}", serde_json::to_string_pretty(&samples)?);
        return Ok(());
    }

    println!("{:>8}  {:>8}  {:>10}", "ms", "progress", "position");
    for sample in &samples {
        println!(
            "{:>8}  {:>8.3}  {:>10.2}",
            sample.elapsed_ms, sample.progress, sample.position
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_end_on_target() {
        let samples = samples(100.0, 500.0, 300, 75);
        let times: Vec<u64> = samples.iter().map(|s| s.elapsed_ms).collect();
        assert_eq!(times, vec![0, 75, 150, 225, 300]);
        assert_eq!(samples[0].position, 100.0);
        assert_eq!(samples[2].progress, 0.5);
        assert_eq!(samples[2].position, 350.0);
        assert_eq!(samples[4].position, 600.0);
    }
}
