//! Writes a synthetic CSI capture with a quiet channel and one motion burst.
//!
//! Usage: `generate_sample [OUTPUT.csv]` (default `sample_csi.csv`).

use std::f64::consts::PI;

use chrono::{Duration, NaiveTime};

const SUBCARRIERS: usize = 64;
const ROWS: usize = 1200;
/// Capture interval.
const STEP_MS: i64 = 50;
/// Rows during which someone walks through the link.
const MOTION: std::ops::Range<usize> = 500..700;
/// Guard band: these subcarriers always report zero.
const NULL_SUBCARRIERS: [usize; 3] = [0, 1, 32];

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
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Static multipath profile: two reflections over a flat floor.
fn static_channel(k: usize) -> (f64, f64) {
    let f = k as f64 / SUBCARRIERS as f64;
    let amp = 30.0 + 12.0 * (2.0 * PI * 1.5 * f).cos() + 6.0 * (2.0 * PI * 4.0 * f + 0.7).sin();
    let phase = -2.0 * PI * 3.0 * f;
    (amp, phase)
}

/// Extra path from a moving body, sweeping in delay over the burst.
fn motion_path(k: usize, row: usize) -> (f64, f64) {
    if !MOTION.contains(&row) {
        return (0.0, 0.0);
    }
    let progress = (row - MOTION.start) as f64 / MOTION.len() as f64;
    let envelope = (PI * progress).sin();
    let delay = 2.0 + 6.0 * progress;
    let angle = -2.0 * PI * delay * k as f64 / SUBCARRIERS as f64;
    let amp = 18.0 * envelope;
    (amp * angle.cos(), amp * angle.sin())
}

fn payload(row: usize, rng: &mut SimpleRng) -> String {
    let mut samples = Vec::with_capacity(SUBCARRIERS * 2);
    for k in 0..SUBCARRIERS {
        if NULL_SUBCARRIERS.contains(&k) {
            samples.extend(["0".to_string(), "0".to_string()]);
            continue;
        }
        let (amp, phase) = static_channel(k);
        let (mre, mim) = motion_path(k, row);
        let re = amp * phase.cos() + mre + rng.gauss(0.0, 0.8);
        let im = amp * phase.sin() + mim + rng.gauss(0.0, 0.8);
        // ESP32-style captures report integer I/Q
        samples.push(format!("{}", re.round() as i64));
        samples.push(format!("{}", im.round() as i64));
    }
    format!("[{}]", samples.join(","))
}

fn main() {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_csi.csv".to_string());
    let mut rng = SimpleRng::new(42);
    let start = NaiveTime::from_hms_opt(12, 0, 0).expect("valid start time");

    let mut writer = csv::Writer::from_path(&output_path).expect("Failed to create output file");
    writer
        .write_record(["timestamp", "rssi", "data"])
        .expect("Failed to write header");

    let mut blank_rows = 0;
    for row in 0..ROWS {
        let time = start + Duration::milliseconds(row as i64 * STEP_MS);
        let timestamp = time.format("%H:%M:%S%.6f").to_string();
        let rssi = format!("{}", rng.gauss(-45.0, 2.0).round() as i64);

        // occasional dropped frame with no samples
        let data = if row % 173 == 172 {
            blank_rows += 1;
            String::new()
        } else {
            payload(row, &mut rng)
        };
        writer
            .write_record([timestamp.as_str(), rssi.as_str(), data.as_str()])
            .expect("Failed to write row");
    }
    writer.flush().expect("Failed to flush output");

    println!(
        "Wrote {ROWS} rows ({SUBCARRIERS} subcarriers, {blank_rows} blank, motion in rows {}..{}) to {output_path}",
        MOTION.start, MOTION.end
    );
}
