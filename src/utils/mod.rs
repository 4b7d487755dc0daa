use crate::error::{ImputeError, Result};
use std::path::Path;
use std::time::Duration;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Split elapsed time into whole hours, whole minutes and remaining seconds
pub fn split_hms(elapsed: Duration) -> (u64, u64, f64) {
    let secs = elapsed.as_secs_f64();
    let hours = (secs / 3600.0).floor();
    let minutes = ((secs - 3600.0 * hours) / 60.0).floor();
    let seconds = secs - 3600.0 * hours - 60.0 * minutes;
    (hours as u64, minutes as u64, seconds)
}

/// Format number with commas
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

/// Random number utilities
pub mod random {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Create RNG with fixed seed
    pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }
}

/// Validation utilities
pub mod validation {
    use super::*;

    /// Validate that value is in range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(value: T, min: T, max: T, name: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ImputeError::Config(format!(
                "{} must be between {} and {}, got {}",
                name, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that value is positive
    pub fn positive<T: PartialOrd + Default + std::fmt::Display>(value: T, name: &str) -> Result<()> {
        if value <= T::default() {
            return Err(ImputeError::Config(format!("{} must be positive, got {}", name, value)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30.0s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(3600.0), "1.0h");
    }

    #[test]
    fn test_split_hms() {
        let (h, m, s) = split_hms(Duration::from_secs_f64(3723.5));
        assert_eq!((h, m), (1, 2));
        assert!((s - 3.5).abs() < 1e-9);

        assert_eq!(split_hms(Duration::from_secs(59)), (0, 0, 59.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        use rand::Rng;
        let a: Vec<u32> = (0..5).map({
            let mut rng = random::seeded_rng(42);
            move |_| rng.gen()
        }).collect();
        let b: Vec<u32> = (0..5).map({
            let mut rng = random::seeded_rng(42);
            move |_| rng.gen()
        }).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validation() {
        assert!(validation::in_range(0.5, 0.0, 1.0, "value").is_ok());
        assert!(validation::in_range(1.5, 0.0, 1.0, "value").is_err());

        assert!(validation::positive(1usize, "value").is_ok());
        assert!(validation::positive(0usize, "value").is_err());
    }

    #[test]
    fn test_ensure_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
